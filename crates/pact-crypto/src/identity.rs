use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use pact_core::canonical::canonical_json;
use pact_core::constants::SEED_BYTES;
use pact_core::error::PactError;
use pact_core::types::ParticipantId;

use crate::hash::{participant_id_from_public_key, sha256};

// ── Seed ─────────────────────────────────────────────────────────────────────

/// 32 secret bytes owned by one participant. Never transmitted before the
/// end-of-protocol revelation; wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_BYTES]);

impl Seed {
    pub fn random() -> Self {
        let mut bytes = [0u8; SEED_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SEED_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, PactError> {
        let bytes = hex::decode(s).map_err(|e| PactError::InvalidHex(e.to_string()))?;
        let bytes: [u8; SEED_BYTES] = bytes
            .try_into()
            .map_err(|_| PactError::InvalidInput(format!("seed must be {SEED_BYTES} bytes")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex form for the revelation payload. Calling this discloses the seed.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Seed(..)")
    }
}

// ── Identity ─────────────────────────────────────────────────────────────────

/// Deterministic secp256k1 signing identity.
///
/// The scalar is SHA-256(seed ‖ canonical_json(sorted commitment data)), so
/// the same seed and committed state always reproduce the same keypair and
/// participant id. Signatures are RFC-6979 deterministic ECDSA over the
/// SHA-256 of the message.
pub struct Identity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    participant_id: ParticipantId,
}

impl Identity {
    pub fn derive(seed: &Seed, commitment_data: &Value) -> Result<Self, PactError> {
        let encoded = canonical_json(&sorted_commitment_data(commitment_data))?;
        let mut material = Zeroizing::new(Vec::with_capacity(SEED_BYTES + encoded.len()));
        material.extend_from_slice(seed.as_bytes());
        material.extend_from_slice(encoded.as_bytes());

        let scalar = sha256(&material);
        let signing_key = SigningKey::from_bytes(&scalar.into())
            .map_err(|e| PactError::KeyDerivation(e.to_string()))?;
        let verifying_key = *signing_key.verifying_key();
        let participant_id = participant_id_from_public_key(&point_bytes(&verifying_key));

        Ok(Self {
            signing_key,
            verifying_key,
            participant_id,
        })
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Uncompressed public key point as 64 bytes (X ‖ Y, no SEC1 tag).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        point_bytes(&self.verifying_key)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Sign a message; returns the 64-byte r ‖ s signature as hex.
    pub fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.signing_key.sign(message);
        hex::encode(signature.to_bytes())
    }

    /// Verify one of our own signatures (used by the ledger-wide audit).
    pub fn verify_own(&self, message: &[u8], signature_hex: &str) -> bool {
        verify_signature(message, signature_hex, &self.public_key_hex())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity {{ participant_id: {:?} }}", self.participant_id)
    }
}

/// Verify a hex signature over `message` against a 64-byte hex public key.
/// Malformed keys, signatures or hex simply fail verification; this function
/// never panics on untrusted input.
pub fn verify_signature(message: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(pk_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    if pk_bytes.len() != 64 {
        return false;
    }
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&pk_bytes);
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&sec1) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}

fn point_bytes(key: &VerifyingKey) -> Vec<u8> {
    // Skip the 0x04 uncompressed-point tag.
    key.to_encoded_point(false).as_bytes()[1..].to_vec()
}

/// Commitment data is sorted before hashing so the derived key does not
/// depend on the order the application listed its positions in.
fn sorted_commitment_data(data: &Value) -> Value {
    match data {
        Value::Array(items) => {
            let mut sorted = items.clone();
            sorted.sort_by_cached_key(|item| serde_json::to_string(item).unwrap_or_default());
            Value::Array(sorted)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_identity() -> Identity {
        let seed = Seed::from_bytes([7u8; 32]);
        Identity::derive(&seed, &json!([[0, 0], [1, 2]])).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = test_identity();
        let b = test_identity();
        assert_eq!(a.participant_id(), b.participant_id());
        assert_eq!(a.public_key_hex(), b.public_key_hex());
    }

    #[test]
    fn derivation_ignores_position_order() {
        let seed = Seed::from_bytes([7u8; 32]);
        let a = Identity::derive(&seed, &json!([[1, 2], [0, 0]])).unwrap();
        let b = Identity::derive(&seed, &json!([[0, 0], [1, 2]])).unwrap();
        assert_eq!(a.participant_id(), b.participant_id());
    }

    #[test]
    fn different_data_different_identity() {
        let seed = Seed::from_bytes([7u8; 32]);
        let a = Identity::derive(&seed, &json!([[0, 0]])).unwrap();
        let b = Identity::derive(&seed, &json!([[0, 1]])).unwrap();
        assert_ne!(a.participant_id(), b.participant_id());
    }

    #[test]
    fn sign_verify_round_trip() {
        let identity = test_identity();
        let sig = identity.sign(b"a signed action");
        assert!(verify_signature(
            b"a signed action",
            &sig,
            &identity.public_key_hex()
        ));
    }

    #[test]
    fn tampered_message_fails() {
        let identity = test_identity();
        let sig = identity.sign(b"original");
        assert!(!verify_signature(b"tampered", &sig, &identity.public_key_hex()));
    }

    #[test]
    fn malformed_inputs_fail_without_panic() {
        let identity = test_identity();
        let sig = identity.sign(b"msg");
        assert!(!verify_signature(b"msg", "not-hex", &identity.public_key_hex()));
        assert!(!verify_signature(b"msg", &sig, "abcd"));
        assert!(!verify_signature(b"msg", "", &identity.public_key_hex()));
    }

    #[test]
    fn seed_hex_round_trip() {
        let seed = Seed::from_bytes([0xabu8; 32]);
        let back = Seed::from_hex(&seed.to_hex()).unwrap();
        assert_eq!(seed.as_bytes(), back.as_bytes());
    }
}
