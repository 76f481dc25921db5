use sha2::{Digest, Sha256};

use pact_core::constants::PARTICIPANT_ID_HEX_CHARS;
use pact_core::types::ParticipantId;

/// Compute SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive a ParticipantId from raw public key bytes: the first 16 hex chars
/// of SHA-256(public_key_bytes).
pub fn participant_id_from_public_key(pk_bytes: &[u8]) -> ParticipantId {
    ParticipantId::new(&sha256_hex(pk_bytes)[..PARTICIPANT_ID_HEX_CHARS])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn participant_id_is_digest_prefix() {
        let id = participant_id_from_public_key(b"pubkey");
        assert_eq!(id.as_str().len(), PARTICIPANT_ID_HEX_CHARS);
        assert!(sha256_hex(b"pubkey").starts_with(id.as_str()));
    }
}
