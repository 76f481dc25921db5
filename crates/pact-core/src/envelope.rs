//! Typed transport payloads.
//!
//! Every envelope serializes to the canonical wire object; free-form
//! application fields ride along via flattened maps so the canonical-JSON
//! encoding round-trips independent of key ordering.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::canonical_value;
use crate::constants::DIGEST_HEX_CHARS;
use crate::error::PactError;
use crate::types::{now, ParticipantId, Timestamp};

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

// ── CommitmentEnvelope ───────────────────────────────────────────────────────

/// Opening payload: who I am, how to verify my signatures, and the root
/// binding my hidden initial state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CommitmentEnvelope {
    pub participant_id: ParticipantId,
    pub public_key: String,
    pub commitment_root: String,
}

impl CommitmentEnvelope {
    /// Parse and validate a peer's commitment payload.
    pub fn parse(value: &Value) -> Result<Self, PactError> {
        let envelope: Self = serde_json::from_value(value.clone())
            .map_err(|e| PactError::InvalidCommitment(e.to_string()))?;
        ParticipantId::parse(envelope.participant_id.as_str())
            .map_err(|e| PactError::InvalidCommitment(e.to_string()))?;
        if !is_hex(&envelope.public_key) {
            return Err(PactError::InvalidCommitment(format!(
                "public_key is not hex: {:?}",
                envelope.public_key
            )));
        }
        if envelope.commitment_root.len() != DIGEST_HEX_CHARS
            || !is_hex(&envelope.commitment_root)
        {
            return Err(PactError::InvalidCommitment(format!(
                "commitment_root must be {DIGEST_HEX_CHARS} hex chars"
            )));
        }
        Ok(envelope)
    }
}

// ── ActionEnvelope ───────────────────────────────────────────────────────────

/// A signed application action. `fields` carries the application-supplied
/// payload; the envelope pins the action type and signing timestamp.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActionEnvelope {
    pub action_type: String,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ActionEnvelope {
    pub fn new(action_type: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            action_type: action_type.into(),
            timestamp: now(),
            fields,
        }
    }
}

// ── ProofEnvelope ────────────────────────────────────────────────────────────

/// A signed proof. The scheme-specific proof body is flattened into the
/// envelope so the wire object stays a single canonical map.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProofEnvelope {
    pub proof_type: String,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub proof: Map<String, Value>,
}

impl ProofEnvelope {
    /// Wrap a scheme proof. The proof must serialize to a JSON object.
    pub fn wrap<P: Serialize>(proof_type: &str, proof: &P) -> Result<Self, PactError> {
        let Value::Object(map) = canonical_value(proof)? else {
            return Err(PactError::Serialization(
                "proof must serialize to a JSON object".into(),
            ));
        };
        Ok(Self {
            proof_type: proof_type.to_string(),
            timestamp: now(),
            proof: map,
        })
    }

    /// Recover the scheme proof from the flattened fields.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, PactError> {
        Ok(serde_json::from_value(Value::Object(self.proof.clone()))?)
    }
}

// ── VerificationRecord ───────────────────────────────────────────────────────

/// Ledger record written after a successful proof verification. Carries the
/// complete proof plus the root it was checked against so any third party
/// can replay the check.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VerificationRecord {
    pub action: String,
    pub committed_root: String,
    pub opponent_id: ParticipantId,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub proof: Map<String, Value>,
}

impl VerificationRecord {
    pub const ACTION: &'static str = "verified_proof";

    pub fn new(
        committed_root: impl Into<String>,
        opponent_id: ParticipantId,
        proof: Map<String, Value>,
    ) -> Self {
        Self {
            action: Self::ACTION.to_string(),
            committed_root: committed_root.into(),
            opponent_id,
            timestamp: now(),
            proof,
        }
    }
}

// ── Revelation ───────────────────────────────────────────────────────────────

/// End-of-protocol revelation of the committed data and seed. The signature
/// covers the canonical JSON of the envelope *without* the signature field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Revelation {
    pub participant_id: ParticipantId,
    pub commitment_data: Value,
    pub seed: String,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}
