use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::PARTICIPANT_ID_HEX_CHARS;
use crate::error::PactError;

/// Unix timestamp in seconds (UTC), with sub-second precision.
pub type Timestamp = f64;

/// Current wall-clock time as a [`Timestamp`].
pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp_micros() as f64 / 1e6
}

// ── ParticipantId ────────────────────────────────────────────────────────────

/// Stable participant identifier: the first 16 hex chars (8 bytes) of
/// SHA-256 over the participant's public key bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap an already-derived identifier. Derivation lives in pact-crypto;
    /// use [`ParticipantId::parse`] for untrusted wire input.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse and validate an identifier received from the peer.
    pub fn parse(s: &str) -> Result<Self, PactError> {
        if s.len() != PARTICIPANT_ID_HEX_CHARS
            || !s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(PactError::InvalidInput(format!(
                "participant id must be {PARTICIPANT_ID_HEX_CHARS} lowercase hex chars, got {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

// ── CellResult ───────────────────────────────────────────────────────────────

/// Outcome of a single-cell query against a grid commitment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellResult {
    Hit,
    Miss,
}

impl CellResult {
    pub fn from_mark(has_mark: bool) -> Self {
        if has_mark {
            Self::Hit
        } else {
            Self::Miss
        }
    }

    /// A proof is internally consistent only when result and mark agree.
    pub fn matches(self, has_mark: bool) -> bool {
        self == Self::from_mark(has_mark)
    }
}

// ── ProofStep ────────────────────────────────────────────────────────────────

/// One step of a Merkle inclusion path: the sibling digest and which side
/// it sits on.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofStep {
    /// Hex-encoded SHA-256 digest of the sibling node.
    pub hash: String,
    /// True when the sibling is the left operand of the parent hash.
    pub is_left: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_parse_accepts_lowercase_hex() {
        assert!(ParticipantId::parse("a1b2c3d4e5f60718").is_ok());
    }

    #[test]
    fn participant_id_parse_rejects_bad_input() {
        assert!(ParticipantId::parse("short").is_err());
        assert!(ParticipantId::parse("A1B2C3D4E5F60718").is_err());
        assert!(ParticipantId::parse("g1b2c3d4e5f60718").is_err());
    }

    #[test]
    fn cell_result_matches_mark() {
        assert!(CellResult::Hit.matches(true));
        assert!(CellResult::Miss.matches(false));
        assert!(!CellResult::Hit.matches(false));
    }
}
