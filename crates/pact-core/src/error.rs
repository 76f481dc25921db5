use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ParticipantId;

#[derive(Debug, Error)]
pub enum PactError {
    // ── Protocol state errors ────────────────────────────────────────────────
    #[error("protocol is not active")]
    NotActive,

    #[error("not this participant's turn")]
    NotMyTurn,

    #[error("no opponent registered")]
    NoOpponent,

    #[error("participant invalidated: {0}")]
    Invalidated(ParticipantId),

    #[error("invalid commitment payload: {0}")]
    InvalidCommitment(String),

    // ── Commitment / proof errors ────────────────────────────────────────────
    #[error("coordinates ({x}, {y}) out of range for grid size {size}")]
    OutOfRange { x: u32, y: u32, size: u32 },

    #[error("leaf index {index} out of range (tree has {len} leaves)")]
    LeafOutOfRange { index: usize, len: usize },

    #[error("marked position ({x}, {y}) outside the grid of size {size}")]
    MarkOutOfRange { x: u32, y: u32, size: u32 },

    // ── Input / encoding errors ──────────────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // ── Persistence ──────────────────────────────────────────────────────────
    #[error("snapshot i/o error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for PactError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PactError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ── VerificationResult ───────────────────────────────────────────────────────

/// Structured outcome of every verification entry point.
///
/// Cryptographic and protocol failures never cross the public boundary as
/// errors; they surface as `valid = false` with a human-readable reason and
/// optional machine-readable details.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
    pub valid: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl VerificationResult {
    pub fn ok(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
            details: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
