use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonical_json;
use crate::error::PactError;
use crate::types::{now, ParticipantId, Timestamp};

// ── TxKind ───────────────────────────────────────────────────────────────────

/// The four classes of ledger entries.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// A participant publishing its commitment root and public key.
    /// The only kind that carries no signature.
    Commitment,
    /// A signed application action.
    Action,
    /// A signed proof or proof-verification record.
    Result,
    /// End-of-protocol record (forfeit or completion).
    Termination,
}

// ── Transaction ──────────────────────────────────────────────────────────────

/// A single ledger entry.
///
/// `data` is the canonical-JSON payload the signature covers. The
/// `sequence_number` is ledger-wide and assigned when the transaction is
/// added; a value of zero means "not yet assigned".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub kind: TxKind,
    pub participant_id: ParticipantId,
    pub data: Value,
    pub timestamp: Timestamp,
    pub signature: String,
    #[serde(default)]
    pub sequence_number: u64,
}

impl Transaction {
    /// Build an unsigned transaction (commitments only).
    pub fn unsigned(kind: TxKind, participant_id: ParticipantId, data: Value) -> Self {
        Self {
            kind,
            participant_id,
            data,
            timestamp: now(),
            signature: String::new(),
            sequence_number: 0,
        }
    }

    /// Build a signed transaction. `signature` must cover the canonical JSON
    /// of `data`.
    pub fn signed(
        kind: TxKind,
        participant_id: ParticipantId,
        data: Value,
        signature: String,
    ) -> Self {
        Self {
            kind,
            participant_id,
            data,
            timestamp: now(),
            signature,
            sequence_number: 0,
        }
    }

    /// The byte-exact message a signature on this transaction covers.
    pub fn signed_message(&self) -> Result<String, PactError> {
        canonical_json(&self.data)
    }
}
