//! Ledger reconciliation between two peers.
//!
//! Peers exchange compact [`SyncState`] digests; any mismatch triggers a
//! transaction transfer and a merge. The state root is a Merkle root over
//! the canonical JSON of every sealed transaction in ledger order, so root
//! equality implies exact transaction-set and ordering equality.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pact_core::canonical::canonical_json;
use pact_core::transaction::Transaction;
use pact_core::types::ParticipantId;
use pact_crypto::sha256_hex;

use crate::chain::Ledger;

/// Hashed when a ledger holds no sealed transactions yet.
const EMPTY_STATE_ROOT_PREIMAGE: &[u8] = b"empty";

// ── SyncState ────────────────────────────────────────────────────────────────

/// Compact digest of one ledger, cheap to exchange on every reconnect.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SyncState {
    pub chain_length: u64,
    /// Hash of the latest block.
    pub chain_hash: String,
    /// Merkle root over all sealed transactions.
    pub state_root: String,
    pub transaction_count: u64,
    pub participant_sequences: BTreeMap<ParticipantId, u64>,
}

impl Ledger {
    pub fn sync_state(&self) -> SyncState {
        SyncState {
            chain_length: self.block_count() as u64,
            chain_hash: self.last_block().hash.clone(),
            state_root: self.state_root(),
            transaction_count: self.total_transactions() as u64,
            participant_sequences: self.participant_sequences().clone(),
        }
    }

    /// Merkle root over canonical-JSON transaction encodings, folding hex
    /// digests level by level and duplicating the last digest on odd counts.
    pub fn state_root(&self) -> String {
        let mut hashes: Vec<String> = self
            .transactions()
            .map(|tx| {
                let encoded =
                    canonical_json(tx).expect("transaction serialization is infallible");
                sha256_hex(encoded.as_bytes())
            })
            .collect();

        if hashes.is_empty() {
            return sha256_hex(EMPTY_STATE_ROOT_PREIMAGE);
        }

        while hashes.len() > 1 {
            if hashes.len() % 2 == 1 {
                hashes.push(hashes.last().expect("non-empty level").clone());
            }
            hashes = hashes
                .chunks(2)
                .map(|pair| sha256_hex(format!("{}{}", pair[0], pair[1]).as_bytes()))
                .collect();
        }
        hashes.remove(0)
    }
}

// ── Diff detection ───────────────────────────────────────────────────────────

/// Whether two ledgers have diverged, and why.
pub fn needs_sync(mine: &SyncState, peer: &SyncState) -> (bool, String) {
    if mine.chain_length != peer.chain_length {
        return (
            true,
            format!(
                "Chain length mismatch: {} vs {}",
                mine.chain_length, peer.chain_length
            ),
        );
    }
    if mine.chain_hash != peer.chain_hash {
        return (true, "Chain hash mismatch".to_string());
    }
    if mine.state_root != peer.state_root {
        return (true, "State root mismatch".to_string());
    }
    (false, "Synchronized".to_string())
}

// ── Conflict resolution ──────────────────────────────────────────────────────

/// Outcome of comparing two diverged ledgers. Strict longest-chain: the
/// shorter side requests the longer side's transactions; equal-length
/// divergence is surfaced to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Chains agree; nothing to do.
    InSync,
    /// Peer chain is longer — request their transactions.
    RequestPeerChain,
    /// Our chain is longer — the peer should sync to us.
    PeerBehind,
    /// Same length, different state roots. Not resolvable here.
    Diverged,
}

pub fn resolve_conflict(mine: &SyncState, peer: &SyncState) -> ConflictResolution {
    if peer.chain_length > mine.chain_length {
        return ConflictResolution::RequestPeerChain;
    }
    if mine.chain_length > peer.chain_length {
        return ConflictResolution::PeerBehind;
    }
    if mine.state_root == peer.state_root {
        ConflictResolution::InSync
    } else {
        ConflictResolution::Diverged
    }
}

// ── Merge ────────────────────────────────────────────────────────────────────

/// Merge peer transactions into our ledger, ordered by sequence number and
/// skipping any (participant, sequence) pair we already hold. Seals a block
/// when anything was added. Returns the number of transactions added.
pub fn merge_transactions(ledger: &mut Ledger, transactions: Vec<Transaction>) -> usize {
    let mut incoming = transactions;
    incoming.sort_by_key(|tx| tx.sequence_number);

    let mut added = 0;
    for tx in incoming {
        if ledger.contains(&tx.participant_id, tx.sequence_number) {
            debug!(
                participant = %tx.participant_id,
                sequence = tx.sequence_number,
                "skipping duplicate transaction"
            );
            continue;
        }
        ledger.add_transaction(tx);
        added += 1;
    }

    if added > 0 {
        ledger.mine_block();
        info!(added, "merged peer transactions");
    }
    added
}

// ── Wire messages ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    #[serde(rename = "blockchain_sync")]
    Request { state: SyncState },
    #[serde(rename = "blockchain_sync_response")]
    Response {
        needs_sync: bool,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        my_state: Option<SyncState>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transactions: Option<Vec<Transaction>>,
    },
}

pub fn create_sync_message(ledger: &Ledger) -> SyncMessage {
    SyncMessage::Request {
        state: ledger.sync_state(),
    }
}

/// Answer a peer's sync request. On any mismatch the full transaction list
/// is returned; a sequence-range diff would be the scalable variant, but
/// two-party ledgers stay small.
pub fn handle_sync_message(ledger: &Ledger, peer_state: &SyncState) -> SyncMessage {
    let mine = ledger.sync_state();
    let (needs, reason) = needs_sync(&mine, peer_state);
    if !needs {
        return SyncMessage::Response {
            needs_sync: false,
            reason,
            my_state: None,
            transactions: None,
        };
    }
    SyncMessage::Response {
        needs_sync: true,
        reason,
        my_state: Some(mine),
        transactions: Some(ledger.transactions().cloned().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_core::transaction::TxKind;
    use serde_json::json;

    fn pid(tag: &str) -> ParticipantId {
        ParticipantId::new(format!("{tag:0>16}"))
    }

    fn action(tag: &str, n: u64) -> Transaction {
        Transaction::unsigned(TxKind::Action, pid(tag), json!({ "n": n }))
    }

    fn ledger_with(tags: &[(&str, u64)]) -> Ledger {
        let mut ledger = Ledger::new();
        for &(tag, n) in tags {
            ledger.add_transaction(action(tag, n));
            ledger.mine_block();
        }
        ledger
    }

    #[test]
    fn empty_ledger_state_root_is_sentinel() {
        let ledger = Ledger::new();
        assert_eq!(ledger.state_root(), sha256_hex(b"empty"));
    }

    #[test]
    fn identical_histories_share_state_root() {
        // Blocks differ (seal timestamps), but the transaction sets agree.
        let mut a = Ledger::new();
        let mut b = Ledger::new();
        for n in 0..3 {
            let mut tx = action("a", n);
            tx.timestamp = 1_000.0 + n as f64;
            a.add_transaction(tx.clone());
            a.mine_block();
            b.add_transaction(tx);
            b.mine_block();
        }
        assert_eq!(a.state_root(), b.state_root());
    }

    #[test]
    fn needs_sync_reports_reason() {
        let a = ledger_with(&[("a", 1)]);
        let b = ledger_with(&[("a", 1), ("b", 2)]);
        let (needs, reason) = needs_sync(&a.sync_state(), &b.sync_state());
        assert!(needs);
        assert!(reason.contains("Chain length mismatch"));

        let (needs, reason) = needs_sync(&a.sync_state(), &a.sync_state());
        assert!(!needs);
        assert_eq!(reason, "Synchronized");
    }

    #[test]
    fn merge_is_idempotent() {
        let mut mine = ledger_with(&[("a", 1)]);
        let theirs = ledger_with(&[("b", 9)]);

        let incoming: Vec<Transaction> = theirs.transactions().cloned().collect();
        assert_eq!(merge_transactions(&mut mine, incoming.clone()), 1);
        let root_after_first = mine.state_root();

        assert_eq!(merge_transactions(&mut mine, incoming), 0);
        assert_eq!(mine.state_root(), root_after_first);
    }

    #[test]
    fn resolve_conflict_cases() {
        let short = ledger_with(&[("a", 1)]);
        let long = ledger_with(&[("a", 1), ("b", 2)]);
        assert_eq!(
            resolve_conflict(&short.sync_state(), &long.sync_state()),
            ConflictResolution::RequestPeerChain
        );
        assert_eq!(
            resolve_conflict(&long.sync_state(), &short.sync_state()),
            ConflictResolution::PeerBehind
        );
        assert_eq!(
            resolve_conflict(&short.sync_state(), &short.sync_state()),
            ConflictResolution::InSync
        );

        let diverged = ledger_with(&[("c", 3)]);
        assert_eq!(
            resolve_conflict(&short.sync_state(), &diverged.sync_state()),
            ConflictResolution::Diverged
        );
    }

    #[test]
    fn handle_sync_sends_everything_on_mismatch() {
        let mine = ledger_with(&[("a", 1), ("b", 2)]);
        let peer = Ledger::new();
        match handle_sync_message(&mine, &peer.sync_state()) {
            SyncMessage::Response {
                needs_sync,
                transactions,
                ..
            } => {
                assert!(needs_sync);
                assert_eq!(transactions.unwrap().len(), 2);
            }
            SyncMessage::Request { .. } => panic!("expected a response"),
        }
    }

    #[test]
    fn in_sync_response_is_bare() {
        let mine = ledger_with(&[("a", 1)]);
        match handle_sync_message(&mine, &mine.sync_state()) {
            SyncMessage::Response {
                needs_sync,
                my_state,
                transactions,
                ..
            } => {
                assert!(!needs_sync);
                assert!(my_state.is_none());
                assert!(transactions.is_none());
            }
            SyncMessage::Request { .. } => panic!("expected a response"),
        }
    }
}
