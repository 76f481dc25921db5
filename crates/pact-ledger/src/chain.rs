use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pact_core::error::PactError;
use pact_core::transaction::Transaction;
use pact_core::types::ParticipantId;

use crate::block::Block;

/// Append-only hash-linked ledger with a pending transaction pool.
///
/// Sequence numbers are ledger-wide and strictly increasing in insertion
/// order; a separate per-participant counter tracks how many transactions
/// each participant has contributed. "Mining" here performs no work — it
/// seals the pending batch into a block chained to the previous one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Ledger {
    chain: Vec<Block>,
    #[serde(rename = "pending_transactions")]
    pending: Vec<Transaction>,
    transaction_sequence: u64,
    participant_sequences: BTreeMap<ParticipantId, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
            pending: Vec::new(),
            transaction_sequence: 0,
            participant_sequences: BTreeMap::new(),
        }
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Add a transaction to the pending pool, assigning the next sequence
    /// number when none is set. Transactions arriving from a peer keep their
    /// sequence number; the global counter advances past it so later local
    /// transactions can never collide.
    pub fn add_transaction(&mut self, mut tx: Transaction) -> u64 {
        if tx.sequence_number == 0 {
            self.transaction_sequence += 1;
            tx.sequence_number = self.transaction_sequence;
        } else {
            self.transaction_sequence = self.transaction_sequence.max(tx.sequence_number);
        }
        *self
            .participant_sequences
            .entry(tx.participant_id.clone())
            .or_insert(0) += 1;
        let seq = tx.sequence_number;
        self.pending.push(tx);
        seq
    }

    /// Seal the pending pool into a new block. Returns `None` when there is
    /// nothing to seal.
    pub fn mine_block(&mut self) -> Option<&Block> {
        if self.pending.is_empty() {
            return None;
        }
        let prev_hash = self.last_block().hash.clone();
        let block_number = self.chain.len() as u64;
        let block = Block::new(prev_hash, std::mem::take(&mut self.pending), block_number);
        self.chain.push(block);
        self.chain.last()
    }

    // ── Verification ─────────────────────────────────────────────────────────

    /// Check every hash link and recompute every block hash.
    pub fn verify_chain(&self) -> bool {
        for window in self.chain.windows(2) {
            let (prev, current) = (&window[0], &window[1]);
            if current.prev_hash != prev.hash {
                return false;
            }
            if current.hash != current.compute_hash() {
                return false;
            }
        }
        true
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn last_block(&self) -> &Block {
        self.chain.last().expect("chain always contains genesis")
    }

    pub fn block_count(&self) -> usize {
        self.chain.len()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// All sealed transactions in ledger order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.chain.iter().flat_map(|block| block.transactions.iter())
    }

    pub fn total_transactions(&self) -> usize {
        self.chain.iter().map(|b| b.transactions.len()).sum()
    }

    pub fn transactions_by_participant(&self, id: &ParticipantId) -> Vec<&Transaction> {
        self.transactions()
            .filter(|tx| &tx.participant_id == id)
            .collect()
    }

    /// Whether a transaction with this (participant, sequence) pair exists in
    /// the chain or the pending pool. Used for merge deduplication.
    pub fn contains(&self, id: &ParticipantId, sequence_number: u64) -> bool {
        self.transactions()
            .chain(self.pending.iter())
            .any(|tx| &tx.participant_id == id && tx.sequence_number == sequence_number)
    }

    pub fn transaction_sequence(&self) -> u64 {
        self.transaction_sequence
    }

    pub fn participant_sequences(&self) -> &BTreeMap<ParticipantId, u64> {
        &self.participant_sequences
    }

    pub fn participant_sequence(&self, id: &ParticipantId) -> u64 {
        self.participant_sequences.get(id).copied().unwrap_or(0)
    }

    // ── Chain adoption ───────────────────────────────────────────────────────

    /// Replace our chain with a peer's, after verifying its integrity.
    ///
    /// This is the conflict-resolution endgame: when the peer's chain wins
    /// (longer, or chosen by the application on an equal-length tie), we
    /// adopt it wholesale and rebuild the counters from its contents.
    /// Pending transactions already present in the adopted chain are
    /// dropped; the rest stay queued for the next mine.
    pub fn adopt_chain(&mut self, chain: Vec<Block>) -> Result<(), PactError> {
        let Some(genesis) = chain.first() else {
            return Err(PactError::InvalidInput("adopted chain is empty".into()));
        };
        if genesis.block_number != 0 || !genesis.transactions.is_empty() {
            return Err(PactError::InvalidInput("adopted chain has no genesis".into()));
        }
        for window in chain.windows(2) {
            let (prev, current) = (&window[0], &window[1]);
            if current.prev_hash != prev.hash || current.hash != current.compute_hash() {
                return Err(PactError::InvalidInput(
                    "adopted chain fails verification".into(),
                ));
            }
        }

        let adopted: Vec<(ParticipantId, u64)> = chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .map(|tx| (tx.participant_id.clone(), tx.sequence_number))
            .collect();
        self.pending
            .retain(|tx| !adopted.contains(&(tx.participant_id.clone(), tx.sequence_number)));

        let mut participant_sequences: BTreeMap<ParticipantId, u64> = BTreeMap::new();
        let mut max_sequence = 0;
        for (participant, sequence) in &adopted {
            *participant_sequences.entry(participant.clone()).or_insert(0) += 1;
            max_sequence = max_sequence.max(*sequence);
        }
        for tx in &self.pending {
            *participant_sequences
                .entry(tx.participant_id.clone())
                .or_insert(0) += 1;
            max_sequence = max_sequence.max(tx.sequence_number);
        }

        self.chain = chain;
        self.participant_sequences = participant_sequences;
        self.transaction_sequence = self.transaction_sequence.max(max_sequence);
        Ok(())
    }

    // ── Mutation for tests and tamper evidence checks ────────────────────────

    /// Mutable block access. Exists so tamper-evidence checks (and tests)
    /// can corrupt a chain and watch verification fail; regular protocol
    /// code never mutates sealed blocks.
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.chain
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
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

    #[test]
    fn sequence_numbers_assigned_in_order() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.add_transaction(action("a", 1)), 1);
        assert_eq!(ledger.add_transaction(action("b", 2)), 2);
        assert_eq!(ledger.add_transaction(action("a", 3)), 3);
        assert_eq!(ledger.participant_sequence(&pid("a")), 2);
        assert_eq!(ledger.participant_sequence(&pid("b")), 1);
    }

    #[test]
    fn preassigned_sequence_advances_counter() {
        let mut ledger = Ledger::new();
        let mut tx = action("a", 1);
        tx.sequence_number = 7;
        ledger.add_transaction(tx);
        // Next locally assigned sequence must land above the merged one.
        assert_eq!(ledger.add_transaction(action("b", 2)), 8);
    }

    #[test]
    fn mine_seals_and_clears_pending() {
        let mut ledger = Ledger::new();
        ledger.add_transaction(action("a", 1));
        let block_hash = ledger.mine_block().unwrap().hash.clone();
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.block_count(), 2);
        assert_eq!(ledger.last_block().hash, block_hash);
        assert!(ledger.mine_block().is_none());
    }

    #[test]
    fn verify_chain_detects_tampering() {
        let mut ledger = Ledger::new();
        for i in 0..3 {
            ledger.add_transaction(action("a", i));
            ledger.mine_block();
        }
        assert!(ledger.verify_chain());

        let mut tampered = ledger.clone();
        tampered.blocks_mut()[1].transactions[0].data = json!({ "n": 99 });
        assert!(!tampered.verify_chain());

        let mut relinked = ledger.clone();
        relinked.blocks_mut()[2].prev_hash = "00".repeat(32);
        assert!(!relinked.verify_chain());
    }

    #[test]
    fn adopt_chain_replaces_history_and_rebuilds_counters() {
        let mut winner = Ledger::new();
        winner.add_transaction(action("a", 1));
        winner.add_transaction(action("b", 2));
        winner.mine_block();

        let mut loser = Ledger::new();
        loser.add_transaction(action("c", 9));
        loser.mine_block();

        loser.adopt_chain(winner.blocks().to_vec()).unwrap();
        assert_eq!(loser.last_block().hash, winner.last_block().hash);
        assert_eq!(loser.state_root(), winner.state_root());
        assert_eq!(loser.participant_sequence(&pid("a")), 1);
        assert_eq!(loser.participant_sequence(&pid("c")), 0);
        assert!(loser.verify_chain());
    }

    #[test]
    fn adopt_chain_rejects_a_broken_candidate() {
        let mut winner = Ledger::new();
        winner.add_transaction(action("a", 1));
        winner.mine_block();
        let mut blocks = winner.blocks().to_vec();
        blocks[1].transactions[0].data = json!({ "n": 99 });

        let mut loser = Ledger::new();
        assert!(loser.adopt_chain(blocks).is_err());
        assert!(loser.adopt_chain(Vec::new()).is_err());
    }

    #[test]
    fn serde_round_trip_preserves_everything() {
        let mut ledger = Ledger::new();
        ledger.add_transaction(action("a", 1));
        ledger.mine_block();
        ledger.add_transaction(action("b", 2));

        let encoded = serde_json::to_string(&ledger).unwrap();
        let back: Ledger = serde_json::from_str(&encoded).unwrap();

        assert_eq!(back, ledger);
        assert!(back.verify_chain());
        assert_eq!(back.last_block().hash, ledger.last_block().hash);
        assert_eq!(back.transaction_sequence(), ledger.transaction_sequence());
        assert_eq!(back.pending().len(), 1);
    }
}
