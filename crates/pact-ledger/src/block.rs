use serde::{Deserialize, Serialize};

use pact_core::canonical::canonical_json;
use pact_core::constants::GENESIS_PREV_HASH;
use pact_core::transaction::Transaction;
use pact_core::types::{now, Timestamp};
use pact_crypto::sha256_hex;

/// One sealed batch of transactions, hash-linked to its predecessor.
///
/// The block hash covers the previous hash, the canonical JSON of the full
/// transaction list, the block number and the seal timestamp, so any
/// mutation or reordering inside the block is detectable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub prev_hash: String,
    pub transactions: Vec<Transaction>,
    pub block_number: u64,
    pub timestamp: Timestamp,
    pub hash: String,
}

impl Block {
    /// Seal `transactions` into a new block. Computes the seal timestamp
    /// and hash; deserialization keeps stored values instead.
    pub fn new(prev_hash: String, transactions: Vec<Transaction>, block_number: u64) -> Self {
        let mut block = Self {
            prev_hash,
            transactions,
            block_number,
            timestamp: now(),
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The well-known first block: all-zero previous hash, no transactions.
    pub fn genesis() -> Self {
        Self::new(GENESIS_PREV_HASH.to_string(), Vec::new(), 0)
    }

    /// Recompute this block's hash from its contents.
    pub fn compute_hash(&self) -> String {
        let transactions = canonical_json(&self.transactions)
            .expect("transaction serialization is infallible");
        let timestamp = serde_json::to_string(&self.timestamp)
            .expect("finite timestamp serialization is infallible");
        let preimage = format!(
            "{}:{}:{}:{}",
            self.prev_hash, transactions, self.block_number, timestamp
        );
        sha256_hex(preimage.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_core::transaction::TxKind;
    use pact_core::types::ParticipantId;
    use serde_json::json;

    #[test]
    fn genesis_shape() {
        let g = Block::genesis();
        assert_eq!(g.prev_hash, GENESIS_PREV_HASH);
        assert_eq!(g.block_number, 0);
        assert!(g.transactions.is_empty());
        assert_eq!(g.hash, g.compute_hash());
    }

    #[test]
    fn hash_detects_payload_mutation() {
        let tx = Transaction::unsigned(
            TxKind::Action,
            ParticipantId::new("a1b2c3d4e5f60718"),
            json!({"x": 1}),
        );
        let mut block = Block::new(Block::genesis().hash, vec![tx], 1);
        assert_eq!(block.hash, block.compute_hash());
        block.transactions[0].data = json!({"x": 2});
        assert_ne!(block.hash, block.compute_hash());
    }

    #[test]
    fn stored_hash_survives_round_trip() {
        let block = Block::new(Block::genesis().hash, Vec::new(), 1);
        let back: Block = serde_json::from_str(&serde_json::to_string(&block).unwrap()).unwrap();
        assert_eq!(back.hash, block.hash);
        assert_eq!(back.timestamp, block.timestamp);
        assert_eq!(back.hash, back.compute_hash());
    }
}
