use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use pact_core::constants::DIGEST_HEX_CHARS;
use pact_core::error::PactError;
use pact_core::types::{CellResult, ProofStep};
use pact_crypto::identity::Seed;
use pact_crypto::merkle::{fold_entry, SimpleMerkleTree};
use pact_crypto::sha256_hex;

use crate::scheme::CommitmentScheme;

/// Mark flag encoding inside a leaf. Existing roots depend on this
/// byte-exact form; do not change it.
const MARK_TRUE: &str = "True";
const MARK_FALSE: &str = "False";

// ── MerkleProof ──────────────────────────────────────────────────────────────

/// Proof that one grid cell is (or is not) marked, relative to a published
/// commitment root.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MerkleProof {
    pub position: (u32, u32),
    #[serde(rename = "has_value")]
    pub has_mark: bool,
    pub result: CellResult,
    /// Hex digest of the cell leaf. Already a hash, so the proof exposes
    /// nothing about the seed or the other cells.
    pub leaf_data: String,
    #[serde(rename = "merkle_path")]
    pub path: Vec<ProofStep>,
}

// ── GridCommitment ───────────────────────────────────────────────────────────

/// Binds an N×N boolean grid to a single Merkle root.
///
/// Each cell leaf is `SHA-256(seed ‖ "x:y:mark")`, so leaves are unguessable
/// without the seed while any single cell can be opened by publishing its
/// leaf digest and inclusion path.
pub struct GridCommitment {
    marked: BTreeSet<(u32, u32)>,
    size: u32,
    leaves: Vec<String>,
    tree: SimpleMerkleTree,
}

impl GridCommitment {
    pub fn new(
        marked_positions: &[(u32, u32)],
        seed: &Seed,
        size: u32,
    ) -> Result<Self, PactError> {
        let marked: BTreeSet<(u32, u32)> = marked_positions.iter().copied().collect();
        for &(x, y) in &marked {
            if x >= size || y >= size {
                return Err(PactError::MarkOutOfRange { x, y, size });
            }
        }

        // Row-major: leaf index = x·N + y.
        let mut leaves = Vec::with_capacity((size as usize).pow(2));
        for x in 0..size {
            for y in 0..size {
                leaves.push(leaf_hex(seed, x, y, marked.contains(&(x, y))));
            }
        }
        let tree = SimpleMerkleTree::new(&leaves);

        Ok(Self {
            marked,
            size,
            leaves,
            tree,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn root_hex(&self) -> String {
        self.tree.root_hex()
    }

    /// Build the single-cell proof for (x, y).
    pub fn prove(&self, x: u32, y: u32) -> Result<MerkleProof, PactError> {
        if x >= self.size || y >= self.size {
            return Err(PactError::OutOfRange {
                x,
                y,
                size: self.size,
            });
        }
        let index = (x * self.size + y) as usize;
        let has_mark = self.marked.contains(&(x, y));
        Ok(MerkleProof {
            position: (x, y),
            has_mark,
            result: CellResult::from_mark(has_mark),
            leaf_data: self.leaves[index].clone(),
            path: self.tree.proof(index)?,
        })
    }

    /// Verify a proof against a published root.
    ///
    /// Checks, in order: result/mark consistency, leaf encoding (one hex
    /// digest), and the Merkle refold. Position binding is enforced one
    /// layer up by the signature over the proof envelope and, ultimately,
    /// by the post-protocol revelation.
    pub fn verify(proof: &MerkleProof, expected_root: &str) -> bool {
        if !proof.result.matches(proof.has_mark) {
            return false;
        }
        if proof.leaf_data.len() != DIGEST_HEX_CHARS
            || hex::decode(&proof.leaf_data).is_err()
        {
            return false;
        }
        match fold_entry(&proof.leaf_data, &proof.path) {
            Some(folded) => hex::encode(folded) == expected_root,
            None => false,
        }
    }
}

impl CommitmentScheme for GridCommitment {
    type Query = (u32, u32);
    type Proof = MerkleProof;

    const PROOF_TYPE: &'static str = "merkle";

    fn root(&self) -> String {
        self.root_hex()
    }

    fn generate_proof(&self, query: &Self::Query) -> Result<Self::Proof, PactError> {
        self.prove(query.0, query.1)
    }

    fn verify_proof(proof: &Self::Proof, expected_root: &str) -> bool {
        Self::verify(proof, expected_root)
    }
}

fn leaf_hex(seed: &Seed, x: u32, y: u32, has_mark: bool) -> String {
    let mark = if has_mark { MARK_TRUE } else { MARK_FALSE };
    let mut bytes = Vec::with_capacity(seed.as_bytes().len() + 16);
    bytes.extend_from_slice(seed.as_bytes());
    bytes.extend_from_slice(format!("{x}:{y}:{mark}").as_bytes());
    sha256_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(byte: u8) -> Seed {
        Seed::from_bytes([byte; 32])
    }

    fn commitment() -> GridCommitment {
        GridCommitment::new(&[(0, 0), (1, 2)], &seed(0), 4).unwrap()
    }

    #[test]
    fn root_is_deterministic() {
        assert_eq!(commitment().root_hex(), commitment().root_hex());
    }

    #[test]
    fn root_depends_on_seed_and_positions() {
        let base = commitment().root_hex();
        let other_seed = GridCommitment::new(&[(0, 0), (1, 2)], &seed(1), 4).unwrap();
        let other_marks = GridCommitment::new(&[(0, 0), (1, 3)], &seed(0), 4).unwrap();
        assert_ne!(base, other_seed.root_hex());
        assert_ne!(base, other_marks.root_hex());
    }

    #[test]
    fn every_cell_proves_and_verifies() {
        let c = commitment();
        let root = c.root_hex();
        for x in 0..4 {
            for y in 0..4 {
                let proof = c.prove(x, y).unwrap();
                assert_eq!(proof.has_mark, (x, y) == (0, 0) || (x, y) == (1, 2));
                assert!(GridCommitment::verify(&proof, &root), "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn flipped_mark_fails() {
        let c = commitment();
        let root = c.root_hex();
        let mut proof = c.prove(1, 2).unwrap();
        proof.has_mark = false;
        proof.result = CellResult::Miss;
        assert!(!GridCommitment::verify(&proof, &root));
    }

    #[test]
    fn result_mark_mismatch_fails() {
        let c = commitment();
        let mut proof = c.prove(3, 3).unwrap();
        proof.result = CellResult::Hit;
        assert!(!GridCommitment::verify(&proof, &c.root_hex()));
    }

    #[test]
    fn tampered_leaf_fails() {
        let c = commitment();
        let mut proof = c.prove(2, 2).unwrap();
        let mut bytes = hex::decode(&proof.leaf_data).unwrap();
        bytes[0] ^= 0x01;
        proof.leaf_data = hex::encode(bytes);
        assert!(!GridCommitment::verify(&proof, &c.root_hex()));
    }

    #[test]
    fn tampered_path_fails() {
        let c = commitment();
        let mut proof = c.prove(2, 2).unwrap();
        proof.path[0].is_left = !proof.path[0].is_left;
        assert!(!GridCommitment::verify(&proof, &c.root_hex()));
    }

    #[test]
    fn truncated_leaf_fails() {
        let c = commitment();
        let mut proof = c.prove(0, 1).unwrap();
        proof.leaf_data.truncate(32);
        assert!(!GridCommitment::verify(&proof, &c.root_hex()));
    }

    #[test]
    fn out_of_range_rejected() {
        let c = commitment();
        assert!(matches!(c.prove(4, 0), Err(PactError::OutOfRange { .. })));
        assert!(matches!(c.prove(0, 4), Err(PactError::OutOfRange { .. })));
    }

    #[test]
    fn out_of_range_mark_rejected() {
        let err = GridCommitment::new(&[(5, 0)], &seed(0), 4);
        assert!(matches!(err, Err(PactError::MarkOutOfRange { .. })));
    }

    #[test]
    fn proof_does_not_expose_seed() {
        let s = seed(0x42);
        let c = GridCommitment::new(&[(1, 1)], &s, 4).unwrap();
        let proof = c.prove(1, 1).unwrap();
        let encoded = serde_json::to_string(&proof).unwrap();
        assert!(!encoded.contains(&s.to_hex()));
    }
}
