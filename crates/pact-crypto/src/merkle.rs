//! Binary SHA-256 Merkle tree with inclusion proofs.
//!
//! Leaves are the SHA-256 of each input entry, so a proof can carry the
//! entry itself (here: an already-hashed hex digest) without exposing
//! anything below it. A level with an odd node count pairs its last node
//! with itself; proof generation and verification agree on that rule.

use pact_core::error::PactError;
use pact_core::types::ProofStep;

use crate::hash::sha256;

pub struct SimpleMerkleTree {
    /// levels[0] are the leaves; the last level holds the single root.
    /// Empty input produces no levels at all.
    levels: Vec<Vec<[u8; 32]>>,
}

impl SimpleMerkleTree {
    pub fn new(entries: &[String]) -> Self {
        let leaves: Vec<[u8; 32]> = entries.iter().map(|e| sha256(e.as_bytes())).collect();
        Self {
            levels: Self::build(leaves),
        }
    }

    fn build(leaves: Vec<[u8; 32]>) -> Vec<Vec<[u8; 32]>> {
        if leaves.is_empty() {
            return Vec::new();
        }
        let mut levels = vec![leaves];
        while levels.last().map(Vec::len) != Some(1) {
            let current = levels.last().expect("levels is non-empty");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut joined = [0u8; 64];
                joined[..32].copy_from_slice(&left);
                joined[32..].copy_from_slice(&right);
                next.push(sha256(&joined));
            }
            levels.push(next);
        }
        levels
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Root digest; `None` for the empty tree.
    pub fn root(&self) -> Option<[u8; 32]> {
        self.levels.last().map(|level| level[0])
    }

    /// Hex-encoded root. The empty tree returns the empty-string sentinel.
    pub fn root_hex(&self) -> String {
        self.root().map(hex::encode).unwrap_or_default()
    }

    /// Inclusion proof for the leaf at `index`: sibling digests from leaf
    /// level up to (but not including) the root.
    pub fn proof(&self, index: usize) -> Result<Vec<ProofStep>, PactError> {
        if index >= self.leaf_count() {
            return Err(PactError::LeafOutOfRange {
                index,
                len: self.leaf_count(),
            });
        }

        let mut path = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut current = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = current ^ 1;
            let (hash, is_left) = if sibling < level.len() {
                (level[sibling], sibling < current)
            } else {
                // Odd node count: the node pairs with itself on the right.
                (level[current], false)
            };
            path.push(ProofStep {
                hash: hex::encode(hash),
                is_left,
            });
            current /= 2;
        }
        Ok(path)
    }

    /// Verify that `entry` folds through `path` to this tree's root.
    pub fn verify(&self, entry: &str, path: &[ProofStep]) -> bool {
        match (fold_entry(entry, path), self.root()) {
            (Some(folded), Some(root)) => folded == root,
            _ => false,
        }
    }
}

/// Fold an entry through an inclusion path: start from SHA-256(entry), then
/// hash sibling-first or sibling-second per step. Returns `None` when a
/// sibling digest is not 32 bytes of hex.
pub fn fold_entry(entry: &str, path: &[ProofStep]) -> Option<[u8; 32]> {
    let mut current = sha256(entry.as_bytes());
    for step in path {
        let sibling = hex::decode(&step.hash).ok()?;
        let sibling: [u8; 32] = sibling.try_into().ok()?;
        let mut joined = [0u8; 64];
        if step.is_left {
            joined[..32].copy_from_slice(&sibling);
            joined[32..].copy_from_slice(&current);
        } else {
            joined[..32].copy_from_slice(&current);
            joined[32..].copy_from_slice(&sibling);
        }
        current = sha256(&joined);
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("entry-{i}")).collect()
    }

    #[test]
    fn empty_tree_has_sentinel_root() {
        let tree = SimpleMerkleTree::new(&[]);
        assert_eq!(tree.root_hex(), "");
        assert!(tree.proof(0).is_err());
    }

    #[test]
    fn single_leaf_root_is_leaf_hash() {
        let tree = SimpleMerkleTree::new(&["only".to_string()]);
        assert_eq!(tree.root_hex(), hex::encode(sha256(b"only")));
        assert!(tree.verify("only", &tree.proof(0).unwrap()));
    }

    #[test]
    fn all_proofs_verify_even_and_odd_counts() {
        for n in [2usize, 3, 4, 5, 7, 8, 16] {
            let data = entries(n);
            let tree = SimpleMerkleTree::new(&data);
            for (i, entry) in data.iter().enumerate() {
                let path = tree.proof(i).unwrap();
                assert!(tree.verify(entry, &path), "leaf {i} of {n} failed");
            }
        }
    }

    #[test]
    fn wrong_entry_fails() {
        let data = entries(4);
        let tree = SimpleMerkleTree::new(&data);
        let path = tree.proof(2).unwrap();
        assert!(!tree.verify("entry-3", &path));
    }

    #[test]
    fn tampered_sibling_fails() {
        let data = entries(8);
        let tree = SimpleMerkleTree::new(&data);
        let mut path = tree.proof(5).unwrap();
        let mut bytes = hex::decode(&path[1].hash).unwrap();
        bytes[0] ^= 0x01;
        path[1].hash = hex::encode(bytes);
        assert!(!tree.verify("entry-5", &path));
    }

    #[test]
    fn malformed_sibling_hex_folds_to_none() {
        let path = vec![ProofStep {
            hash: "zz".into(),
            is_left: false,
        }];
        assert!(fold_entry("entry", &path).is_none());
    }

    #[test]
    fn root_changes_with_any_entry() {
        let a = SimpleMerkleTree::new(&entries(5));
        let mut changed = entries(5);
        changed[3] = "entry-3x".into();
        let b = SimpleMerkleTree::new(&changed);
        assert_ne!(a.root_hex(), b.root_hex());
    }
}
