pub mod grid;
pub mod scheme;

pub use grid::{GridCommitment, MerkleProof};
pub use scheme::CommitmentScheme;
