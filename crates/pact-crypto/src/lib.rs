pub mod hash;
pub mod identity;
pub mod merkle;

pub use hash::{participant_id_from_public_key, sha256, sha256_hex};
pub use identity::{verify_signature, Identity, Seed};
pub use merkle::{fold_entry, SimpleMerkleTree};
