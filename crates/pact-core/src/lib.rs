pub mod canonical;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod transaction;
pub mod types;

pub use canonical::{canonical_json, canonical_value};
pub use constants::*;
pub use envelope::{
    ActionEnvelope, CommitmentEnvelope, ProofEnvelope, Revelation, VerificationRecord,
};
pub use error::{PactError, VerificationResult};
pub use transaction::{Transaction, TxKind};
pub use types::*;
