use serde::de::DeserializeOwned;
use serde::Serialize;

use pact_core::error::PactError;

/// Contract every commitment scheme fulfils.
///
/// The protocol engine only ever talks to this interface: it publishes the
/// root, asks for proofs against queries, and verifies proofs it receives.
/// Grid commitments are one instance; nothing about grids leaks into the
/// engine.
pub trait CommitmentScheme {
    /// Application query a proof answers (e.g. grid coordinates).
    type Query: Serialize;
    /// Scheme-specific proof object. Must serialize to a JSON object so it
    /// can ride in a proof envelope.
    type Proof: Serialize + DeserializeOwned;

    /// Wire tag identifying the proof format.
    const PROOF_TYPE: &'static str;

    /// The public commitment root (hex digest).
    fn root(&self) -> String;

    /// Build a proof answering `query`.
    fn generate_proof(&self, query: &Self::Query) -> Result<Self::Proof, PactError>;

    /// Check a proof against a published root. Stateless: verifiers hold
    /// only the root, never the committed data.
    fn verify_proof(proof: &Self::Proof, expected_root: &str) -> bool;
}
