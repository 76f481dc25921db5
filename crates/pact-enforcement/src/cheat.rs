//! Cheat evidence capture, independent claim verification, and terminal
//! invalidation.
//!
//! Evidence is structured so a third party holding only the ledger and the
//! public keys can re-run the failing check and confirm the accusation
//! without trusting the witness.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use pact_commitment::{GridCommitment, MerkleProof};
use pact_core::types::{now, ParticipantId, Timestamp};
use pact_crypto::verify_signature;
use pact_ledger::Ledger;

// ── CheatKind ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheatKind {
    /// A proof that fails Merkle verification.
    InvalidProof,
    /// A signature that does not verify against the signer's key.
    ForgedSignature,
    /// Revealed state (or refusal to reveal) contradicting the commitment.
    CommitmentMismatch,
    /// Ledger hash chain broken or rewritten.
    BlockchainTampering,
    /// An action violating the application's rules.
    InvalidMove,
    /// Deliberate stalling past a deadline.
    TimeoutStall,
    /// Acting out of turn.
    DoubleMove,
}

// ── CheatEvidence ────────────────────────────────────────────────────────────

/// One recorded cheating incident, sufficient for independent re-checking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheatEvidence {
    #[serde(rename = "cheat_type")]
    pub kind: CheatKind,
    pub cheater_id: ParticipantId,
    pub description: String,
    pub evidence: Value,
    pub timestamp: Timestamp,
    pub witness_id: ParticipantId,
}

// ── CheatDetector ────────────────────────────────────────────────────────────

/// Per-participant evidence log. The first recorded incident becomes the
/// witness's canonical claim for dispute resolution.
pub struct CheatDetector {
    witness_id: ParticipantId,
    detected: Vec<CheatEvidence>,
    opponent_is_cheater: bool,
}

/// Shareable summary of everything a witness detected.
#[derive(Clone, Debug, Serialize)]
pub struct CheatReport {
    pub detector_id: ParticipantId,
    pub opponent_is_cheater: bool,
    pub total_cheats_detected: usize,
    pub cheats: Vec<CheatEvidence>,
}

impl CheatDetector {
    pub fn new(witness_id: ParticipantId) -> Self {
        Self {
            witness_id,
            detected: Vec::new(),
            opponent_is_cheater: false,
        }
    }

    /// Record a detected incident and flag the opponent.
    pub fn record_cheat(
        &mut self,
        kind: CheatKind,
        cheater_id: ParticipantId,
        description: impl Into<String>,
        evidence: Value,
    ) -> CheatEvidence {
        let incident = CheatEvidence {
            kind,
            cheater_id,
            description: description.into(),
            evidence,
            timestamp: now(),
            witness_id: self.witness_id.clone(),
        };
        warn!(
            kind = ?incident.kind,
            cheater = %incident.cheater_id,
            description = %incident.description,
            "cheating detected"
        );
        self.detected.push(incident.clone());
        self.opponent_is_cheater = true;
        incident
    }

    pub fn has_detected_cheating(&self) -> bool {
        !self.detected.is_empty()
    }

    pub fn opponent_is_cheater(&self) -> bool {
        self.opponent_is_cheater
    }

    /// The canonical claim: the first incident recorded.
    pub fn cheating_proof(&self) -> Option<&CheatEvidence> {
        self.detected.first()
    }

    pub fn detected(&self) -> &[CheatEvidence] {
        &self.detected
    }

    /// Restore the opponent flag from a snapshot. Evidence objects do not
    /// survive restarts; only the verdict does.
    pub fn restore_opponent_flag(&mut self, opponent_is_cheater: bool) {
        self.opponent_is_cheater = opponent_is_cheater;
    }

    pub fn report(&self) -> CheatReport {
        CheatReport {
            detector_id: self.witness_id.clone(),
            opponent_is_cheater: self.opponent_is_cheater,
            total_cheats_detected: self.detected.len(),
            cheats: self.detected.clone(),
        }
    }
}

// ── Independent verification ─────────────────────────────────────────────────

/// Re-run the check a piece of evidence claims to have failed.
///
/// Returns true when the claim holds up: the embedded proof really does not
/// verify, the embedded signature really is forged, or the ledger really is
/// tampered. Kinds that depend on protocol-layer history (turn order,
/// stalling, rule violations) cannot be re-checked from evidence alone and
/// return false.
pub fn verify_cheat_claim(
    evidence: &CheatEvidence,
    ledger: Option<&Ledger>,
    alleged_cheater_public_key: Option<&str>,
) -> bool {
    match evidence.kind {
        CheatKind::InvalidProof => {
            let Some(proof_value) = evidence.evidence.get("proof") else {
                return false;
            };
            let Some(root) = evidence.evidence.get("commitment_root").and_then(Value::as_str)
            else {
                return false;
            };
            let Ok(proof) = serde_json::from_value::<MerkleProof>(proof_value.clone()) else {
                return false;
            };
            !GridCommitment::verify(&proof, root)
        }
        CheatKind::ForgedSignature => {
            let Some(message) = evidence.evidence.get("message").and_then(Value::as_str) else {
                return false;
            };
            let Some(signature) = evidence.evidence.get("signature").and_then(Value::as_str)
            else {
                return false;
            };
            let Some(public_key) = alleged_cheater_public_key else {
                return false;
            };
            !verify_signature(message.as_bytes(), signature, public_key)
        }
        CheatKind::BlockchainTampering => match ledger {
            Some(ledger) => !ledger.verify_chain(),
            None => false,
        },
        _ => false,
    }
}

// ── Invalidator ──────────────────────────────────────────────────────────────

/// Terminal invalidation registry. Once a participant lands here, every
/// further action from them is rejected; there is no rehabilitation.
#[derive(Default)]
pub struct Invalidator {
    invalidated: HashMap<ParticipantId, CheatEvidence>,
}

/// End-of-protocol record synthesized when one side is invalidated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForfeitRecord {
    pub game_over: bool,
    pub winner: ParticipantId,
    pub cheater: ParticipantId,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheat_type: Option<CheatKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<CheatEvidence>,
    pub timestamp: Timestamp,
}

impl Invalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self, participant_id: ParticipantId, evidence: CheatEvidence) {
        warn!(
            participant = %participant_id,
            kind = ?evidence.kind,
            reason = %evidence.description,
            "participant invalidated"
        );
        // First proven incident wins; later evidence does not overwrite it.
        self.invalidated.entry(participant_id).or_insert(evidence);
    }

    pub fn is_invalidated(&self, participant_id: &ParticipantId) -> bool {
        self.invalidated.contains_key(participant_id)
    }

    pub fn invalidation_proof(&self, participant_id: &ParticipantId) -> Option<&CheatEvidence> {
        self.invalidated.get(participant_id)
    }

    pub fn invalidated_ids(&self) -> Vec<&ParticipantId> {
        self.invalidated.keys().collect()
    }

    /// Synthesize the forfeit record awarding the protocol to `winner`.
    pub fn forfeit(&self, cheater: &ParticipantId, winner: &ParticipantId) -> ForfeitRecord {
        let evidence = self.invalidated.get(cheater);
        ForfeitRecord {
            game_over: true,
            winner: winner.clone(),
            cheater: cheater.clone(),
            reason: "opponent_caught_cheating".to_string(),
            cheat_type: evidence.map(|e| e.kind),
            evidence: evidence.cloned(),
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_commitment::CommitmentScheme;
    use pact_core::transaction::{Transaction, TxKind};
    use pact_crypto::identity::{Identity, Seed};
    use serde_json::json;

    fn pid(tag: &str) -> ParticipantId {
        ParticipantId::new(format!("{tag:0>16}"))
    }

    #[test]
    fn recording_flags_opponent_and_keeps_first_claim() {
        let mut detector = CheatDetector::new(pid("w"));
        assert!(!detector.has_detected_cheating());
        detector.record_cheat(CheatKind::DoubleMove, pid("c"), "moved twice", json!({}));
        detector.record_cheat(CheatKind::TimeoutStall, pid("c"), "stalled", json!({}));

        assert!(detector.opponent_is_cheater());
        assert_eq!(detector.cheating_proof().unwrap().kind, CheatKind::DoubleMove);
        assert_eq!(detector.report().total_cheats_detected, 2);
    }

    #[test]
    fn invalid_proof_claim_verifies_independently() {
        let seed = Seed::from_bytes([3u8; 32]);
        let commitment = GridCommitment::new(&[(1, 1)], &seed, 4).unwrap();
        let root = commitment.root();

        let mut proof = commitment.prove(1, 1).unwrap();
        proof.has_mark = false;
        proof.result = pact_core::types::CellResult::Miss;

        let mut detector = CheatDetector::new(pid("w"));
        let evidence = detector.record_cheat(
            CheatKind::InvalidProof,
            pid("c"),
            "proof failed verification",
            json!({
                "proof": serde_json::to_value(&proof).unwrap(),
                "commitment_root": root,
            }),
        );
        assert!(verify_cheat_claim(&evidence, None, None));

        // A claim against an honest proof does not hold up.
        let honest = commitment.prove(1, 1).unwrap();
        let bogus = detector.record_cheat(
            CheatKind::InvalidProof,
            pid("c"),
            "bogus accusation",
            json!({
                "proof": serde_json::to_value(&honest).unwrap(),
                "commitment_root": commitment.root(),
            }),
        );
        assert!(!verify_cheat_claim(&bogus, None, None));
    }

    #[test]
    fn forged_signature_claim_verifies_independently() {
        let honest = Identity::derive(&Seed::from_bytes([1u8; 32]), &json!([[0, 0]])).unwrap();
        let forger = Identity::derive(&Seed::from_bytes([2u8; 32]), &json!([[0, 0]])).unwrap();
        let message = "{\"action_type\":\"query\"}";
        let forged_sig = forger.sign(message.as_bytes());

        let mut detector = CheatDetector::new(pid("w"));
        let evidence = detector.record_cheat(
            CheatKind::ForgedSignature,
            pid("c"),
            "signature does not verify",
            json!({ "message": message, "signature": forged_sig }),
        );
        assert!(verify_cheat_claim(
            &evidence,
            None,
            Some(&honest.public_key_hex())
        ));
        // Against the forger's own key the signature is fine, so no claim.
        assert!(!verify_cheat_claim(
            &evidence,
            None,
            Some(&forger.public_key_hex())
        ));
    }

    #[test]
    fn tampering_claim_requires_a_broken_ledger() {
        let mut ledger = Ledger::new();
        ledger.add_transaction(Transaction::unsigned(
            TxKind::Action,
            pid("a"),
            json!({"n": 1}),
        ));
        ledger.mine_block();

        let mut detector = CheatDetector::new(pid("w"));
        let evidence = detector.record_cheat(
            CheatKind::BlockchainTampering,
            pid("c"),
            "chain does not verify",
            json!({}),
        );
        assert!(!verify_cheat_claim(&evidence, Some(&ledger), None));

        ledger.blocks_mut()[1].transactions[0].data = json!({"n": 2});
        assert!(verify_cheat_claim(&evidence, Some(&ledger), None));
    }

    #[test]
    fn invalidation_is_terminal_and_forfeit_carries_evidence() {
        let mut detector = CheatDetector::new(pid("w"));
        let evidence =
            detector.record_cheat(CheatKind::DoubleMove, pid("c"), "moved twice", json!({}));

        let mut invalidator = Invalidator::new();
        invalidator.invalidate(pid("c"), evidence);
        assert!(invalidator.is_invalidated(&pid("c")));

        let later =
            detector.record_cheat(CheatKind::TimeoutStall, pid("c"), "stalled", json!({}));
        invalidator.invalidate(pid("c"), later);
        assert_eq!(
            invalidator.invalidation_proof(&pid("c")).unwrap().kind,
            CheatKind::DoubleMove
        );

        let record = invalidator.forfeit(&pid("c"), &pid("w"));
        assert!(record.game_over);
        assert_eq!(record.cheat_type, Some(CheatKind::DoubleMove));
        assert_eq!(record.winner, pid("w"));
    }
}
