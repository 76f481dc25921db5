use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use pact_commitment::{CommitmentScheme, GridCommitment, MerkleProof};
use pact_core::canonical::{canonical_json, canonical_value};
use pact_core::constants::DEFAULT_STALL_THRESHOLD;
use pact_core::envelope::{
    ActionEnvelope, CommitmentEnvelope, ProofEnvelope, Revelation, VerificationRecord,
};
use pact_core::error::{PactError, VerificationResult};
use pact_core::transaction::{Transaction, TxKind};
use pact_core::types::{now, ParticipantId};
use pact_crypto::identity::{Identity, Seed};
use pact_crypto::verify_signature;
use pact_enforcement::{
    ActionTimeouts, CheatDetector, CheatEvidence, CheatKind, CheatReport, DisputeLog,
    HealthMonitor, Invalidator, RetryTracker, TimeoutConfig,
};
use pact_ledger::{merge_transactions, Ledger, SyncState};

use crate::turns::TurnEnforcer;

/// Action id reserved for the post-protocol revelation deadline. Expiry of
/// this action is a commitment violation, not an ordinary stall.
pub const REVEAL_ACTION_ID: &str = "post_game_reveal";

type ViolationCallback = Box<dyn Fn(&CheatEvidence) + Send>;
type DisconnectCallback = Box<dyn Fn() + Send>;

// ── Phase ────────────────────────────────────────────────────────────────────

/// Protocol lifecycle. `Forfeit` is terminal and reachable from any phase
/// the moment an invalidation is recorded against the peer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolPhase {
    Init,
    CommitmentExchanged,
    Active,
    Revealing,
    Complete,
    Forfeit,
}

// ── Config ───────────────────────────────────────────────────────────────────

pub struct EngineConfig {
    /// Turn order, deadlines and invalidation. Disabling reduces the engine
    /// to pure record-keeping.
    pub enforcement: bool,
    pub timeouts: TimeoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enforcement: true,
            timeouts: TimeoutConfig::default(),
        }
    }
}

// ── State views ──────────────────────────────────────────────────────────────

/// Inspection snapshot of the full protocol state. Everything here is
/// recomputable from the ledger by any third party.
#[derive(Clone, Debug, Serialize)]
pub struct ProtocolState {
    pub phase: ProtocolPhase,
    pub protocol_active: bool,
    pub my_participant_id: ParticipantId,
    pub opponent_participant_id: Option<ParticipantId>,
    pub my_actions_count: u64,
    pub opponent_actions_count: u64,
    pub blockchain_blocks: usize,
    pub total_transactions: usize,
    pub blockchain_valid: bool,
    pub all_signatures_valid: bool,
    pub current_turn: Option<ParticipantId>,
    pub opponent_revealed: bool,
    pub pending_actions: Vec<String>,
    pub invalidated: Vec<ParticipantId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProtocolHealth {
    pub protocol_active: bool,
    pub blockchain_valid: bool,
    pub enforcement_enabled: bool,
    pub pending_actions: usize,
    pub current_turn: Option<ParticipantId>,
    pub cheats_detected: usize,
    pub opponent_is_cheater: bool,
    pub monitor: pact_enforcement::HealthReport,
}

// ── ProtocolEngine ───────────────────────────────────────────────────────────

/// The protocol state machine.
///
/// One engine instance per participant. All mutating entry points must run
/// under a single exclusion domain (see [`crate::shared::SharedEngine`]);
/// the engine itself holds no locks and spawns no tasks.
pub struct ProtocolEngine {
    pub(crate) identity: Identity,
    pub(crate) seed: Seed,
    pub(crate) ledger: Ledger,
    pub(crate) phase: ProtocolPhase,

    pub(crate) my_commitment_root: String,
    pub(crate) my_committed: bool,
    pub(crate) opp_committed: bool,
    pub(crate) opponent_id: Option<ParticipantId>,
    pub(crate) opponent_public_key: Option<String>,
    pub(crate) opponent_commitment_root: Option<String>,

    pub(crate) my_actions: u64,
    pub(crate) opponent_actions: u64,
    pub(crate) my_revealed: bool,
    pub(crate) opponent_revealed: bool,

    pub(crate) enforcement_enabled: bool,
    pub(crate) turns: TurnEnforcer,
    pub(crate) timeouts: ActionTimeouts,
    pub(crate) retries: RetryTracker,
    pub(crate) health: HealthMonitor,
    pub(crate) detector: CheatDetector,
    pub(crate) invalidator: Invalidator,
    pub(crate) disputes: DisputeLog,

    on_violation: Option<ViolationCallback>,
    on_disconnect: Option<DisconnectCallback>,
}

impl ProtocolEngine {
    /// Build an engine bound to a seed and the commitment it will publish.
    ///
    /// The identity is derived deterministically from the seed and the
    /// commitment data, so restarting with the same inputs reproduces the
    /// same participant id and keys.
    pub fn new(
        seed: Seed,
        commitment_data: &Value,
        commitment_root: String,
        config: EngineConfig,
    ) -> Result<Self, PactError> {
        let identity = Identity::derive(&seed, commitment_data)?;
        let my_id = identity.participant_id().clone();
        info!(participant = %my_id, "protocol engine initialized");

        Ok(Self {
            detector: CheatDetector::new(my_id),
            identity,
            seed,
            ledger: Ledger::new(),
            phase: ProtocolPhase::Init,
            my_commitment_root: commitment_root,
            my_committed: false,
            opp_committed: false,
            opponent_id: None,
            opponent_public_key: None,
            opponent_commitment_root: None,
            my_actions: 0,
            opponent_actions: 0,
            my_revealed: false,
            opponent_revealed: false,
            enforcement_enabled: config.enforcement,
            turns: TurnEnforcer::new(),
            timeouts: ActionTimeouts::new(config.timeouts),
            retries: RetryTracker::default(),
            health: HealthMonitor::new(),
            invalidator: Invalidator::new(),
            disputes: DisputeLog::new(),
            on_violation: None,
            on_disconnect: None,
        })
    }

    // ── Commitment exchange ──────────────────────────────────────────────────

    /// My commitment envelope for the peer. The first call also records my
    /// own commitment to the ledger, so a completed exchange leaves both
    /// commitments in the shared history.
    pub fn get_my_commitment(&mut self) -> Result<CommitmentEnvelope, PactError> {
        let envelope = CommitmentEnvelope {
            participant_id: self.identity.participant_id().clone(),
            public_key: self.identity.public_key_hex(),
            commitment_root: self.my_commitment_root.clone(),
        };
        if !self.my_committed {
            let tx = Transaction::unsigned(
                TxKind::Commitment,
                envelope.participant_id.clone(),
                canonical_value(&envelope)?,
            );
            self.ledger.add_transaction(tx);
            self.ledger.mine_block();
            self.my_committed = true;
            self.advance_after_commitment();
        }
        Ok(envelope)
    }

    /// Store and ledger the peer's commitment. Malformed payloads surface as
    /// an invalid result, never as a panic.
    pub fn set_opponent_commitment(&mut self, payload: &Value) -> VerificationResult {
        let envelope = match CommitmentEnvelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(e) => return VerificationResult::fail(format!("Invalid commitment: {e}")),
        };

        let data = match canonical_value(&envelope) {
            Ok(data) => data,
            Err(e) => return VerificationResult::fail(format!("Invalid commitment: {e}")),
        };

        self.opponent_id = Some(envelope.participant_id.clone());
        self.opponent_public_key = Some(envelope.public_key.clone());
        self.opponent_commitment_root = Some(envelope.commitment_root.clone());

        let tx = Transaction::unsigned(TxKind::Commitment, envelope.participant_id.clone(), data);
        self.ledger.add_transaction(tx);
        self.ledger.mine_block();
        self.opp_committed = true;
        self.advance_after_commitment();

        info!(opponent = %envelope.participant_id, "opponent commitment recorded");
        VerificationResult::ok("Opponent commitment recorded")
    }

    fn advance_after_commitment(&mut self) {
        if self.phase == ProtocolPhase::Forfeit {
            return;
        }
        self.phase = match (self.my_committed, self.opp_committed) {
            (true, true) => ProtocolPhase::Active,
            (false, false) => ProtocolPhase::Init,
            _ => ProtocolPhase::CommitmentExchanged,
        };
        if self.phase == ProtocolPhase::Active {
            info!("both commitments exchanged, protocol active");
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    /// Timestamp, sign and ledger one of my actions. Returns the complete
    /// payload and its signature for transport to the peer.
    pub fn record_my_action(
        &mut self,
        action_type: &str,
        fields: Map<String, Value>,
    ) -> Result<(Value, String), PactError> {
        if self.phase != ProtocolPhase::Active {
            return Err(PactError::NotActive);
        }
        let my_id = self.identity.participant_id().clone();
        if self.enforcement_enabled && !self.turns.try_claim(&my_id) {
            return Err(PactError::NotMyTurn);
        }

        let envelope = ActionEnvelope::new(action_type, fields);
        let data = canonical_value(&envelope)?;
        let message = canonical_json(&data)?;
        let signature = self.identity.sign(message.as_bytes());

        let tx = Transaction::signed(TxKind::Action, my_id.clone(), data.clone(), signature.clone());
        self.ledger.add_transaction(tx);
        self.ledger.mine_block();
        self.my_actions += 1;
        self.health.record_activity();

        if self.enforcement_enabled {
            if let Some(opp) = self.opponent_id.clone() {
                self.turns.pass_to(&opp);
            }
        }
        debug!(action_type, "action recorded");
        Ok((data, signature))
    }

    /// Verify and ledger a peer action: turn order first, then the
    /// signature, then the record. Violations produce evidence and
    /// invalidate the peer.
    pub fn verify_opponent_action(&mut self, data: &Value, signature: &str) -> VerificationResult {
        let (Some(opp_id), Some(opp_key)) =
            (self.opponent_id.clone(), self.opponent_public_key.clone())
        else {
            return VerificationResult::fail("Opponent commitment not set");
        };
        if self.invalidator.is_invalidated(&opp_id) {
            return VerificationResult::fail(format!("Participant {opp_id} is invalidated"));
        }
        if self.phase != ProtocolPhase::Active {
            return VerificationResult::fail("Protocol is not active");
        }

        if self.enforcement_enabled && !self.turns.try_claim(&opp_id) {
            let evidence = self.detector.record_cheat(
                CheatKind::DoubleMove,
                opp_id.clone(),
                "Move attempted out of turn",
                json!({
                    "action_data": data,
                    "current_turn": self.turns.current(),
                    "attempted_by": opp_id,
                }),
            );
            self.invalidate_peer(evidence);
            return VerificationResult::fail(
                "Turn violation - opponent attempted move out of turn",
            );
        }

        let message = match canonical_json(data) {
            Ok(message) => message,
            Err(e) => return VerificationResult::fail(format!("Malformed action data: {e}")),
        };
        if !verify_signature(message.as_bytes(), signature, &opp_key) {
            let evidence = self.detector.record_cheat(
                CheatKind::ForgedSignature,
                opp_id.clone(),
                "Action signature does not verify",
                json!({ "message": message, "signature": signature }),
            );
            self.invalidate_peer(evidence);
            return VerificationResult::fail("Invalid signature - action rejected");
        }

        let tx = Transaction::signed(
            TxKind::Action,
            opp_id.clone(),
            data.clone(),
            signature.to_string(),
        );
        self.ledger.add_transaction(tx);
        self.ledger.mine_block();
        self.opponent_actions += 1;
        self.health.record_activity();

        if self.enforcement_enabled {
            let my_id = self.identity.participant_id().clone();
            self.turns.pass_to(&my_id);
        }
        VerificationResult::ok("Opponent action verified and recorded")
    }

    // ── Proofs ───────────────────────────────────────────────────────────────

    /// Answer a query with a signed proof and ledger the event.
    pub fn generate_proof<C: CommitmentScheme>(
        &mut self,
        scheme: &C,
        query: &C::Query,
    ) -> Result<(ProofEnvelope, String), PactError> {
        if self.phase == ProtocolPhase::Forfeit {
            return Err(PactError::NotActive);
        }
        let proof = scheme.generate_proof(query)?;
        let envelope = ProofEnvelope::wrap(C::PROOF_TYPE, &proof)?;
        let data = canonical_value(&envelope)?;
        let message = canonical_json(&data)?;
        let signature = self.identity.sign(message.as_bytes());

        let tx = Transaction::signed(
            TxKind::Result,
            self.identity.participant_id().clone(),
            data,
            signature.clone(),
        );
        self.ledger.add_transaction(tx);
        self.ledger.mine_block();
        self.health.record_activity();

        Ok((envelope, signature))
    }

    /// Verify a peer's signed proof against a published root, and on
    /// success ledger a replayable verification record. Either failure —
    /// envelope signature or Merkle refold — is proof-level cheating.
    pub fn verify_proof<C: CommitmentScheme>(
        &mut self,
        envelope: &ProofEnvelope,
        signature: &str,
        expected_root: &str,
    ) -> VerificationResult {
        let (Some(opp_id), Some(opp_key)) =
            (self.opponent_id.clone(), self.opponent_public_key.clone())
        else {
            return VerificationResult::fail("Opponent commitment not set");
        };
        if self.invalidator.is_invalidated(&opp_id) {
            return VerificationResult::fail(format!("Participant {opp_id} is invalidated"));
        }

        let data = match canonical_value(envelope) {
            Ok(data) => data,
            Err(e) => return VerificationResult::fail(format!("Malformed proof envelope: {e}")),
        };
        let message = match canonical_json(&data) {
            Ok(message) => message,
            Err(e) => return VerificationResult::fail(format!("Malformed proof envelope: {e}")),
        };

        if !verify_signature(message.as_bytes(), signature, &opp_key) {
            let evidence = self.detector.record_cheat(
                CheatKind::InvalidProof,
                opp_id.clone(),
                "Proof envelope signature does not verify",
                json!({
                    "proof": data,
                    "commitment_root": expected_root,
                    "signature": signature,
                }),
            );
            self.invalidate_peer(evidence);
            return VerificationResult::fail("Invalid proof signature");
        }

        let proof: C::Proof = match envelope.decode() {
            Ok(proof) => proof,
            Err(e) => return VerificationResult::fail(format!("Malformed proof: {e}")),
        };

        if !C::verify_proof(&proof, expected_root) {
            let evidence = self.detector.record_cheat(
                CheatKind::InvalidProof,
                opp_id.clone(),
                "Proof failed verification against committed root",
                json!({ "proof": data, "commitment_root": expected_root }),
            );
            self.invalidate_peer(evidence);
            return VerificationResult::fail("Invalid proof - verification failed");
        }

        // Ledger the full proof so any third party can replay the check.
        let record = VerificationRecord::new(expected_root, opp_id, envelope.proof.clone());
        let result = match self.record_result(&record) {
            Ok(()) => VerificationResult::ok("Proof verified and recorded"),
            Err(e) => return VerificationResult::fail(format!("Failed to record result: {e}")),
        };
        self.health.record_activity();

        match envelope.proof.get("result") {
            Some(value) => result.with_details(json!({ "result": value })),
            None => result,
        }
    }

    fn record_result<T: serde::Serialize>(&mut self, record: &T) -> Result<(), PactError> {
        let data = canonical_value(record)?;
        let message = canonical_json(&data)?;
        let signature = self.identity.sign(message.as_bytes());
        let tx = Transaction::signed(
            TxKind::Result,
            self.identity.participant_id().clone(),
            data,
            signature,
        );
        self.ledger.add_transaction(tx);
        self.ledger.mine_block();
        Ok(())
    }

    // ── Independent verification ─────────────────────────────────────────────

    pub fn verify_blockchain_integrity(&self) -> VerificationResult {
        if self.ledger.verify_chain() {
            VerificationResult::ok("Blockchain valid")
        } else {
            VerificationResult::fail("Blockchain corrupted")
        }
    }

    /// Re-verify every signature in the ledger against the signer's key.
    pub fn verify_all_signatures(&self) -> VerificationResult {
        let my_id = self.identity.participant_id();
        let my_key = self.identity.public_key_hex();
        let mut invalid = Vec::new();

        for (block_number, block) in self.ledger.blocks().iter().enumerate() {
            for (index, tx) in block.transactions.iter().enumerate() {
                if tx.kind == TxKind::Commitment {
                    continue;
                }
                let key = if &tx.participant_id == my_id {
                    Some(my_key.clone())
                } else if Some(&tx.participant_id) == self.opponent_id.as_ref() {
                    self.opponent_public_key.clone()
                } else {
                    None
                };
                let Some(key) = key else {
                    continue;
                };
                let verified = tx
                    .signed_message()
                    .map(|message| verify_signature(message.as_bytes(), &tx.signature, &key))
                    .unwrap_or(false);
                if !verified {
                    invalid.push(json!({
                        "block": block_number,
                        "index": index,
                        "participant": tx.participant_id,
                    }));
                }
            }
        }

        if invalid.is_empty() {
            VerificationResult::ok("All signatures valid")
        } else {
            VerificationResult::fail(format!("Found {} invalid signatures", invalid.len()))
                .with_details(json!({ "invalid_transactions": invalid }))
        }
    }

    /// Replay the whole protocol from the ledger: chain links, every
    /// signature, and every Merkle proof stored in a result record.
    pub fn replay_from_blockchain(&self) -> VerificationResult {
        let chain = self.verify_blockchain_integrity();
        if !chain.valid {
            return chain;
        }
        let signatures = self.verify_all_signatures();
        if !signatures.valid {
            return signatures;
        }

        let mut invalid = Vec::new();
        for (block_number, block) in self.ledger.blocks().iter().enumerate() {
            for (index, tx) in block.transactions.iter().enumerate() {
                if tx.kind != TxKind::Result || tx.data.get("merkle_path").is_none() {
                    continue;
                }
                let Some(root) = tx.data.get("committed_root").and_then(Value::as_str) else {
                    continue;
                };
                let replayed = serde_json::from_value::<MerkleProof>(tx.data.clone())
                    .map(|proof| GridCommitment::verify(&proof, root))
                    .unwrap_or(false);
                if !replayed {
                    invalid.push(json!({ "block": block_number, "index": index }));
                }
            }
        }

        if invalid.is_empty() {
            VerificationResult::ok("Complete protocol execution verified from blockchain")
        } else {
            VerificationResult::fail(format!("Found {} invalid proofs in history", invalid.len()))
                .with_details(json!({ "invalid_proofs": invalid }))
        }
    }

    // ── Revelation ───────────────────────────────────────────────────────────

    /// Produce the signed end-of-protocol revelation of my committed data
    /// and seed. Moves the protocol out of `Active`: no further actions.
    pub fn reveal_commitment(&mut self, commitment_data: &Value) -> Result<Value, PactError> {
        if self.phase == ProtocolPhase::Forfeit {
            return Err(PactError::NotActive);
        }
        let revelation = Revelation {
            participant_id: self.identity.participant_id().clone(),
            commitment_data: commitment_data.clone(),
            seed: self.seed.to_hex(),
            timestamp: now(),
            signature: None,
        };
        let unsigned = canonical_value(&revelation)?;
        let message = canonical_json(&unsigned)?;
        let signature = self.identity.sign(message.as_bytes());

        let mut signed = unsigned;
        signed["signature"] = Value::String(signature);

        self.my_revealed = true;
        self.advance_after_reveal();
        info!("commitment revealed");
        Ok(signed)
    }

    /// Verify the signature on the peer's revelation. The application layer
    /// must separately recompute the commitment from the revealed data and
    /// compare it with the root published at the start.
    pub fn verify_opponent_revelation(
        &mut self,
        revelation: &Value,
        original_root: &str,
    ) -> VerificationResult {
        let Some(opp_key) = self.opponent_public_key.clone() else {
            return VerificationResult::fail("Opponent commitment not set");
        };
        let Some(object) = revelation.as_object() else {
            return VerificationResult::fail("Revelation must be an object");
        };
        let Some(signature) = object.get("signature").and_then(Value::as_str) else {
            return VerificationResult::fail("No signature in revelation");
        };

        let mut unsigned = object.clone();
        unsigned.remove("signature");
        let message = match canonical_json(&Value::Object(unsigned.clone())) {
            Ok(message) => message,
            Err(e) => return VerificationResult::fail(format!("Malformed revelation: {e}")),
        };
        if !verify_signature(message.as_bytes(), signature, &opp_key) {
            return VerificationResult::fail("Invalid signature on revelation");
        }

        self.opponent_revealed = true;
        self.advance_after_reveal();
        VerificationResult::ok("Revelation signature valid - recompute the commitment to confirm")
            .with_details(json!({
                "revelation": Value::Object(unsigned),
                "original_root": original_root,
            }))
    }

    fn advance_after_reveal(&mut self) {
        if self.phase == ProtocolPhase::Forfeit {
            return;
        }
        self.phase = if self.my_revealed && self.opponent_revealed {
            ProtocolPhase::Complete
        } else {
            ProtocolPhase::Revealing
        };
    }

    // ── Enforcement ──────────────────────────────────────────────────────────

    /// Start tracking a deadline for `action_id`. `timeout` overrides the
    /// configured default for this action only.
    pub fn start_action(&mut self, action_id: &str, timeout: Option<Duration>) {
        self.timeouts.start_action(action_id, timeout);
    }

    /// Cancel/complete a pending action.
    pub fn complete_action(&mut self, action_id: &str) -> bool {
        self.timeouts.complete_action(action_id)
    }

    pub fn is_pending_action(&self, action_id: &str) -> bool {
        self.timeouts.is_pending(action_id)
    }

    /// One enforcement tick: expire deadlines, materialize violations, and
    /// invalidate the peer for each. Called by the background monitor and
    /// available to applications running their own cadence.
    pub fn check_enforcement(&mut self) -> Vec<CheatEvidence> {
        if !self.enforcement_enabled {
            return Vec::new();
        }
        let expired = self.timeouts.check_timeouts();
        let mut violations = Vec::new();

        for action_id in expired {
            let Some(opp_id) = self.opponent_id.clone() else {
                continue;
            };
            let evidence = if action_id == REVEAL_ACTION_ID {
                self.detector.record_cheat(
                    CheatKind::CommitmentMismatch,
                    opp_id,
                    "Refused to reveal commitment after protocol end",
                    json!({ "action_id": action_id }),
                )
            } else {
                self.detector.record_cheat(
                    CheatKind::TimeoutStall,
                    opp_id,
                    format!("Timeout on action {action_id}"),
                    json!({ "action_id": action_id }),
                )
            };
            self.invalidate_peer(evidence.clone());
            violations.push(evidence);
        }

        if self.health.is_stalled(DEFAULT_STALL_THRESHOLD) {
            debug!("protocol appears stalled");
        }
        violations
    }

    fn invalidate_peer(&mut self, evidence: CheatEvidence) {
        let cheater = evidence.cheater_id.clone();
        self.invalidator.invalidate(cheater.clone(), evidence.clone());
        self.phase = ProtocolPhase::Forfeit;
        self.health.record_error();

        // Termination record: signed statement of the forfeit outcome.
        let record = self
            .invalidator
            .forfeit(&cheater, self.identity.participant_id());
        if let Err(e) = self.record_termination(&record) {
            warn!(error = %e, "failed to ledger the forfeit record");
        }
        self.fire_violation(&evidence);
    }

    fn record_termination<T: serde::Serialize>(&mut self, record: &T) -> Result<(), PactError> {
        let data = canonical_value(record)?;
        let message = canonical_json(&data)?;
        let signature = self.identity.sign(message.as_bytes());
        let tx = Transaction::signed(
            TxKind::Termination,
            self.identity.participant_id().clone(),
            data,
            signature,
        );
        self.ledger.add_transaction(tx);
        self.ledger.mine_block();
        Ok(())
    }

    // ── Sync ─────────────────────────────────────────────────────────────────

    pub fn sync_state(&self) -> SyncState {
        self.ledger.sync_state()
    }

    /// Merge peer transactions into our ledger; returns the count added.
    pub fn merge_peer_transactions(&mut self, transactions: Vec<Transaction>) -> usize {
        merge_transactions(&mut self.ledger, transactions)
    }

    // ── Callbacks ────────────────────────────────────────────────────────────

    pub fn set_on_violation(&mut self, callback: impl Fn(&CheatEvidence) + Send + 'static) {
        self.on_violation = Some(Box::new(callback));
    }

    pub fn set_on_disconnect(&mut self, callback: impl Fn() + Send + 'static) {
        self.on_disconnect = Some(Box::new(callback));
    }

    fn fire_violation(&self, evidence: &CheatEvidence) {
        if let Some(callback) = &self.on_violation {
            if catch_unwind(AssertUnwindSafe(|| callback(evidence))).is_err() {
                warn!("violation callback panicked");
            }
        }
    }

    pub(crate) fn fire_disconnect(&self) {
        if let Some(callback) = &self.on_disconnect {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!("disconnect callback panicked");
            }
        }
    }

    // ── Read queries ─────────────────────────────────────────────────────────

    pub fn phase(&self) -> ProtocolPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == ProtocolPhase::Active
    }

    pub fn my_participant_id(&self) -> &ParticipantId {
        self.identity.participant_id()
    }

    pub fn my_commitment_root(&self) -> &str {
        &self.my_commitment_root
    }

    pub fn opponent_id(&self) -> Option<&ParticipantId> {
        self.opponent_id.as_ref()
    }

    pub fn opponent_commitment_root(&self) -> Option<&str> {
        self.opponent_commitment_root.as_deref()
    }

    pub fn opponent_public_key(&self) -> Option<&str> {
        self.opponent_public_key.as_deref()
    }

    pub fn opponent_revealed(&self) -> bool {
        self.opponent_revealed
    }

    pub fn enforcement_enabled(&self) -> bool {
        self.enforcement_enabled
    }

    pub fn current_turn(&self) -> Option<&ParticipantId> {
        self.turns.current()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Mutable ledger access for audits and tamper tests; protocol code
    /// never rewrites sealed history.
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn cheat_report(&self) -> CheatReport {
        self.detector.report()
    }

    pub fn invalidation_proof(&self, participant: &ParticipantId) -> Option<&CheatEvidence> {
        self.invalidator.invalidation_proof(participant)
    }

    pub fn is_invalidated(&self, participant: &ParticipantId) -> bool {
        self.invalidator.is_invalidated(participant)
    }

    pub fn disputes(&mut self) -> &mut DisputeLog {
        &mut self.disputes
    }

    pub fn retries(&mut self) -> &mut RetryTracker {
        &mut self.retries
    }

    pub fn get_protocol_state(&self) -> ProtocolState {
        ProtocolState {
            phase: self.phase,
            protocol_active: self.is_active(),
            my_participant_id: self.identity.participant_id().clone(),
            opponent_participant_id: self.opponent_id.clone(),
            my_actions_count: self.my_actions,
            opponent_actions_count: self.opponent_actions,
            blockchain_blocks: self.ledger.block_count(),
            total_transactions: self.ledger.total_transactions(),
            blockchain_valid: self.ledger.verify_chain(),
            all_signatures_valid: self.verify_all_signatures().valid,
            current_turn: self.turns.current().cloned(),
            opponent_revealed: self.opponent_revealed,
            pending_actions: self.timeouts.pending_ids(),
            invalidated: self
                .invalidator
                .invalidated_ids()
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    pub fn get_protocol_health(&self) -> ProtocolHealth {
        ProtocolHealth {
            protocol_active: self.is_active(),
            blockchain_valid: self.ledger.verify_chain(),
            enforcement_enabled: self.enforcement_enabled,
            pending_actions: self.timeouts.pending_count(),
            current_turn: self.turns.current().cloned(),
            cheats_detected: self.detector.detected().len(),
            opponent_is_cheater: self.detector.opponent_is_cheater(),
            monitor: self.health.report(),
        }
    }
}
