//! Atomic state persistence.
//!
//! The whole engine serializes to one JSON snapshot written via temp-file +
//! rename, so a crash mid-write can never leave a torn state file. A
//! missing snapshot is a fresh start, not an error; snapshot failures are
//! warnings and never affect protocol correctness.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pact_core::constants::SNAPSHOT_VERSION;
use pact_core::error::PactError;
use pact_core::types::{now, ParticipantId, Timestamp};
use pact_ledger::Ledger;

use crate::engine::{ProtocolEngine, ProtocolPhase};
use crate::turns::TurnEnforcer;

// ── Snapshot format ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnforcementSnapshot {
    pub current_turn: Option<ParticipantId>,
    pub turn_sequence: Vec<ParticipantId>,
    pub pending_actions: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheatSnapshot {
    pub opponent_is_cheater: bool,
    pub total_cheats: usize,
}

/// Complete persisted protocol state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub blockchain: Ledger,
    pub my_participant_id: ParticipantId,
    pub opponent_participant_id: Option<ParticipantId>,
    pub my_commitment_root: String,
    pub opponent_commitment: Option<String>,
    pub my_actions_count: u64,
    pub opponent_actions_count: u64,
    pub protocol_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<EnforcementSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheat_detection: Option<CheatSnapshot>,
    pub timestamp: Timestamp,
    pub version: String,
}

impl ProtocolEngine {
    /// Capture the persistable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            blockchain: self.ledger.clone(),
            my_participant_id: self.identity.participant_id().clone(),
            opponent_participant_id: self.opponent_id.clone(),
            my_commitment_root: self.my_commitment_root.clone(),
            opponent_commitment: self.opponent_commitment_root.clone(),
            my_actions_count: self.my_actions,
            opponent_actions_count: self.opponent_actions,
            protocol_active: self.is_active(),
            enforcement: self.enforcement_enabled.then(|| EnforcementSnapshot {
                current_turn: self.turns.current().cloned(),
                turn_sequence: self.turns.history().to_vec(),
                pending_actions: self.timeouts.pending_ids(),
            }),
            cheat_detection: Some(CheatSnapshot {
                opponent_is_cheater: self.detector.opponent_is_cheater(),
                total_cheats: self.detector.detected().len(),
            }),
            timestamp: now(),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    /// Rebuild state from a snapshot.
    ///
    /// The opponent's public key is not persisted; it is re-learned from the
    /// commitment exchange after reconnect. Pending-action deadlines restart
    /// from now — the original start instants do not survive a process
    /// restart.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.ledger = snapshot.blockchain;
        self.opponent_id = snapshot.opponent_participant_id;
        self.opponent_commitment_root = snapshot.opponent_commitment;
        self.my_actions = snapshot.my_actions_count;
        self.opponent_actions = snapshot.opponent_actions_count;

        if self.phase != ProtocolPhase::Forfeit && snapshot.protocol_active {
            self.my_committed = true;
            self.opp_committed = self.opponent_id.is_some();
            self.phase = ProtocolPhase::Active;
        }

        if let Some(enforcement) = snapshot.enforcement {
            self.turns =
                TurnEnforcer::restore(enforcement.current_turn, enforcement.turn_sequence);
            for action_id in enforcement.pending_actions {
                self.timeouts.start_action(action_id, None);
            }
        }
        if let Some(cheats) = snapshot.cheat_detection {
            self.detector.restore_opponent_flag(cheats.opponent_is_cheater);
        }
        info!("protocol state restored from snapshot");
    }
}

// ── StateManager ─────────────────────────────────────────────────────────────

/// Owns the snapshot file.
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot atomically: serialize to a sibling temp file,
    /// then rename over the target.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PactError> {
        let encoded = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "state snapshot written");
        Ok(())
    }

    /// Load the snapshot. `Ok(None)` when no file exists yet.
    pub fn load(&self) -> Result<Option<Snapshot>, PactError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
