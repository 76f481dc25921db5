//! Background monitors: the enforcement/health loop and the auto-save loop.
//!
//! Both run as owned tokio tasks sharing the engine's exclusion domain for
//! their mutation windows, and both stop promptly on a watch-channel signal
//! with a bounded join.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pact_core::constants::{
    DEFAULT_AUTOSAVE_INTERVAL, DEFAULT_MONITOR_INTERVAL, MONITOR_SHUTDOWN_TIMEOUT,
};

use crate::shared::SharedEngine;
use crate::snapshot::StateManager;

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Enforcement/health tick cadence.
    pub interval: Duration,
    /// Snapshot cadence.
    pub autosave_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_MONITOR_INTERVAL,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }
}

/// Handle owning the monitor tasks. Dropping it without calling
/// [`MonitorHandle::shutdown`] aborts nothing — always shut down cleanly.
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Signal both loops to stop and join each with a bounded wait.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        for task in self.tasks.drain(..) {
            if tokio::time::timeout(MONITOR_SHUTDOWN_TIMEOUT, task)
                .await
                .is_err()
            {
                warn!("monitor task did not stop within the shutdown window");
            }
        }
    }
}

/// Spawn the enforcement loop, plus the auto-save loop when a state manager
/// is provided.
pub fn spawn_monitors(
    engine: SharedEngine,
    state: Option<Arc<StateManager>>,
    config: MonitorConfig,
) -> MonitorHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // ── Enforcement / health loop ────────────────────────────────────────────
    {
        let engine = engine.clone();
        let mut stop = stop_rx.clone();
        let interval = config.interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let violations = engine.lock().check_enforcement();
                        if !violations.is_empty() {
                            warn!(count = violations.len(), "enforcement violations materialized");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
            debug!("enforcement monitor stopped");
        }));
    }

    // ── Auto-save loop ───────────────────────────────────────────────────────
    if let Some(manager) = state {
        let engine = engine.clone();
        let mut stop = stop_rx;
        let interval = config.autosave_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Skip the immediate first tick; nothing changed yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Serialize under the lock, write outside it.
                        let snapshot = engine.lock().snapshot();
                        if let Err(e) = manager.save(&snapshot) {
                            warn!(error = %e, "auto-save failed");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
            debug!("auto-save monitor stopped");
        }));
    }

    MonitorHandle {
        stop: stop_tx,
        tasks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, ProtocolEngine, ProtocolPhase};
    use pact_core::canonical::canonical_value;
    use pact_crypto::identity::Seed;
    use serde_json::json;

    fn connected_shared() -> SharedEngine {
        let make = |byte: u8| {
            let seed = Seed::from_bytes([byte; 32]);
            let commitment =
                pact_commitment::GridCommitment::new(&[(0, 0)], &seed, 4).unwrap();
            ProtocolEngine::new(
                seed,
                &json!([[0, 0]]),
                commitment.root_hex(),
                EngineConfig::default(),
            )
            .unwrap()
        };
        let mut p1 = make(1);
        let mut p2 = make(2);
        let commitment_1 = p1.get_my_commitment().unwrap();
        let commitment_2 = p2.get_my_commitment().unwrap();
        p1.set_opponent_commitment(&canonical_value(&commitment_2).unwrap());
        p2.set_opponent_commitment(&canonical_value(&commitment_1).unwrap());
        SharedEngine::new(p1)
    }

    #[tokio::test]
    async fn monitor_materializes_timeout_violations() {
        let shared = connected_shared();
        shared
            .lock()
            .start_action("a1", Some(Duration::from_millis(20)));

        let handle = spawn_monitors(
            shared.clone(),
            None,
            MonitorConfig {
                interval: Duration::from_millis(10),
                autosave_interval: Duration::from_secs(3600),
            },
        );
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.shutdown().await;

        let engine = shared.lock();
        assert_eq!(engine.phase(), ProtocolPhase::Forfeit);
        assert!(!engine.is_pending_action("a1"));
    }

    #[tokio::test]
    async fn autosave_writes_snapshot() {
        let shared = connected_shared();
        let path = std::env::temp_dir().join(format!(
            "pact_autosave_{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let manager = Arc::new(StateManager::new(&path));

        let handle = spawn_monitors(
            shared.clone(),
            Some(manager.clone()),
            MonitorConfig {
                interval: Duration::from_millis(500),
                autosave_interval: Duration::from_millis(20),
            },
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        let snapshot = manager.load().unwrap().expect("snapshot file written");
        assert!(snapshot.protocol_active);
        let _ = std::fs::remove_file(&path);
    }
}
