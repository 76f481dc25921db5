//! Disconnect handling and backoff-driven reconnection.
//!
//! The core performs no transport I/O itself: the application supplies a
//! `connect` closure and carries the bytes. On reconnect the saved state is
//! reloaded and the ledger re-verified; the sync layer then reconciles any
//! divergence with the peer.

use std::time::Duration;

use tracing::{debug, info, warn};

use pact_core::constants::{DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY};
use pact_ledger::{needs_sync, resolve_conflict, ConflictResolution, SyncState};

use crate::shared::SharedEngine;
use crate::snapshot::StateManager;

#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    /// Base delay; attempt n waits `retry_delay · 2^n`.
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            retry_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Save state and notify the application of the disconnect. Returns whether
/// the snapshot was written.
pub fn handle_disconnect(engine: &SharedEngine, state: Option<&StateManager>) -> bool {
    let snapshot = engine.lock().snapshot();
    let saved = match state {
        Some(manager) => match manager.save(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to save state on disconnect");
                false
            }
        },
        None => false,
    };
    engine.lock().fire_disconnect();
    saved
}

/// Try to reconnect with exponential backoff. The sleeps between attempts
/// are ordinary await points, so the caller can cancel the whole future.
pub async fn attempt_reconnection<F>(
    engine: &SharedEngine,
    state: Option<&StateManager>,
    policy: &ReconnectPolicy,
    mut connect: F,
) -> bool
where
    F: FnMut() -> bool,
{
    for attempt in 0..policy.max_attempts {
        info!(
            attempt = attempt + 1,
            max = policy.max_attempts,
            "reconnection attempt"
        );
        if connect() {
            info!("reconnected");
            if let Some(manager) = state {
                match manager.load() {
                    Ok(Some(snapshot)) => {
                        engine.lock().restore(snapshot);
                        info!("state restored from disk");
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "failed to load saved state"),
                }
            }
            if !engine.lock().ledger().verify_chain() {
                warn!("ledger failed verification after reconnect");
            }
            return true;
        }

        if attempt + 1 < policy.max_attempts {
            let delay = policy.retry_delay * 2u32.pow(attempt);
            debug!(?delay, "backing off before next attempt");
            tokio::time::sleep(delay).await;
        }
    }
    warn!("reconnection failed after all attempts");
    false
}

/// Check ledger consistency against the peer after a reconnect.
///
/// Length differences are reconcilable through a merge and return true;
/// equal-length divergence cannot be resolved automatically and returns
/// false. Without a peer state, fall back to local chain verification.
pub fn verify_state_after_reconnect(
    engine: &SharedEngine,
    peer_state: Option<&SyncState>,
) -> bool {
    let engine = engine.lock();
    let mine = engine.ledger().sync_state();
    match peer_state {
        Some(peer) => {
            let (needs, reason) = needs_sync(&mine, peer);
            if !needs {
                return true;
            }
            match resolve_conflict(&mine, peer) {
                ConflictResolution::Diverged => {
                    warn!(%reason, "ledgers diverged at equal length");
                    false
                }
                _ => {
                    info!(%reason, "ledger sync required");
                    true
                }
            }
        }
        None => engine.ledger().verify_chain(),
    }
}
