//! The single exclusion domain.
//!
//! Every mutating engine operation — including the ones issued by the
//! background monitors — goes through [`SharedEngine`], so sequence numbers
//! stay strictly ordered and block hashes chain correctly no matter how
//! many tasks touch the engine.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{info, warn};

use pact_enforcement::CheatKind;

use crate::engine::{ProtocolEngine, REVEAL_ACTION_ID};

/// How often the revelation enforcement loop re-checks the flag.
const REVEAL_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<ProtocolEngine>>,
}

impl SharedEngine {
    pub fn new(engine: ProtocolEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Enter the exclusion domain. Keep critical sections short: serialize
    /// under the lock, do I/O outside it.
    pub fn lock(&self) -> MutexGuard<'_, ProtocolEngine> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait up to `timeout` for the peer's post-protocol revelation.
    ///
    /// Returns true when the peer revealed in time. On expiry the engine
    /// records commitment-mismatch evidence and invalidates the peer; the
    /// refusal stays cryptographically attributable.
    pub async fn enforce_post_game_revelation(&self, timeout: Duration) -> bool {
        {
            let mut engine = self.lock();
            if !engine.enforcement_enabled() {
                warn!("post-game revelation enforcement requires enforcement");
                return false;
            }
            if engine.opponent_id().is_none() {
                warn!("no opponent to enforce revelation against");
                return false;
            }
            if engine.opponent_revealed() {
                return true;
            }
            engine.start_action(REVEAL_ACTION_ID, Some(timeout));
            info!(?timeout, "waiting for opponent revelation");
        }

        loop {
            {
                let mut engine = self.lock();
                if engine.opponent_revealed() {
                    engine.complete_action(REVEAL_ACTION_ID);
                    info!("opponent revealed commitment in time");
                    return true;
                }
                let violations = engine.check_enforcement();
                if violations
                    .iter()
                    .any(|v| v.kind == CheatKind::CommitmentMismatch)
                {
                    warn!("opponent failed to reveal commitment in time");
                    return false;
                }
                if !engine.is_pending_action(REVEAL_ACTION_ID) {
                    // Completed or expired by another path.
                    return engine.opponent_revealed();
                }
            }
            tokio::time::sleep(REVEAL_POLL_INTERVAL).await;
        }
    }
}
