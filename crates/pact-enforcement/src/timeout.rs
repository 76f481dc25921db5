use std::collections::HashMap;
use std::time::{Duration, Instant};

use pact_core::constants::{
    DEFAULT_ACTION_TIMEOUT, DEFAULT_COMMITMENT_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL,
    DEFAULT_MAX_RETRIES, DEFAULT_RESPONSE_TIMEOUT,
};

// ── TimeoutConfig ────────────────────────────────────────────────────────────

/// Deadlines for the protocol's waiting states.
#[derive(Clone, Debug)]
pub struct TimeoutConfig {
    /// Deadline for the peer to complete an action.
    pub action_timeout: Duration,
    /// Deadline for a response to a query.
    pub response_timeout: Duration,
    /// Deadline for the initial commitment exchange.
    pub commitment_timeout: Duration,
    /// Retry budget per action.
    pub max_retries: u32,
    /// Keepalive cadence while idle.
    pub keepalive_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            commitment_timeout: DEFAULT_COMMITMENT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

// ── ActionTimeouts ───────────────────────────────────────────────────────────

struct PendingAction {
    started: Instant,
    timeout: Duration,
}

/// Tracks deadlines for in-flight actions.
///
/// Each action gets the default deadline or a per-action override. A
/// monitor tick calls [`ActionTimeouts::check_timeouts`]; expired actions
/// are removed and returned so the caller can materialize violations.
pub struct ActionTimeouts {
    config: TimeoutConfig,
    pending: HashMap<String, PendingAction>,
}

impl ActionTimeouts {
    pub fn new(config: TimeoutConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// Begin tracking `action_id`. `timeout` overrides the configured
    /// action deadline for this action only.
    pub fn start_action(&mut self, action_id: impl Into<String>, timeout: Option<Duration>) {
        self.pending.insert(
            action_id.into(),
            PendingAction {
                started: Instant::now(),
                timeout: timeout.unwrap_or(self.config.action_timeout),
            },
        );
    }

    /// Stop tracking `action_id`; returns whether it was pending. This is
    /// also the cancellation path for the application.
    pub fn complete_action(&mut self, action_id: &str) -> bool {
        self.pending.remove(action_id).is_some()
    }

    /// Remove and return every action whose deadline has passed.
    pub fn check_timeouts(&mut self) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, action)| now.duration_since(action.started) > action.timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.pending.remove(id);
        }
        expired
    }

    pub fn elapsed(&self, action_id: &str) -> Option<Duration> {
        self.pending
            .get(action_id)
            .map(|action| action.started.elapsed())
    }

    pub fn is_pending(&self, action_id: &str) -> bool {
        self.pending.contains_key(action_id)
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.keys().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ActionTimeouts {
    fn default() -> Self {
        Self::new(TimeoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn completes_before_deadline() {
        let mut timeouts = ActionTimeouts::default();
        timeouts.start_action("a1", None);
        assert!(timeouts.is_pending("a1"));
        assert!(timeouts.complete_action("a1"));
        assert!(!timeouts.complete_action("a1"));
        assert!(timeouts.check_timeouts().is_empty());
    }

    #[test]
    fn expired_action_is_returned_and_removed() {
        let mut timeouts = ActionTimeouts::default();
        timeouts.start_action("a1", Some(Duration::from_millis(10)));
        timeouts.start_action("a2", Some(Duration::from_secs(60)));
        sleep(Duration::from_millis(25));

        let expired = timeouts.check_timeouts();
        assert_eq!(expired, vec!["a1".to_string()]);
        assert!(!timeouts.is_pending("a1"));
        assert!(timeouts.is_pending("a2"));
        // A second tick reports nothing new.
        assert!(timeouts.check_timeouts().is_empty());
    }

    #[test]
    fn elapsed_grows_until_completion() {
        let mut timeouts = ActionTimeouts::default();
        timeouts.start_action("a1", None);
        sleep(Duration::from_millis(5));
        assert!(timeouts.elapsed("a1").unwrap() >= Duration::from_millis(5));
        timeouts.complete_action("a1");
        assert!(timeouts.elapsed("a1").is_none());
    }
}
