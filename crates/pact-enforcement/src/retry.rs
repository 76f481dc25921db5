use std::collections::HashMap;

use pact_core::constants::DEFAULT_MAX_RETRIES;

/// Bounded retry accounting per action id.
pub struct RetryTracker {
    max_retries: u32,
    counts: HashMap<String, u32>,
    failures: HashMap<String, String>,
}

impl RetryTracker {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            counts: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn should_retry(&self, action_id: &str) -> bool {
        self.retry_count(action_id) < self.max_retries
    }

    /// Record one retry attempt; returns the new count.
    pub fn record_retry(&mut self, action_id: &str) -> u32 {
        let count = self.counts.entry(action_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Give up on an action, remembering why.
    pub fn record_failure(&mut self, action_id: &str, reason: impl Into<String>) {
        self.failures.insert(action_id.to_string(), reason.into());
        self.counts.remove(action_id);
    }

    /// Clear all bookkeeping for a succeeded action.
    pub fn record_success(&mut self, action_id: &str) {
        self.counts.remove(action_id);
        self.failures.remove(action_id);
    }

    pub fn retry_count(&self, action_id: &str) -> u32 {
        self.counts.get(action_id).copied().unwrap_or(0)
    }

    pub fn failure_reason(&self, action_id: &str) -> Option<&str> {
        self.failures.get(action_id).map(String::as_str)
    }
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
