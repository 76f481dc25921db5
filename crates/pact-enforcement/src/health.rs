use std::time::{Duration, Instant};

use serde::Serialize;

use pact_core::constants::DEFAULT_STALL_THRESHOLD;

/// Rolling protocol health counters with stall detection.
#[derive(Default)]
pub struct HealthMonitor {
    last_activity: Option<Instant>,
    actions: u64,
    errors: u64,
    warnings: u64,
}

/// Point-in-time health view.
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub actions: u64,
    pub errors: u64,
    pub warnings: u64,
    pub inactivity_secs: Option<f64>,
    pub stalled: bool,
    pub error_rate: f64,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_activity(&mut self) {
        self.last_activity = Some(Instant::now());
        self.actions += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn record_warning(&mut self) {
        self.warnings += 1;
    }

    /// Time since the last recorded activity; `None` before any activity.
    pub fn inactivity(&self) -> Option<Duration> {
        self.last_activity.map(|t| t.elapsed())
    }

    /// Stalled when inactivity exceeds `threshold`. A protocol that never
    /// saw activity is idle, not stalled.
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        self.inactivity().is_some_and(|d| d > threshold)
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            actions: self.actions,
            errors: self.errors,
            warnings: self.warnings,
            inactivity_secs: self.inactivity().map(|d| d.as_secs_f64()),
            stalled: self.is_stalled(DEFAULT_STALL_THRESHOLD),
            error_rate: self.errors as f64 / (self.actions.max(1)) as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn idle_monitor_is_not_stalled() {
        let monitor = HealthMonitor::new();
        assert!(!monitor.is_stalled(Duration::from_millis(1)));
        assert!(monitor.inactivity().is_none());
    }

    #[test]
    fn stalls_after_inactivity() {
        let mut monitor = HealthMonitor::new();
        monitor.record_activity();
        sleep(Duration::from_millis(15));
        assert!(monitor.is_stalled(Duration::from_millis(10)));
        assert!(!monitor.is_stalled(Duration::from_secs(60)));
    }

    #[test]
    fn error_rate_counts_against_actions() {
        let mut monitor = HealthMonitor::new();
        monitor.record_activity();
        monitor.record_activity();
        monitor.record_error();
        let report = monitor.report();
        assert_eq!(report.actions, 2);
        assert_eq!(report.errors, 1);
        assert!((report.error_rate - 0.5).abs() < f64::EPSILON);
    }
}
