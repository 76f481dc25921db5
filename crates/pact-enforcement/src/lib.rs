pub mod cheat;
pub mod dispute;
pub mod health;
pub mod retry;
pub mod timeout;

pub use cheat::{
    verify_cheat_claim, CheatDetector, CheatEvidence, CheatKind, CheatReport, ForfeitRecord,
    Invalidator,
};
pub use dispute::{Dispute, DisputeLog, DisputeStatus};
pub use health::{HealthMonitor, HealthReport};
pub use retry::RetryTracker;
pub use timeout::{ActionTimeouts, TimeoutConfig};
