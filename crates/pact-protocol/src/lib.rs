//! pact-protocol
//!
//! The protocol engine: wires identity, grid commitments, the ledger and
//! enforcement into the public zero-trust contract. Applications construct
//! a [`ProtocolEngine`], exchange commitments over their own transport,
//! route actions and proofs through the engine's record/verify entry
//! points, and let the background monitors handle deadlines and snapshots.

pub mod engine;
pub mod monitor;
pub mod reconnect;
pub mod shared;
pub mod snapshot;
pub mod turns;

pub use engine::{EngineConfig, ProtocolEngine, ProtocolHealth, ProtocolPhase, ProtocolState};
pub use monitor::{spawn_monitors, MonitorConfig, MonitorHandle};
pub use reconnect::{
    attempt_reconnection, handle_disconnect, verify_state_after_reconnect, ReconnectPolicy,
};
pub use shared::SharedEngine;
pub use snapshot::{Snapshot, StateManager};
pub use turns::TurnEnforcer;
