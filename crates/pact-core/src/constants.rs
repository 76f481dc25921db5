//! ─── Pact protocol constants ─────────────────────────────────────────────────
//!
//! Defaults for timeouts, monitors and wire formats. Applications override
//! the tunables through the config structs; the wire-format constants are
//! fixed by the protocol.

use std::time::Duration;

// ── Wire format ──────────────────────────────────────────────────────────────

/// Seed length in bytes. Seeds are never transmitted before revelation.
pub const SEED_BYTES: usize = 32;

/// Participant ids are the first 16 hex chars of SHA-256(public key bytes).
pub const PARTICIPANT_ID_HEX_CHARS: usize = 16;

/// Hex chars in a SHA-256 digest.
pub const DIGEST_HEX_CHARS: usize = 64;

/// Previous-hash field of the genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Snapshot schema version written to every state file.
pub const SNAPSHOT_VERSION: &str = "1.0";

// ── Grid commitments ─────────────────────────────────────────────────────────

/// Default grid edge length (N in an N×N grid).
pub const DEFAULT_GRID_SIZE: u32 = 10;

// ── Timeouts ─────────────────────────────────────────────────────────────────

/// How long to wait for the peer to complete an action.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for a response to a query.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for the initial commitment exchange.
pub const DEFAULT_COMMITMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for the post-protocol revelation before invalidating.
pub const DEFAULT_REVEAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Keepalive cadence while idle.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum retries per action before it is recorded as failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Inactivity span after which the protocol counts as stalled.
pub const DEFAULT_STALL_THRESHOLD: Duration = Duration::from_secs(60);

// ── Background monitors ──────────────────────────────────────────────────────

/// Cadence of the enforcement/health monitor loop.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Cadence of the auto-save loop.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on joining a monitor task during shutdown.
pub const MONITOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Reconnection ─────────────────────────────────────────────────────────────

/// Reconnection attempts before giving up.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;

/// Base delay between reconnection attempts; doubles per attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
