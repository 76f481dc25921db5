pub mod block;
pub mod chain;
pub mod sync;

pub use block::Block;
pub use chain::Ledger;
pub use sync::{
    create_sync_message, handle_sync_message, merge_transactions, needs_sync, resolve_conflict,
    ConflictResolution, SyncMessage, SyncState,
};
