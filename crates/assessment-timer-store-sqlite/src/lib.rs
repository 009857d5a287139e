// crates/assessment-timer-store-sqlite/src/lib.rs
// ============================================================================
// Module: Assessment Timer SQLite Store
// Description: Durable TimerStorage implementation backed by SQLite.
// Purpose: Persist encoded timer states across process restarts.
// Dependencies: assessment-timer-core, rusqlite, sha2
// ============================================================================

//! ## Overview
//! [`SqliteTimerStorage`] stores one encoded timer state per
//! `(owner_id, key)` pair. Every value carries a SHA-256 digest that is
//! verified on read; mismatches fail closed as corruption.

pub mod store;

pub use store::MAX_STATE_BYTES;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteTimerStorage;
pub use store::StoredStateSummary;
