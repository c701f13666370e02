//! Snapshot Module - Per-target baseline persistence
//!
//! Stores the last-known observation of every monitored target together with
//! the decision state at the time it was taken.
//!
//! # Architecture
//! - `types.rs`: `Snapshot`
//! - `validate.rs`: `StoreError`, schema/hash validation
//! - `storage.rs`: `SnapshotStore` trait, JSON file and in-memory stores
//! - `sqlite.rs`: SQLite store
//!
//! # Failure Strategy
//! Missing, unreadable, or mismatched records load as absent, which degrades
//! that target (and only that target) to a cold start.

pub mod types;
pub mod validate;
pub mod storage;
pub mod sqlite;
#[cfg(test)]
mod tests;

pub use types::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
pub use validate::{validate_snapshot, StoreError};
pub use storage::{
    get_default_snapshot_dir, sanitize_target_id, target_file_stem, JsonFileStore, MemoryStore, SnapshotStore,
};
pub use sqlite::SqliteStore;
