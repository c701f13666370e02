use thiserror::Error;

use super::types::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::logic::capture::content_hash;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Snapshot schema mismatch: expected v{expected}, got v{actual}")]
    SchemaMismatch { expected: u8, actual: u8 },

    #[error("Snapshot corrupt: {0}")]
    Corrupt(String),
}

/// Reject records this engine cannot trust as a baseline
pub fn validate_snapshot(snapshot: &Snapshot, target_id: &str) -> Result<(), StoreError> {
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SNAPSHOT_SCHEMA_VERSION,
            actual: snapshot.schema_version,
        });
    }

    if snapshot.target_id != target_id {
        return Err(StoreError::Corrupt(format!(
            "record belongs to '{}', not '{}'",
            snapshot.target_id, target_id
        )));
    }

    let hash_ok = snapshot.content_hash.len() == 64
        && snapshot.content_hash.bytes().all(|b| b.is_ascii_hexdigit());
    if !hash_ok {
        return Err(StoreError::Corrupt(format!(
            "invalid content hash '{}'",
            snapshot.content_hash
        )));
    }

    if let Some(payload) = &snapshot.payload {
        if !content_hash(payload).eq_ignore_ascii_case(&snapshot.content_hash) {
            return Err(StoreError::Corrupt("retained payload does not match content hash".into()));
        }
    }

    Ok(())
}
