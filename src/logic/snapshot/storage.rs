use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::types::Snapshot;
use crate::logic::capture::content_hash;
use super::validate::{validate_snapshot, StoreError};

/// Key-value persistence of the last-known snapshot per target.
///
/// Implementors provide raw `read`/`save`/`remove`; `load` is the engine-facing
/// call and turns any missing or untrustworthy record into a cold start.
pub trait SnapshotStore: Send + Sync {
    fn read(&self, target_id: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Replace the target's snapshot. Readers never observe a partial write.
    fn save(&self, target_id: &str, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Operator reset. Returns whether a record existed.
    fn remove(&self, target_id: &str) -> Result<bool, StoreError>;

    fn load(&self, target_id: &str) -> Option<Snapshot> {
        let result = self
            .read(target_id)
            .and_then(|found| match found {
                Some(s) => validate_snapshot(&s, target_id).map(|_| Some(s)),
                None => Ok(None),
            });

        match result {
            Ok(found) => found,
            Err(e) => {
                log::warn!("[{}] Snapshot load failed/invalid: {}. Treating as cold start.", target_id, e);
                None
            }
        }
    }
}

/// Map a target id to a safe file stem
pub fn sanitize_target_id(target_id: &str) -> String {
    target_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// File stem unique per target id.
///
/// Ids that sanitize without loss keep their plain name. Others get a short
/// hash of the raw id appended, so `acme.jobs` and `acme_jobs` never share
/// a record.
pub fn target_file_stem(target_id: &str) -> String {
    let sanitized = sanitize_target_id(target_id);
    if sanitized == target_id {
        return sanitized;
    }
    let hash = content_hash(target_id.as_bytes());
    format!("{}-{}", sanitized, &hash[..8])
}

/// Get default snapshot directory
pub fn get_default_snapshot_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::constants::APP_NAME)
        .join("snapshots")
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

/// One JSON document per target, replaced via write-then-rename
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, target_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", target_file_stem(target_id)))
    }
}

impl SnapshotStore for JsonFileStore {
    fn read(&self, target_id: &str) -> Result<Option<Snapshot>, StoreError> {
        let path = self.path_for(target_id);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        Ok(Some(snapshot))
    }

    fn save(&self, target_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(target_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        log::debug!("[{}] Saved snapshot to {:?}", target_id, path);
        Ok(())
    }

    fn remove(&self, target_id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(target_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    fn read(&self, target_id: &str) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.snapshots.read().get(target_id).cloned())
    }

    fn save(&self, target_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .insert(target_id.to_string(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, target_id: &str) -> Result<bool, StoreError> {
        Ok(self.snapshots.write().remove(target_id).is_some())
    }
}
