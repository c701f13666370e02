//! SQLite-backed snapshot store
//!
//! Single `snapshots` table. The payload goes in a BLOB column so the JSON
//! record stays small; `INSERT OR REPLACE` swaps a row atomically.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::storage::SnapshotStore;
use super::types::Snapshot;
use super::validate::StoreError;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                target_id  TEXT PRIMARY KEY,
                record     TEXT NOT NULL,
                payload    BLOB,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub(crate) fn write_raw(&self, target_id: &str, record: &str) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO snapshots (target_id, record, payload, updated_at)
             VALUES (?1, ?2, NULL, 0)",
            params![target_id, record],
        )?;
        Ok(())
    }
}

impl SnapshotStore for SqliteStore {
    fn read(&self, target_id: &str) -> Result<Option<Snapshot>, StoreError> {
        let row: Option<(String, Option<Vec<u8>>)> = self
            .conn
            .lock()
            .query_row(
                "SELECT record, payload FROM snapshots WHERE target_id = ?1",
                params![target_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((record, payload)) => {
                let mut snapshot: Snapshot = serde_json::from_str(&record)?;
                snapshot.payload = payload;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn save(&self, target_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut record = snapshot.clone();
        let payload = record.payload.take();
        let json = serde_json::to_string(&record)?;

        self.conn.lock().execute(
            "INSERT OR REPLACE INTO snapshots (target_id, record, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![target_id, json, payload, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn remove(&self, target_id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM snapshots WHERE target_id = ?1", params![target_id])?;
        Ok(deleted > 0)
    }
}
