//! Decision Journal
//!
//! Append-only JSONL log of every `DecisionRecord`, one line per target per
//! cycle. Rotates to `decisions.jsonl.1` once the file grows past the limit.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::logic::policy::DecisionRecord;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum file size before rotation (10 MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const JOURNAL_FILE: &str = "decisions.jsonl";

// ============================================================================
// JOURNAL
// ============================================================================

struct JournalWriter {
    writer: BufWriter<File>,
    current_size: u64,
}

pub struct DecisionJournal {
    path: PathBuf,
    max_size: u64,
    inner: Mutex<JournalWriter>,
}

impl DecisionJournal {
    /// Open (or create) the journal inside `dir`
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        Self::with_limit(dir, MAX_FILE_SIZE)
    }

    pub fn with_limit(dir: &Path, max_size: u64) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(JOURNAL_FILE);
        let (file, current_size) = open_append(&path)?;

        Ok(Self {
            path,
            max_size,
            inner: Mutex::new(JournalWriter {
                writer: BufWriter::new(file),
                current_size,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush
    pub fn record(&self, record: &DecisionRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let len = line.len() as u64 + 1;

        let mut inner = self.inner.lock();
        if inner.current_size > 0 && inner.current_size + len > self.max_size {
            self.rotate(&mut inner)?;
        }

        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        inner.writer.flush()?;
        inner.current_size += len;
        Ok(())
    }

    fn rotate(&self, inner: &mut JournalWriter) -> std::io::Result<()> {
        inner.writer.flush()?;

        let rotated = self.path.with_extension("jsonl.1");
        std::fs::rename(&self.path, &rotated)?;

        let (file, size) = open_append(&self.path)?;
        inner.writer = BufWriter::new(file);
        inner.current_size = size;

        log::info!("Rotated decision journal to {:?}", rotated);
        Ok(())
    }
}

fn open_append(path: &Path) -> std::io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((file, size))
}

// ============================================================================
// QUERY
// ============================================================================

/// Read every parseable record, skipping damaged lines
pub fn read_records(path: &Path) -> std::io::Result<Vec<DecisionRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping damaged journal line: {}", e),
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::policy::DecisionVerdict;

    fn record(target: &str, verdict: DecisionVerdict) -> DecisionRecord {
        DecisionRecord {
            target_id: target.to_string(),
            decided_at: chrono::Utc::now(),
            verdict,
            consecutive_count: 0,
            uncertain_streak: 0,
            episode_notified: false,
            notify: false,
            signal: None,
            rationale: "test".to_string(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let journal = DecisionJournal::open(dir.path()).unwrap();

        journal.record(&record("nvidia", DecisionVerdict::ColdStart)).unwrap();
        journal.record(&record("nvidia", DecisionVerdict::Pending)).unwrap();

        let records = read_records(journal.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].verdict, DecisionVerdict::Pending);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        DecisionJournal::open(dir.path()).unwrap()
            .record(&record("intel", DecisionVerdict::NoChange)).unwrap();
        DecisionJournal::open(dir.path()).unwrap()
            .record(&record("intel", DecisionVerdict::NoChange)).unwrap();

        assert_eq!(read_records(&dir.path().join(JOURNAL_FILE)).unwrap().len(), 2);
    }

    #[test]
    fn test_damaged_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let journal = DecisionJournal::open(dir.path()).unwrap();
        journal.record(&record("intel", DecisionVerdict::NoChange)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(journal.path())
            .unwrap()
            .write_all(b"{broken\n")
            .unwrap();

        assert_eq!(read_records(journal.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let journal = DecisionJournal::with_limit(dir.path(), 64).unwrap();

        journal.record(&record("nvidia", DecisionVerdict::NoChange)).unwrap();
        journal.record(&record("nvidia", DecisionVerdict::NoChange)).unwrap();

        assert!(dir.path().join("decisions.jsonl.1").exists());
        assert_eq!(read_records(journal.path()).unwrap().len(), 1);
    }
}
