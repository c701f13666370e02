use super::storage::{target_file_stem, JsonFileStore, MemoryStore, SnapshotStore, sanitize_target_id};
use super::sqlite::SqliteStore;
use super::types::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
use super::validate::{validate_snapshot, StoreError};
use crate::logic::capture::Capture;
use crate::logic::policy::{DecisionRecord, DecisionVerdict};

fn decision(target: &str, verdict: DecisionVerdict, count: u32) -> DecisionRecord {
    DecisionRecord {
        target_id: target.to_string(),
        decided_at: chrono::Utc::now(),
        verdict,
        consecutive_count: count,
        uncertain_streak: 0,
        episode_notified: false,
        notify: false,
        signal: None,
        rationale: String::new(),
    }
}

fn snapshot(target: &str, bytes: &[u8]) -> Snapshot {
    let capture = Capture::now(target, bytes.to_vec());
    Snapshot::from_capture(
        &capture,
        Some("2x2:deadbeef".to_string()),
        &decision(target, DecisionVerdict::Pending, 1),
        true,
    )
}

#[test]
fn test_snapshot_creation() {
    let s = snapshot("nvidia", b"page-bytes");
    assert_eq!(s.schema_version, SNAPSHOT_SCHEMA_VERSION);
    assert_eq!(s.content_hash.len(), 64);
    assert_eq!(s.last_verdict, DecisionVerdict::Pending);
    assert_eq!(s.consecutive_count, 1);
    assert_eq!(s.to_capture().unwrap().bytes(), b"page-bytes");
}

#[test]
fn test_reject_schema_mismatch() {
    let mut s = snapshot("nvidia", b"x");
    s.schema_version = SNAPSHOT_SCHEMA_VERSION + 1;

    match validate_snapshot(&s, "nvidia") {
        Err(StoreError::SchemaMismatch { expected, actual }) => {
            assert_eq!(expected, SNAPSHOT_SCHEMA_VERSION);
            assert_eq!(actual, SNAPSHOT_SCHEMA_VERSION + 1);
        }
        other => panic!("Expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn test_reject_bad_hash_and_foreign_target() {
    let mut s = snapshot("nvidia", b"x");
    assert!(matches!(validate_snapshot(&s, "intel"), Err(StoreError::Corrupt(_))));

    s.content_hash = "not-a-hash".to_string();
    assert!(matches!(validate_snapshot(&s, "nvidia"), Err(StoreError::Corrupt(_))));
}

#[test]
fn test_reject_payload_not_matching_hash() {
    let mut s = snapshot("nvidia", b"listing v1");
    s.payload = Some(b"listing v1 with bit rot".to_vec());
    assert!(matches!(validate_snapshot(&s, "nvidia"), Err(StoreError::Corrupt(_))));

    // Hash-only records carry no payload to check
    s.payload = None;
    assert!(validate_snapshot(&s, "nvidia").is_ok());
}

#[test]
fn test_damaged_payload_loads_as_absent() {
    let json_dir = tempfile::tempdir().unwrap();
    let json = JsonFileStore::new(json_dir.path());
    let sqlite = SqliteStore::in_memory().unwrap();
    let memory = MemoryStore::new();

    let mut damaged = snapshot("intel", &[1, 2, 3, 4]);
    damaged.payload = Some(vec![1, 2, 3, 5]);

    for store in [&json as &dyn SnapshotStore, &sqlite, &memory] {
        store.save("intel", &damaged).unwrap();
        assert!(store.read("intel").unwrap().is_some());
        assert!(store.load("intel").is_none());
    }
}

#[test]
fn test_json_store_save_load_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    let original = snapshot("nvidia", b"\x89PNG fake payload");
    store.save("nvidia", &original).unwrap();

    let loaded = store.load("nvidia").unwrap();
    assert_eq!(loaded, original);
    assert!(!dir.path().join("nvidia.json.tmp").exists());
}

#[test]
fn test_json_store_corrupt_record_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    std::fs::write(dir.path().join("intel.json"), b"{ this is not json").unwrap();

    assert!(store.read("intel").is_err());
    assert!(store.load("intel").is_none());
}

#[test]
fn test_json_store_missing_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("never-created"));
    assert!(store.load("nvidia").is_none());
    assert!(!store.remove("nvidia").unwrap());
}

#[test]
fn test_json_store_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    store.save("nvidia", &snapshot("nvidia", b"x")).unwrap();

    assert!(store.remove("nvidia").unwrap());
    assert!(store.load("nvidia").is_none());
}

#[test]
fn test_sqlite_store_keeps_payload_out_of_record() {
    let store = SqliteStore::in_memory().unwrap();
    let original = snapshot("intel", &[1, 2, 3, 4]);
    store.save("intel", &original).unwrap();

    let loaded = store.load("intel").unwrap();
    assert_eq!(loaded.payload.as_deref(), Some(&[1u8, 2, 3, 4][..]));
    assert_eq!(loaded, original);

    // Overwrite replaces the single live row
    let newer = snapshot("intel", &[9, 9]);
    store.save("intel", &newer).unwrap();
    assert_eq!(store.load("intel").unwrap().content_hash, newer.content_hash);
}

#[test]
fn test_sqlite_store_corrupt_record_is_absent() {
    let store = SqliteStore::in_memory().unwrap();
    store.write_raw("intel", "garbage").unwrap();
    assert!(store.load("intel").is_none());
}

#[test]
fn test_sqlite_store_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("snapshots.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.save("nvidia", &snapshot("nvidia", b"abc")).unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert!(reopened.load("nvidia").is_some());
    assert!(reopened.remove("nvidia").unwrap());
    assert!(reopened.load("nvidia").is_none());
}

#[test]
fn test_memory_store() {
    let store = MemoryStore::new();
    assert!(store.is_empty());
    store.save("nvidia", &snapshot("nvidia", b"a")).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.load("nvidia").is_some());
}

#[test]
fn test_sanitize_target_id() {
    assert_eq!(sanitize_target_id("NVIDIA"), "NVIDIA");
    assert_eq!(sanitize_target_id("../etc/passwd"), "___etc_passwd");
    assert_eq!(sanitize_target_id("intel-students_2"), "intel-students_2");
}

#[test]
fn test_target_file_stem_is_unique() {
    assert_eq!(target_file_stem("nvidia"), "nvidia");
    assert_eq!(target_file_stem("intel-students_2"), "intel-students_2");

    let dotted = target_file_stem("acme.jobs");
    assert!(dotted.starts_with("acme_jobs-"));
    assert_ne!(dotted, target_file_stem("acme_jobs"));
    assert_ne!(target_file_stem("a/b"), target_file_stem("a:b"));
}

#[test]
fn test_json_store_keeps_similar_ids_apart() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    let dotted = snapshot("acme.jobs", b"dotted listing");
    let plain = snapshot("acme_jobs", b"plain listing");
    store.save("acme.jobs", &dotted).unwrap();
    store.save("acme_jobs", &plain).unwrap();

    assert_eq!(store.load("acme.jobs"), Some(dotted));
    assert_eq!(store.load("acme_jobs"), Some(plain));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}
