//! Quarantine Store
//!
//! Moves confirmed threats into an isolated directory and keeps their
//! metadata in SQLite so isolation stays reversible.
//!
//! Invariant: a quarantine file exists on disk iff its record exists in the
//! store. Isolation is copy-then-delete: the original is only removed after
//! both the copy and the metadata insert succeeded, and a failed insert
//! rolls the copy back. Concurrent quarantine attempts on one original path
//! are serialized through an in-flight guard; the UNIQUE constraint on
//! `original_path` backs that up at the storage layer.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use serde::Serialize;

pub mod whitelist;

const QUARANTINE_FOLDER: &str = "quarantine";
const DB_FILE: &str = "quarantine.db";

// ============================================================================
// TYPES
// ============================================================================

/// One isolated file. Fields are immutable after creation; the row is
/// deleted when the file is restored or permanently removed.
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineRecord {
    pub id: i64,
    pub original_path: PathBuf,
    pub quarantine_path: PathBuf,
    pub filename: String,
    /// Epoch milliseconds at isolation time
    pub timestamp: i64,
    pub threat_score: f64,
    pub file_size: u64,
}

#[derive(Debug, Clone)]
pub enum QuarantineError {
    /// The source file disappeared between scan and isolation
    SourceVanished { path: String },
    /// Unknown record id for restore/delete
    RecordNotFound { id: i64 },
    /// Another quarantine of the same original path is in progress
    AlreadyInFlight { path: String },
    /// Filesystem failure
    Io { message: String },
    /// Metadata storage failure
    Storage { message: String },
}

impl std::fmt::Display for QuarantineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuarantineError::SourceVanished { path } => {
                write!(f, "Source file vanished: {}", path)
            }
            QuarantineError::RecordNotFound { id } => {
                write!(f, "Quarantine record not found: {}", id)
            }
            QuarantineError::AlreadyInFlight { path } => {
                write!(f, "Quarantine already in progress for {}", path)
            }
            QuarantineError::Io { message } => write!(f, "IO error: {}", message),
            QuarantineError::Storage { message } => write!(f, "Storage error: {}", message),
        }
    }
}

impl std::error::Error for QuarantineError {}

fn storage_err(e: rusqlite::Error) -> QuarantineError {
    QuarantineError::Storage { message: e.to_string() }
}

fn io_err(e: std::io::Error) -> QuarantineError {
    QuarantineError::Io { message: e.to_string() }
}

// ============================================================================
// STORE
// ============================================================================

pub struct QuarantineStore {
    conn: Mutex<Connection>,
    quarantine_dir: PathBuf,
    in_flight: Mutex<HashSet<PathBuf>>,
    whitelist_cache: RwLock<HashSet<String>>,
}

impl QuarantineStore {
    /// Open (or create) the store under the app data directory.
    pub fn open(data_dir: &Path) -> Result<Self, QuarantineError> {
        let quarantine_dir = data_dir.join(QUARANTINE_FOLDER);
        fs::create_dir_all(&quarantine_dir).map_err(io_err)?;

        let conn = Connection::open(data_dir.join(DB_FILE)).map_err(storage_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS quarantine (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original_path TEXT NOT NULL UNIQUE,
                quarantine_path TEXT NOT NULL,
                filename TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                threat_score REAL NOT NULL,
                file_size INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS whitelist (
                hash TEXT PRIMARY KEY
            );",
        )
        .map_err(storage_err)?;

        let mut whitelist_cache = HashSet::new();
        {
            let mut stmt = conn
                .prepare("SELECT hash FROM whitelist")
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(storage_err)?;
            for hash in rows.flatten() {
                whitelist_cache.insert(hash);
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            quarantine_dir,
            in_flight: Mutex::new(HashSet::new()),
            whitelist_cache: RwLock::new(whitelist_cache),
        })
    }

    // ------------------------------------------------------------------
    // Whitelist
    // ------------------------------------------------------------------

    /// Pure set lookup against known-safe content hashes
    pub fn is_whitelisted(&self, hash: &str) -> bool {
        self.whitelist_cache.read().contains(&hash.to_lowercase())
    }

    pub fn add_to_whitelist(&self, hash: &str) -> Result<(), QuarantineError> {
        let hash = hash.to_lowercase();
        self.conn
            .lock()
            .execute("INSERT OR IGNORE INTO whitelist (hash) VALUES (?1)", params![hash])
            .map_err(storage_err)?;
        self.whitelist_cache.write().insert(hash);
        Ok(())
    }

    /// Whitelist a file on disk by its content hash. Returns the hash.
    pub fn whitelist_file(&self, path: &Path) -> Result<String, QuarantineError> {
        let hash = whitelist::hash_file(path).map_err(io_err)?;
        self.add_to_whitelist(&hash)?;
        Ok(hash)
    }

    pub fn remove_from_whitelist(&self, hash: &str) -> Result<(), QuarantineError> {
        let hash = hash.to_lowercase();
        self.conn
            .lock()
            .execute("DELETE FROM whitelist WHERE hash = ?1", params![hash])
            .map_err(storage_err)?;
        self.whitelist_cache.write().remove(&hash);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Isolation
    // ------------------------------------------------------------------

    /// Isolate a file. Returns the new record id.
    pub fn quarantine(&self, path: &Path, threat_score: f64) -> Result<i64, QuarantineError> {
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(path.to_path_buf()) {
                return Err(QuarantineError::AlreadyInFlight {
                    path: path.to_string_lossy().to_string(),
                });
            }
        }

        let result = self.quarantine_inner(path, threat_score);
        self.in_flight.lock().remove(path);
        result
    }

    fn quarantine_inner(&self, path: &Path, threat_score: f64) -> Result<i64, QuarantineError> {
        // 1. The file may have been deleted or moved since the scan started
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuarantineError::SourceVanished {
                    path: path.to_string_lossy().to_string(),
                })
            }
            Err(e) => return Err(io_err(e)),
        };
        let file_size = metadata.len();

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        // 2. Timestamped destination name avoids basename collisions
        let timestamp = Utc::now().timestamp_millis();
        let quarantine_path = self.quarantine_dir.join(format!("{}-{}", timestamp, filename));

        // 3. Copy first; a failure here leaves the original untouched
        fs::copy(path, &quarantine_path).map_err(io_err)?;

        // 4. Insert metadata; roll the copy back on failure so no
        //    quarantine file exists without a record
        let insert = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO quarantine
                    (original_path, quarantine_path, filename, timestamp, threat_score, file_size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    path.to_string_lossy(),
                    quarantine_path.to_string_lossy(),
                    filename,
                    timestamp,
                    threat_score,
                    file_size as i64,
                ],
            )
            .map(|_| conn.last_insert_rowid())
        };

        let id = match insert {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&quarantine_path) {
                    log::error!(
                        "Rollback failed, stray quarantine copy at {}: {}",
                        quarantine_path.display(),
                        cleanup
                    );
                }
                return Err(storage_err(e));
            }
        };

        // 5. Remove the original only now that copy + record both exist
        if let Err(e) = fs::remove_file(path) {
            log::warn!(
                "Quarantined {} (record {}) but original not removed: {}",
                path.display(),
                id,
                e
            );
        }

        log::warn!(
            "Quarantined file: {} -> {} (score {:.2})",
            path.display(),
            quarantine_path.display(),
            threat_score
        );

        Ok(id)
    }

    // ------------------------------------------------------------------
    // Restore / delete
    // ------------------------------------------------------------------

    /// Put a quarantined file back at its original path and drop the record.
    pub fn restore(&self, id: i64) -> Result<(), QuarantineError> {
        let record = self
            .get(id)?
            .ok_or(QuarantineError::RecordNotFound { id })?;

        if let Some(parent) = record.original_path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::copy(&record.quarantine_path, &record.original_path).map_err(io_err)?;

        // Drop the record before the backing file so no reader ever sees
        // a record without its file
        self.delete_row(id)?;

        if let Err(e) = fs::remove_file(&record.quarantine_path) {
            log::warn!(
                "Restored {} but quarantine copy not removed: {}",
                record.original_path.display(),
                e
            );
        }

        log::info!(
            "Restored file: {} -> {}",
            record.quarantine_path.display(),
            record.original_path.display()
        );
        Ok(())
    }

    /// Destroy a quarantined file and its record.
    pub fn permanently_delete(&self, id: i64) -> Result<(), QuarantineError> {
        let record = self
            .get(id)?
            .ok_or(QuarantineError::RecordNotFound { id })?;

        self.delete_row(id)?;

        if let Err(e) = fs::remove_file(&record.quarantine_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "Deleted record {} but quarantine copy not removed: {}",
                    id,
                    e
                );
            }
        }

        log::info!("Permanently deleted quarantined file: {}", record.filename);
        Ok(())
    }

    fn delete_row(&self, id: i64) -> Result<(), QuarantineError> {
        self.conn
            .lock()
            .execute("DELETE FROM quarantine WHERE id = ?1", params![id])
            .map_err(storage_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, id: i64) -> Result<Option<QuarantineRecord>, QuarantineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, original_path, quarantine_path, filename, timestamp, threat_score, file_size
                 FROM quarantine WHERE id = ?1",
            )
            .map_err(storage_err)?;

        let mut rows = stmt
            .query_map(params![id], row_to_record)
            .map_err(storage_err)?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(storage_err(e)),
            None => Ok(None),
        }
    }

    /// All records, newest first.
    pub fn list(&self) -> Result<Vec<QuarantineRecord>, QuarantineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, original_path, quarantine_path, filename, timestamp, threat_score, file_size
                 FROM quarantine ORDER BY timestamp DESC, id DESC",
            )
            .map_err(storage_err)?;

        let rows = stmt.query_map([], row_to_record).map_err(storage_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(storage_err)?);
        }
        Ok(records)
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine_dir
    }

    /// Hold a path's in-flight claim, to exercise the guard.
    #[cfg(test)]
    fn claim_in_flight(&self, path: &Path) -> bool {
        self.in_flight.lock().insert(path.to_path_buf())
    }

    /// Make the next metadata insert fail, to exercise rollback.
    #[cfg(test)]
    fn break_metadata(&self) {
        self.conn
            .lock()
            .execute_batch("DROP TABLE quarantine")
            .expect("drop table");
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuarantineRecord> {
    Ok(QuarantineRecord {
        id: row.get(0)?,
        original_path: PathBuf::from(row.get::<_, String>(1)?),
        quarantine_path: PathBuf::from(row.get::<_, String>(2)?),
        filename: row.get(3)?,
        timestamp: row.get(4)?,
        threat_score: row.get(5)?,
        file_size: row.get::<_, i64>(6)? as u64,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;
    use std::time::Duration;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    fn setup() -> (tempfile::TempDir, QuarantineStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = QuarantineStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_quarantine_then_restore_roundtrip() {
        let (dir, store) = setup();
        let content = b"#!/bin/sh\nrm -rf /\n";
        let source = write_file(dir.path(), "evil.sh", content);

        let id = store.quarantine(&source, 0.9).unwrap();
        assert!(!source.exists(), "original must be removed");

        let records = store.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].file_size, content.len() as u64);
        assert!(records[0].quarantine_path.exists());

        store.restore(id).unwrap();
        assert_eq!(fs::read(&source).unwrap(), content);
        assert!(store.list().unwrap().is_empty());
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn test_restore_recreates_directory_tree() {
        let (dir, store) = setup();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let source = write_file(&nested, "payload.exe", b"MZ....");

        let id = store.quarantine(&source, 0.8).unwrap();

        // Remove the original directory tree entirely
        fs::remove_dir_all(dir.path().join("a")).unwrap();

        store.restore(id).unwrap();
        assert_eq!(fs::read(&source).unwrap(), b"MZ....");
    }

    #[test]
    fn test_metadata_failure_rolls_back_copy() {
        let (dir, store) = setup();
        let source = write_file(dir.path(), "sample.py", b"import os");

        store.break_metadata();
        let err = store.quarantine(&source, 0.7);
        assert!(matches!(err, Err(QuarantineError::Storage { .. })));

        // Original untouched, quarantine directory has no stray copy
        assert!(source.exists());
        let leftovers: Vec<_> = fs::read_dir(store.quarantine_dir())
            .unwrap()
            .flatten()
            .collect();
        assert!(leftovers.is_empty(), "copy must be rolled back");
    }

    #[test]
    fn test_vanished_source() {
        let (dir, store) = setup();
        let ghost = dir.path().join("never-existed.exe");
        assert!(matches!(
            store.quarantine(&ghost, 0.5),
            Err(QuarantineError::SourceVanished { .. })
        ));
    }

    #[test]
    fn test_unknown_record_ids() {
        let (_dir, store) = setup();
        assert!(matches!(
            store.restore(404),
            Err(QuarantineError::RecordNotFound { id: 404 })
        ));
        assert!(matches!(
            store.permanently_delete(404),
            Err(QuarantineError::RecordNotFound { id: 404 })
        ));
    }

    #[test]
    fn test_permanent_delete_removes_file_and_record() {
        let (dir, store) = setup();
        let source = write_file(dir.path(), "bad.dll", b"MZ");

        let id = store.quarantine(&source, 1.0).unwrap();
        let qpath = store.get(id).unwrap().unwrap().quarantine_path;

        store.permanently_delete(id).unwrap();
        assert!(!qpath.exists());
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn test_list_is_newest_first() {
        let (dir, store) = setup();
        let first = write_file(dir.path(), "first.exe", b"1");
        let second = write_file(dir.path(), "second.exe", b"2");

        let id_first = store.quarantine(&first, 0.6).unwrap();
        // Destination names and ordering are millisecond-timestamped
        thread::sleep(Duration::from_millis(5));
        let id_second = store.quarantine(&second, 0.6).unwrap();

        let records = store.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, id_second);
        assert_eq!(records[1].id, id_first);
    }

    #[test]
    fn test_concurrent_quarantine_single_winner() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(QuarantineStore::open(dir.path()).unwrap());
        let source = write_file(dir.path(), "raced.exe", b"MZ race");

        // Two threads attempt to isolate the same original at once;
        // exactly one may win
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let source = source.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.quarantine(&source, 0.9)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one attempt may succeed");

        // The loser is turned away by the in-flight guard, or finds the
        // original already gone if the winner finished first
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser,
            Err(QuarantineError::AlreadyInFlight { .. })
                | Err(QuarantineError::SourceVanished { .. })
        ));

        let records = store.list().unwrap();
        assert_eq!(records.len(), 1, "single record for the path");
        assert!(records[0].quarantine_path.exists());
        assert!(!source.exists());
    }

    #[test]
    fn test_claimed_path_is_rejected() {
        let (dir, store) = setup();
        let source = write_file(dir.path(), "held.exe", b"MZ");

        assert!(store.claim_in_flight(&source));
        assert!(matches!(
            store.quarantine(&source, 0.9),
            Err(QuarantineError::AlreadyInFlight { .. })
        ));

        // The rejected attempt must leave everything untouched
        assert!(source.exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_whitelist_file_by_path() {
        let (dir, store) = setup();
        let content = b"#!/bin/sh\necho trusted\n";
        let path = write_file(dir.path(), "trusted.sh", content);

        let hash = store.whitelist_file(&path).unwrap();
        assert_eq!(hash, whitelist::hash_bytes(content));
        assert!(store.is_whitelisted(&hash));

        assert!(matches!(
            store.whitelist_file(&dir.path().join("gone.sh")),
            Err(QuarantineError::Io { .. })
        ));
    }

    #[test]
    fn test_whitelist_membership() {
        let (dir, store) = setup();
        let hash = whitelist::hash_bytes(b"trusted tool");

        assert!(!store.is_whitelisted(&hash));
        store.add_to_whitelist(&hash).unwrap();
        assert!(store.is_whitelisted(&hash));
        // Lookup is case-insensitive on the hex digest
        assert!(store.is_whitelisted(&hash.to_uppercase()));

        // Persisted across reopen
        drop(store);
        let reopened = QuarantineStore::open(dir.path()).unwrap();
        assert!(reopened.is_whitelisted(&hash));

        reopened.remove_from_whitelist(&hash).unwrap();
        assert!(!reopened.is_whitelisted(&hash));
    }
}
