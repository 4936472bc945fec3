//! Scan History
//!
//! Append-only log of completed scans, kept in its own SQLite database.
//! Real-time detections append a record per confirmed threat; scheduled
//! full scans append one aggregate record.

use std::path::Path;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;

const DB_FILE: &str = "history.db";

// ============================================================================
// TYPES
// ============================================================================

/// One completed scan. Calendar fields are denormalized from the timestamp
/// so the record is self-describing when listed.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub threats: u32,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    /// Epoch milliseconds
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct HistoryError(pub String);

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "History error: {}", self.0)
    }
}

impl std::error::Error for HistoryError {}

impl From<rusqlite::Error> for HistoryError {
    fn from(e: rusqlite::Error) -> Self {
        HistoryError(e.to_string())
    }
}

// ============================================================================
// STORE
// ============================================================================

pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    pub fn open(data_dir: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(data_dir.join(DB_FILE))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scan_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                threats INTEGER NOT NULL,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                day INTEGER NOT NULL,
                hour INTEGER NOT NULL,
                minute INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn insert(&self, threats: u32, at: DateTime<Utc>) -> Result<i64, HistoryError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO scan_history
                (threats, year, month, day, hour, minute, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                threats,
                at.year(),
                at.month(),
                at.day(),
                at.hour(),
                at.minute(),
                at.timestamp_millis(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All records, newest first.
    pub fn query_all(&self) -> Result<Vec<ScanRecord>, HistoryError> {
        self.query_since(i64::MIN)
    }

    /// Records from the last 24 hours, newest first.
    pub fn last_day(&self) -> Result<Vec<ScanRecord>, HistoryError> {
        self.query_since((Utc::now() - Duration::hours(24)).timestamp_millis())
    }

    /// Records from the last 30 days, newest first.
    pub fn last_month(&self) -> Result<Vec<ScanRecord>, HistoryError> {
        self.query_since((Utc::now() - Duration::days(30)).timestamp_millis())
    }

    fn query_since(&self, since_ms: i64) -> Result<Vec<ScanRecord>, HistoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, threats, year, month, day, hour, minute, timestamp_ms
             FROM scan_history WHERE timestamp_ms >= ?1
             ORDER BY timestamp_ms DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![since_ms], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Most recent record, if any. Drives the scheduler's due check.
    pub fn latest(&self) -> Result<Option<ScanRecord>, HistoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, threats, year, month, day, hour, minute, timestamp_ms
             FROM scan_history ORDER BY timestamp_ms DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], row_to_record)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        self.conn.lock().execute("DELETE FROM scan_history", [])?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanRecord> {
    Ok(ScanRecord {
        id: row.get(0)?,
        threats: row.get(1)?,
        year: row.get(2)?,
        month: row.get(3)?,
        day: row.get(4)?,
        hour: row.get(5)?,
        minute: row.get(6)?,
        timestamp_ms: row.get(7)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
