//! # Sticky Store
//!
//! Durable, queryable state for the pairing event, backed by SQLite.
//!
//! ```text
//! StateStore (Mutex<Connection>)
//!   ├── parties        requester groups + provider units, occupancy flag
//!   ├── party_slots    requester group -> category -> appointment time
//!   ├── members        external user -> role (requester / provider / coordinator)
//!   ├── visits         append-only pairing history, `finished` flips once
//!   ├── bitmasks       group key -> progress cells
//!   └── content_items  numbered items revealed by progress cells
//! ```
//!
//! Ownership of writes: occupancy and visits belong to the assignment engine,
//! bitmasks to the progress tracker. Registration writes (parties, slots,
//! members, content) happen before the event starts.

mod parties;
mod progress;
mod schema;
mod visits;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use sticky_core::error::{Result, StickyError};

/// SQLite-backed state store shared by every component.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| StickyError::Database(format!("DB open error: {e}")))?;

        // WAL lets the CLI read while a reminder process holds the file open
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StickyError::Database(format!("DB pragma error: {e}")))?;

        Self::from_connection(conn)
    }

    /// Fresh in-memory store (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StickyError::Database(format!("store lock poisoned: {e}")))
    }
}

pub(crate) fn db_err(e: rusqlite::Error) -> StickyError {
    StickyError::Database(e.to_string())
}

/// Parse an rfc3339 column. A malformed value surfaces as a conversion
/// error, which `db_err` turns into `StickyError::Database`.
pub(crate) fn parse_ts(column: usize, s: &str) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&chrono::Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_file_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sticky.db");
        {
            let store = StateStore::open(&path).unwrap();
            store.upsert_provider("Aeskwadraat", "chan-aes", "").unwrap();
        }
        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.providers().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_ts_rejects_garbage() {
        assert!(parse_ts(4, "2026-08-20T12:00:00+00:00").is_ok());
        assert!(matches!(
            parse_ts(4, "yesterday").map_err(db_err),
            Err(StickyError::Database(_))
        ));
    }
}
