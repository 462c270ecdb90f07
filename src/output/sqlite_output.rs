//! SQLite record sink
//!
//! Writes one row per fetched page. A page fetched again in a later run
//! replaces its earlier row.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::output::traits::{OutputResult, PageRecord, RecordSink};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    status_code INTEGER NOT NULL,
    title TEXT,
    content_type TEXT,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status_code);
"#;

/// SQLite-backed record sink
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens or creates the database at the given path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(OutputError)` - Failed to open database
    pub fn new(path: &Path) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of recorded pages
    pub fn count(&self) -> OutputResult<u64> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordSink for SqliteSink {
    fn record(&self, record: &PageRecord) -> OutputResult<()> {
        self.lock().execute(
            "INSERT INTO pages (url, status_code, title, content_type, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                status_code = excluded.status_code,
                title = excluded.title,
                content_type = excluded.content_type,
                fetched_at = excluded.fetched_at",
            params![
                record.url,
                record.status,
                record.title,
                record.content_type,
                record.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
