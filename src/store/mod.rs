pub mod types;

pub use types::PrRecord;

use rusqlite::types::Type;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),

    #[error("Failed to enable WAL mode: SQLite kept journal_mode '{0}'")]
    JournalMode(String),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("PR number {0} does not fit in an SQLite integer")]
    NumberOutOfRange(u64),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS prs (
    repo   TEXT,
    number INTEGER,
    title  TEXT,
    body   TEXT,
    diff   TEXT,
    PRIMARY KEY (repo, number)
);
"#;

/// SQLite-backed store holding one row per `(repo, number)`.
///
/// Cloning shares the same connection. Every write is a single
/// `INSERT OR IGNORE` issued under the connection lock, so concurrent
/// writers never produce duplicate keys and the first write wins.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    /// Open (or create) the store at `path` in WAL mode.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn, false)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, true)
    }

    fn init(conn: Connection, in_memory: bool) -> Result<Self, StoreError> {
        // In-memory databases report "memory" and cannot switch to WAL.
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(StoreError::JournalMode(journal_mode));
        }

        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;
        debug!(journal_mode = %journal_mode, "record store ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert the record unless `(repo, number)` already exists.
    ///
    /// Returns `true` when a new row was written, `false` for a no-op.
    pub fn upsert_if_absent(&self, record: &PrRecord) -> Result<bool, StoreError> {
        let number =
            i64::try_from(record.number).map_err(|_| StoreError::NumberOutOfRange(record.number))?;
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO prs (repo, number, title, body, diff) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![record.repo, number, record.title, record.body, record.diff],
        )?;
        Ok(changed > 0)
    }

    /// Every stored record, ordered by `(repo, number)`.
    pub fn read_all(&self) -> Result<Vec<PrRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT repo, number, COALESCE(title, ''), COALESCE(body, ''), COALESCE(diff, '')
             FROM prs ORDER BY repo, number",
        )?;
        let rows = stmt.query_map([], |row| {
            let number: i64 = row.get(1)?;
            let number = u64::try_from(number).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(err))
            })?;
            Ok(PrRecord {
                repo: row.get(0)?,
                number,
                title: row.get(2)?,
                body: row.get(3)?,
                diff: row.get(4)?,
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(rows = records.len(), "read record store");
        Ok(records)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM prs", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| StoreError::Sqlite(rusqlite::Error::IntegralValueOutOfRange(0, count)))
    }
}
