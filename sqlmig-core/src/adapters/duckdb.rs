//! DuckDB store implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use duckdb::{params, Connection};

use crate::domain::result::{Error, Result};
use crate::domain::LedgerEntry;
use crate::ports::{MigrationStore, LEDGER_TABLE};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Format used to read `executed_at` back out of the ledger
const EXECUTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CREATE_LEDGER_SQL: &str = "
    CREATE SEQUENCE IF NOT EXISTS _migrations_id_seq START 1;
    CREATE TABLE IF NOT EXISTS _migrations (
        id BIGINT PRIMARY KEY DEFAULT nextval('_migrations_id_seq'),
        name VARCHAR NOT NULL UNIQUE,
        executed_at TIMESTAMP NOT NULL DEFAULT current_timestamp
    );
";

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Error::Database(err.to_string())
    }
}

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// Check if an error message is a unique/primary key violation
fn is_duplicate_key_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("duplicate key") || lower.contains("unique constraint")
}

/// DuckDB-backed target store
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    run_gate: Mutex<()>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the database file at `db_path`
    ///
    /// Retries with exponential backoff when the file is held by another
    /// process; any other failure is returned at once as a connection error.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        run_gate: Mutex::new(()),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[sqlmig] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(err_msg);
                        continue;
                    }
                    return Err(Error::connection(format!(
                        "failed to open {}: {}",
                        db_path.display(),
                        err_msg
                    )));
                }
            }
        }

        Err(Error::connection(format!(
            "failed to open {} after {} attempts: {}",
            db_path.display(),
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )))
    }

    /// Open a private in-memory database (tests, dry experiments)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            run_gate: Mutex::new(()),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
        // Autoloading would try to fetch extensions over the network mid-migration
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    #[cfg(test)]
    fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

impl MigrationStore for DuckDbStore {
    fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
            .map_err(|e| Error::connection(e.to_string()))?;
        Ok(())
    }

    fn location(&self) -> String {
        match &self.db_path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }

    fn run_gate(&self) -> &Mutex<()> {
        &self.run_gate
    }

    fn execute(&self, sql: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn begin(&self) -> Result<()> {
        self.conn()?.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn ledger_exists(&self) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            params![LEDGER_TABLE],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_ledger(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(CREATE_LEDGER_SQL)?;
        Ok(())
    }

    fn ledger_entries(&self) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, strftime(executed_at, '%Y-%m-%d %H:%M:%S')
             FROM _migrations
             ORDER BY name ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let executed_at: Option<String> = row.get(2)?;
            Ok(LedgerEntry {
                id: row.get(0)?,
                name: row.get(1)?,
                executed_at: executed_at
                    .and_then(|s| NaiveDateTime::parse_from_str(&s, EXECUTED_AT_FORMAT).ok()),
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn insert_ledger_entry(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO _migrations (name) VALUES (?)", params![name])
            .map_err(|e| {
                let msg = e.to_string();
                if is_duplicate_key_error(&msg) {
                    Error::DuplicateName(name.to_string())
                } else {
                    Error::Database(msg)
                }
            })?;
        Ok(())
    }
}
