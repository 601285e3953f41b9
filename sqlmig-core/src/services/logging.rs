//! Logging service - structured event logging to DuckDB
//!
//! Keeps an append-only history of commands and migration outcomes in
//! `logs.duckdb` inside the state directory. It is a separate database from
//! the migration target, so the migrated schema never gains log tables.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// File name of the event log inside the state directory
pub const LOG_DB_FILENAME: &str = "logs.duckdb";

const LOG_SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS sys_logs (
        id UBIGINT PRIMARY KEY,
        timestamp BIGINT NOT NULL,
        app_version VARCHAR NOT NULL,
        platform VARCHAR NOT NULL,
        event VARCHAR NOT NULL,
        command VARCHAR,
        migration VARCHAR,
        statements BIGINT,
        error_message VARCHAR,
        error_details VARCHAR
    );
    CREATE INDEX IF NOT EXISTS idx_sys_logs_timestamp ON sys_logs (timestamp);
";

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    let timestamp = now_ms() as u64;

    // Lower 16 bits: counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

/// Current unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Detect the current platform
fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    /// Create a new log event with just an event name
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            migration: None,
            statements: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Set the CLI command context
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Set the migration this event is about
    pub fn with_migration(mut self, migration: impl Into<String>) -> Self {
        self.migration = Some(migration.into());
        self
    }

    /// Set a statement count (executed, or position of the failing one)
    pub fn with_statements(mut self, statements: usize) -> Self {
        self.statements = Some(statements as i64);
        self
    }

    /// Set error information
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Set error details
    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub migration: Option<String>,
    pub statements: Option<i64>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

const SELECT_ENTRY_COLUMNS: &str = "SELECT id, timestamp, app_version, platform, event, command,
        migration, statements, error_message, error_details
 FROM sys_logs";

fn row_to_entry(row: &duckdb::Row) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        app_version: row.get(2)?,
        platform: row.get(3)?,
        event: row.get(4)?,
        command: row.get(5)?,
        migration: row.get(6)?,
        statements: row.get(7)?,
        error_message: row.get(8)?,
        error_details: row.get(9)?,
    })
}

/// Service for structured event logging
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create `logs.duckdb` in `state_dir`
    pub fn new(state_dir: &Path, app_version: impl Into<String>) -> Result<Self> {
        std::fs::create_dir_all(state_dir).map_err(|e| Error::filesystem(state_dir, e))?;

        let db_path = state_dir.join(LOG_DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(LOG_SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    /// Open the log only if a previous command already created it
    pub fn open_existing(
        state_dir: &Path,
        app_version: impl Into<String>,
    ) -> Result<Option<Self>> {
        if state_dir.join(LOG_DB_FILENAME).is_file() {
            Self::new(state_dir, app_version).map(Some)
        } else {
            Ok(None)
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Log an event
    ///
    /// The app version and platform are added from the service configuration.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO sys_logs (
                id, timestamp, app_version, platform, event,
                command, migration, statements, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                generate_id(),
                now_ms(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.command,
                &event.migration,
                &event.statements,
                &event.error_message,
                &event.error_details,
            ],
        )?;

        Ok(())
    }

    /// Log a CLI command execution
    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_ENTRY_COLUMNS} ORDER BY timestamp DESC, id DESC LIMIT ?"
        ))?;

        let entries = stmt
            .query_map([limit as i64], row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Most recent entries that carry an error, newest first
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_ENTRY_COLUMNS} WHERE error_message IS NOT NULL
             ORDER BY timestamp DESC, id DESC LIMIT ?"
        ))?;

        let entries = stmt
            .query_map([limit as i64], row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Get the total number of log entries
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of entries that carry an error
    pub fn error_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_logs WHERE error_message IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Get the path to the logs database
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logging_service_creation() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join(".sqlmig");
        let service = LoggingService::new(&state_dir, "1.0.0").unwrap();

        assert!(service.db_path().exists());
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = tempdir().unwrap();
        {
            let service = LoggingService::new(dir.path(), "1.0.0").unwrap();
            service.log_command("migrate").unwrap();
        }

        let service = LoggingService::new(dir.path(), "1.0.0").unwrap();
        assert_eq!(service.count().unwrap(), 1);
    }

    #[test]
    fn test_log_with_migration_context() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), "2.0.0").unwrap();

        service
            .log(
                LogEvent::new("migration_applied")
                    .with_command("migrate")
                    .with_migration("20250101000000_users.sql")
                    .with_statements(3),
            )
            .unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "migration_applied");
        assert_eq!(entries[0].command.as_deref(), Some("migrate"));
        assert_eq!(entries[0].migration.as_deref(), Some("20250101000000_users.sql"));
        assert_eq!(entries[0].statements, Some(3));
        assert_eq!(entries[0].app_version, "2.0.0");
    }

    #[test]
    fn test_log_error() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), "1.0.0").unwrap();

        service.log(LogEvent::new("run_completed")).unwrap();
        service
            .log(
                LogEvent::new("migration_failed")
                    .with_error("syntax error")
                    .with_error_details("statement 2 of 3"),
            )
            .unwrap();

        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, "migration_failed");
        assert_eq!(errors[0].error_message.as_deref(), Some("syntax error"));
        assert_eq!(errors[0].error_details.as_deref(), Some("statement 2 of 3"));
        assert_eq!(service.error_count().unwrap(), 1);
    }

    #[test]
    fn test_count_and_delete() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), "1.0.0").unwrap();

        for event in ["event1", "event2", "event3"] {
            service.log(LogEvent::new(event)).unwrap();
        }

        assert_eq!(service.count().unwrap(), 3);

        // Delete all logs (using future timestamp)
        let deleted = service.delete_before(now_ms() + 1000).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_existing_creates_nothing() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join(".sqlmig");

        assert!(LoggingService::open_existing(&state_dir, "1.0.0").unwrap().is_none());
        assert!(!state_dir.exists());

        LoggingService::new(&state_dir, "1.0.0")
            .unwrap()
            .log_command("status")
            .unwrap();
        let service = LoggingService::open_existing(&state_dir, "1.0.0")
            .unwrap()
            .unwrap();
        assert_eq!(service.count().unwrap(), 1);
    }
}
