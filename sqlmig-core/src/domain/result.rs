//! Result and error types for the core library

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Core library error type
///
/// Every variant is fatal for the invocation that raised it. Nothing in the
/// core retries or swallows these; the CLI prints them and exits non-zero.
#[derive(Error, Debug)]
pub enum Error {
    /// The target store could not be opened or did not answer a ping.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The `_migrations` ledger table could not be created.
    #[error("Failed to bootstrap migration ledger: {0}")]
    SchemaBootstrap(String),

    /// One statement of a migration failed. `statement_index` is 1-based.
    #[error(
        "Migration {migration} failed at statement {statement_index} of {statement_count}: {message}"
    )]
    StatementExecution {
        migration: String,
        statement_index: usize,
        statement_count: usize,
        message: String,
    },

    /// The ledger already holds a row for this migration name.
    #[error("Migration {0} is already recorded in the ledger")]
    DuplicateName(String),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid migration file name: {0} (expected YYYYMMDDHHmmss_<slug>.sql)")]
    InvalidMigrationName(String),

    #[error("Another migration run holds the lock at {}", .0.display())]
    Locked(PathBuf),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an I/O error with the path it happened at
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Name of the migration this error is about, if any
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::StatementExecution { migration, .. } => Some(migration),
            Self::DuplicateName(name) | Self::InvalidMigrationName(name) => Some(name),
            _ => None,
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
