//! sqlmig core - forward-only SQL schema migrations
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: migration names, files, ledger entries, errors
//! - **ports**: the `MigrationStore` trait the services depend on
//! - **services**: catalog, ledger, statement splitting, runner, status,
//!   authoring, run lock, event log
//! - **adapters**: the DuckDB store
//! - **config**: `sqlmig.json` plus environment overrides

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::DuckDbStore;
use config::Config;
use ports::MigrationStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{LedgerEntry, MigrationFile, MigrationName};
pub use services::{LogEntry, LogEvent, LoggingService};

/// Everything a command needs to talk to one project's database
///
/// Built explicitly from a project directory; nothing is initialised at
/// process level.
pub struct MigrationContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub runner: MigrationRunner,
    pub status_service: StatusService,
}

impl MigrationContext {
    /// Load config for `project_dir` and open its database
    pub fn new(project_dir: &Path) -> Result<Self> {
        let config = Config::load(project_dir)?;
        Self::from_config(config)
    }

    /// Open the database named by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
        }

        let store = Arc::new(DuckDbStore::open(&config.database_path)?);
        Ok(Self::with_store(config, store))
    }

    /// Open the database named by `config` without creating anything
    ///
    /// A database file that does not exist yet is stood in for by an empty
    /// in-memory store, so every migration reports as pending.
    pub fn open_existing(config: Config) -> Result<Self> {
        let store = if config.database_path.exists() {
            DuckDbStore::open(&config.database_path)?
        } else {
            DuckDbStore::open_in_memory()?
        };
        Ok(Self::with_store(config, Arc::new(store)))
    }

    fn with_store(config: Config, store: Arc<DuckDbStore>) -> Self {
        let source = MigrationSource::new(&config.migrations_dir);
        let shared = Arc::clone(&store) as Arc<dyn MigrationStore>;

        let runner = MigrationRunner::with_options(
            Arc::clone(&shared),
            source.clone(),
            config.run_options(),
        );
        let status_service = StatusService::new(shared, source);

        Self {
            config,
            store,
            runner,
            status_service,
        }
    }
}
