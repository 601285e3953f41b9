//! CLI command implementations

pub mod create;
pub mod logs;
pub mod migrate;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlmig_core::config::Config;
use sqlmig_core::{LogEvent, LoggingService, MigrationContext};

/// Resolve the project directory: `--dir` / `SQLMIG_DIR`, else the current directory
pub fn get_project_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

/// Load sqlmig.json and environment overrides for the project
pub fn load_config(project_dir: &Path) -> Result<Config> {
    Config::load(project_dir)
        .with_context(|| format!("Failed to load configuration from {}", project_dir.display()))
}

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(config: &Config) -> Option<LoggingService> {
    LoggingService::new(&config.state_dir, env!("CARGO_PKG_VERSION")).ok()
}

/// Like `get_logger`, but never creates the log database
pub fn get_existing_logger(config: &Config) -> Option<LoggingService> {
    LoggingService::open_existing(&config.state_dir, env!("CARGO_PKG_VERSION"))
        .ok()
        .flatten()
}

/// Record that `command` ran, ignoring any errors
pub fn log_command(logger: &Option<LoggingService>, command: &str) {
    if let Some(l) = logger {
        let _ = l.log_command(command);
    }
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Open the project's database, creating it if needed
pub fn get_context(config: Config) -> Result<MigrationContext> {
    let db_path = config.database_path.clone();
    MigrationContext::from_config(config)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

/// Open the project's database for reading; a missing file is not created
pub fn get_existing_context(config: Config) -> Result<MigrationContext> {
    let db_path = config.database_path.clone();
    MigrationContext::open_existing(config)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}
