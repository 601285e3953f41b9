//! Configuration management
//!
//! Optional `sqlmig.json` in the project directory:
//! ```json
//! {
//!   "database": "app.duckdb",
//!   "migrationsDir": "migrations",
//!   "stateDir": ".sqlmig",
//!   "transactional": true,
//!   "lock": true
//! }
//! ```
//! Every key is optional. `SQLMIG_DATABASE`, `SQLMIG_MIGRATIONS_DIR` and
//! `SQLMIG_TRANSACTIONAL` override the file. Relative paths resolve against
//! the project directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::services::RunOptions;

/// Settings file name inside the project directory
pub const SETTINGS_FILENAME: &str = "sqlmig.json";

/// Lock file name inside the state directory
pub const LOCK_FILENAME: &str = "migrate.lock";

const DEFAULT_DATABASE: &str = "sqlmig.duckdb";
const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
const DEFAULT_STATE_DIR: &str = ".sqlmig";

/// Raw sqlmig.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    migrations_dir: Option<String>,
    #[serde(default)]
    state_dir: Option<String>,
    #[serde(default)]
    transactional: Option<bool>,
    #[serde(default)]
    lock: Option<bool>,
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub project_dir: PathBuf,
    /// DuckDB file the migrations are applied to
    pub database_path: PathBuf,
    pub migrations_dir: PathBuf,
    /// Holds the run lock and the event log
    pub state_dir: PathBuf,
    pub transactional: bool,
    pub lock: bool,
}

impl Config {
    /// Load config for `project_dir` from sqlmig.json and the environment
    pub fn load(project_dir: &Path) -> Result<Self> {
        Self::load_with_env(project_dir, |key| std::env::var(key).ok())
    }

    /// Same as `load`, with the environment lookup supplied by the caller
    pub fn load_with_env(
        project_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let settings_path = project_dir.join(SETTINGS_FILENAME);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .map_err(|e| Error::filesystem(&settings_path, e))?;
            serde_json::from_str(&content).map_err(|e| {
                Error::config(format!("invalid {}: {}", settings_path.display(), e))
            })?
        } else {
            SettingsFile::default()
        };

        let database = env("SQLMIG_DATABASE")
            .or(raw.database)
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let migrations_dir = env("SQLMIG_MIGRATIONS_DIR")
            .or(raw.migrations_dir)
            .unwrap_or_else(|| DEFAULT_MIGRATIONS_DIR.to_string());
        let state_dir = raw
            .state_dir
            .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string());

        let transactional = match env("SQLMIG_TRANSACTIONAL") {
            Some(value) => parse_bool("SQLMIG_TRANSACTIONAL", &value)?,
            None => raw.transactional.unwrap_or(true),
        };

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            database_path: project_dir.join(database),
            migrations_dir: project_dir.join(migrations_dir),
            state_dir: project_dir.join(state_dir),
            transactional,
            lock: raw.lock.unwrap_or(true),
        })
    }

    /// Path of the run lock file
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILENAME)
    }

    /// Runner options implied by this config
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            transactional: self.transactional,
            lock_path: self.lock.then(|| self.lock_path()),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Ok(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Ok(false),
        other => Err(Error::config(format!(
            "{} must be true or false, got {:?}",
            key, other
        ))),
    }
}
