//! Migration domain model

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// Length of the `YYYYMMDDHHmmss` prefix
pub const TIMESTAMP_LEN: usize = 14;

/// chrono format of the timestamp prefix
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only: `\d` would also accept other Unicode digits
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{14}_[a-z0-9_]+\.sql$").unwrap())
}

/// Validated migration file name, e.g. `20250101093000_add_users.sql`
///
/// Ordering is plain string ordering, which matches creation order because
/// the timestamp prefix is fixed-width and zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MigrationName(String);

impl MigrationName {
    /// Validate a file name against `^\d{14}_[a-z0-9_]+\.sql$`
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name_pattern().is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::InvalidMigrationName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYYMMDDHHmmss` prefix
    pub fn timestamp(&self) -> &str {
        &self.0[..TIMESTAMP_LEN]
    }

    /// The part between the timestamp and `.sql`
    pub fn slug(&self) -> &str {
        &self.0[TIMESTAMP_LEN + 1..self.0.len() - ".sql".len()]
    }

    /// Creation time encoded in the prefix.
    ///
    /// The pattern only checks for 14 digits, so an impossible date such as
    /// month 13 yields `None` while the name itself stays valid.
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.timestamp(), TIMESTAMP_FORMAT).ok()
    }
}

impl fmt::Display for MigrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MigrationName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<MigrationName> for String {
    fn from(name: MigrationName) -> Self {
        name.0
    }
}

/// One change-file discovered on disk. Its text is only read on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: MigrationName,
    pub path: PathBuf,
}

impl MigrationFile {
    pub fn new(name: MigrationName, path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file contents
    pub fn read_text(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| Error::filesystem(&self.path, e))
    }
}
