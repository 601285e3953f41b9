//! Authoring - new timestamped migration files

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::migration::TIMESTAMP_FORMAT;
use crate::domain::result::{Error, Result};
use crate::domain::MigrationName;

/// Slug used when no words are given
const DEFAULT_SLUG: &str = "migration";

/// A freshly written migration file
#[derive(Debug, Clone, Serialize)]
pub struct CreatedMigration {
    pub name: MigrationName,
    pub path: PathBuf,
}

/// Turn CLI words into a file-name slug
///
/// Words are joined with `_` and lower-cased; anything outside `[a-z0-9_]`
/// becomes `_`.
pub fn slugify<S: AsRef<str>>(words: &[S]) -> String {
    let joined = words
        .iter()
        .map(|w| w.as_ref())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();

    let slug: String = joined
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

/// Template body for a new migration. Every line is a comment, so an
/// unedited file contains no statements.
fn template(slug: &str, now: DateTime<Utc>) -> String {
    format!(
        "\
-- =============================================================
-- MIGRATION: {slug}
-- Date: {date}
-- Description: [describe the change here]
-- =============================================================
-- Statements are separated by `;`. Lines starting with `--` are ignored.
-- Do not put `;` or `--` inside string literals.

-- ==================== YOUR CHANGES HERE ====================

-- Example: add a column
-- ALTER TABLE table_name ADD COLUMN new_column VARCHAR;

-- Example: create an index
-- CREATE INDEX idx_name ON table_name (column_name);

-- Example: create a table
-- CREATE TABLE IF NOT EXISTS new_table (
--   id INTEGER PRIMARY KEY,
--   field VARCHAR NOT NULL
-- );

-- ==================== END OF CHANGES ====================
",
        date = now.format("%Y-%m-%d"),
    )
}

/// Writes new migration templates into the migrations directory
pub struct MigrationAuthor {
    dir: PathBuf,
}

impl MigrationAuthor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create `<timestamp>_<slug>.sql` stamped with the current UTC time
    pub fn create<S: AsRef<str>>(&self, words: &[S]) -> Result<CreatedMigration> {
        self.create_at(words, Utc::now())
    }

    /// Create a migration stamped with `now`
    ///
    /// Never overwrites: a name collision (two creates within the same
    /// second) is a filesystem error.
    pub fn create_at<S: AsRef<str>>(
        &self,
        words: &[S],
        now: DateTime<Utc>,
    ) -> Result<CreatedMigration> {
        let slug = slugify(words);
        let name = MigrationName::parse(format!("{}_{}.sql", now.format(TIMESTAMP_FORMAT), slug))?;
        let path = self.dir.join(name.as_str());

        fs::create_dir_all(&self.dir).map_err(|e| Error::filesystem(&self.dir, e))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::filesystem(&path, e))?;
        file.write_all(template(&slug, now).as_bytes())
            .map_err(|e| Error::filesystem(&path, e))?;

        Ok(CreatedMigration { name, path })
    }
}
