//! Migration source - the on-disk catalog of change-files

use std::fs;
use std::path::PathBuf;

use crate::domain::result::{Error, Result};
use crate::domain::{MigrationFile, MigrationName};

/// Directory scan producing the ordered migration catalog
///
/// Owns no state besides the directory path; every `list` call rereads it.
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// All migration files, ascending by name
    ///
    /// A missing directory is created and yields an empty catalog. Entries
    /// without a `.sql` extension are ignored; a `.sql` file with a malformed
    /// name fails the whole listing.
    pub fn list(&self) -> Result<Vec<MigrationFile>> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| Error::filesystem(&self.dir, e))?;
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| Error::filesystem(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::filesystem(&self.dir, e))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("sql") || !path.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = MigrationName::parse(file_name)?;
            files.push(MigrationFile::new(name, path));
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Catalog without creating the directory when it is missing
    ///
    /// Used by read-only callers such as the status report.
    pub fn list_existing(&self) -> Result<Vec<MigrationFile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        self.list()
    }
}
