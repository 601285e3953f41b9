//! Status service - which migrations are applied and which are pending

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::MigrationName;
use crate::ports::MigrationStore;
use crate::services::ledger::Ledger;
use crate::services::source::MigrationSource;

/// Read-only status reporter. Never writes to the store or the disk.
pub struct StatusService {
    ledger: Ledger,
    source: MigrationSource,
}

impl StatusService {
    pub fn new(store: Arc<dyn MigrationStore>, source: MigrationSource) -> Self {
        Self {
            ledger: Ledger::new(store),
            source,
        }
    }

    /// Cross-reference the catalog with the ledger
    ///
    /// A store without a ledger table reports everything as pending.
    pub fn get_status(&self) -> Result<StatusReport> {
        let ledger_present = self.ledger.exists()?;
        let entries = if ledger_present {
            self.ledger.entries()?
        } else {
            Vec::new()
        };
        let catalog = self.source.list_existing()?;

        let mut executed_at: HashMap<String, Option<NaiveDateTime>> = entries
            .into_iter()
            .map(|e| (e.name, e.executed_at))
            .collect();

        let migrations: Vec<MigrationStatus> = catalog
            .into_iter()
            .map(|file| {
                let state = match executed_at.remove(file.name.as_str()) {
                    Some(at) => MigrationState::Executed { executed_at: at },
                    None => MigrationState::Pending,
                };
                MigrationStatus {
                    name: file.name,
                    state,
                }
            })
            .collect();

        let executed = migrations.iter().filter(|m| m.is_executed()).count();
        let mut orphaned: Vec<String> = executed_at.into_keys().collect();
        orphaned.sort();

        Ok(StatusReport {
            total: migrations.len(),
            executed,
            pending: migrations.len() - executed,
            ledger_present,
            migrations,
            orphaned,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    Executed { executed_at: Option<NaiveDateTime> },
    Pending,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub name: MigrationName,
    #[serde(flatten)]
    pub state: MigrationState,
}

impl MigrationStatus {
    pub fn is_executed(&self) -> bool {
        matches!(self.state, MigrationState::Executed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Every file in the catalog, ascending by name
    pub migrations: Vec<MigrationStatus>,
    pub total: usize,
    pub executed: usize,
    pub pending: usize,
    /// Whether the `_migrations` table exists yet
    pub ledger_present: bool,
    /// Ledger names with no file on disk; not part of `total`
    pub orphaned: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbStore;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_status_without_ledger_or_directory() {
        let dir = tempdir().unwrap();
        let migrations_dir = dir.path().join("migrations");
        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        let service = StatusService::new(
            Arc::clone(&store) as Arc<dyn MigrationStore>,
            MigrationSource::new(&migrations_dir),
        );

        let report = service.get_status().unwrap();

        assert_eq!(report.total, 0);
        assert!(!report.ledger_present);
        assert!(!store.ledger_exists().unwrap());
        assert!(!migrations_dir.exists());
    }

    #[test]
    fn test_orphaned_ledger_names_are_listed_separately() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("20250101000000_a.sql"), "SELECT 1;").unwrap();
        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        store.create_ledger().unwrap();
        store.insert_ledger_entry("20250101000000_a.sql").unwrap();
        store.insert_ledger_entry("20240101000000_deleted.sql").unwrap();

        let report = StatusService::new(store, MigrationSource::new(dir.path()))
            .get_status()
            .unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.executed, 1);
        assert_eq!(report.pending, 0);
        assert_eq!(report.orphaned, vec!["20240101000000_deleted.sql"]);
    }

    #[test]
    fn test_json_shape() {
        let status = MigrationStatus {
            name: MigrationName::parse("20250101000000_a.sql").unwrap(),
            state: MigrationState::Pending,
        };

        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["name"], "20250101000000_a.sql");
        assert_eq!(json["state"], "pending");
    }
}
