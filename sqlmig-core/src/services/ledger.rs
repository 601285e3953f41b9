//! Ledger - record of fully applied migrations
//!
//! Thin layer over the store's `_migrations` table. The execution engine is
//! its only writer.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{LedgerEntry, MigrationName};
use crate::ports::MigrationStore;

/// Ledger of applied migrations inside the target store
pub struct Ledger {
    store: Arc<dyn MigrationStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn MigrationStore>) -> Self {
        Self { store }
    }

    /// Create the ledger table if it does not exist. Safe on every run.
    pub fn ensure_schema(&self) -> Result<()> {
        self.store
            .create_ledger()
            .map_err(|e| Error::SchemaBootstrap(e.to_string()))
    }

    pub fn exists(&self) -> Result<bool> {
        self.store.ledger_exists()
    }

    /// Names of every recorded migration
    pub fn executed_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .ledger_entries()?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    /// Full ledger rows, ascending by name
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        self.store.ledger_entries()
    }

    /// Record `name` as applied. Fails with `DuplicateName` if already present.
    pub fn mark_executed(&self, name: &MigrationName) -> Result<()> {
        self.store.insert_ledger_entry(name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbStore;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(DuckDbStore::open_in_memory().unwrap()))
    }

    fn name(s: &str) -> MigrationName {
        MigrationName::parse(s).unwrap()
    }

    #[test]
    fn test_ensure_schema_twice() {
        let ledger = ledger();

        ledger.ensure_schema().unwrap();
        ledger.ensure_schema().unwrap();

        assert!(ledger.exists().unwrap());
        assert!(ledger.executed_names().unwrap().is_empty());
    }

    #[test]
    fn test_mark_executed_and_names() {
        let ledger = ledger();
        ledger.ensure_schema().unwrap();

        ledger.mark_executed(&name("20250101000000_a.sql")).unwrap();
        ledger.mark_executed(&name("20250102000000_b.sql")).unwrap();

        let names: Vec<String> = ledger.executed_names().unwrap().into_iter().collect();
        assert_eq!(names, vec!["20250101000000_a.sql", "20250102000000_b.sql"]);
    }

    #[test]
    fn test_mark_executed_twice_is_duplicate() {
        let ledger = ledger();
        ledger.ensure_schema().unwrap();
        ledger.mark_executed(&name("20250101000000_a.sql")).unwrap();

        let err = ledger.mark_executed(&name("20250101000000_a.sql")).unwrap_err();

        assert!(matches!(err, Error::DuplicateName(_)));
        assert_eq!(ledger.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_exists_without_table() {
        let ledger = ledger();

        assert!(!ledger.exists().unwrap());
        ledger.ensure_schema().unwrap();
        assert!(ledger.exists().unwrap());
    }
}
