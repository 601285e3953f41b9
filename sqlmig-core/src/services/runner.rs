//! Migration runner - applies pending migrations in order
//!
//! A run:
//! 1. pings the store (nothing is touched if it is unreachable)
//! 2. takes the run lock, when configured
//! 3. ensures the `_migrations` ledger exists
//! 4. computes pending = catalog - ledger, ascending by name
//! 5. applies each pending migration statement by statement, recording it
//!    in the ledger only after every statement succeeded
//!
//! The first failing statement stops the whole run. Later migrations may
//! depend on the failed one, so they are never attempted.
//!
//! A migration that issues its own `BEGIN`/`COMMIT`/`ROLLBACK` always runs
//! statement by statement, even in transactional mode.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{MigrationFile, MigrationName};
use crate::ports::MigrationStore;
use crate::services::ledger::Ledger;
use crate::services::lock::RunLock;
use crate::services::source::MigrationSource;
use crate::services::splitter::{is_transaction_control, split_statements};

/// Knobs for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Wrap each migration (statements plus ledger insert) in one transaction
    /// when the store can roll back DDL. Without it statements auto-commit
    /// one by one and a failed migration may be left half applied.
    pub transactional: bool,
    /// Lock file to hold for the duration of the run. Guards separate
    /// processes; runners sharing one store in-process are serialised by
    /// the store's run gate either way.
    pub lock_path: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            transactional: true,
            lock_path: None,
        }
    }
}

/// A migration that made it into the ledger during this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub name: MigrationName,
    pub statements: usize,
}

/// Result of running migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Newly applied migrations, in application order
    pub applied: Vec<AppliedMigration>,
    /// Catalog entries that were already in the ledger
    pub already_applied: usize,
}

impl RunReport {
    /// Number of migrations applied by this run
    pub fn count(&self) -> usize {
        self.applied.len()
    }
}

/// Progress callbacks. All methods default to doing nothing.
pub trait RunListener {
    fn pending_found(&mut self, _pending: &[MigrationFile]) {}

    fn migration_started(&mut self, _migration: &MigrationFile, _statements: usize) {}

    /// The migration controls its own transactions, so it runs without the
    /// wrapping transaction
    fn runs_unwrapped(&mut self, _migration: &MigrationFile) {}

    fn migration_applied(&mut self, _applied: &AppliedMigration) {}

    fn migration_failed(&mut self, _migration: &MigrationFile, _error: &Error) {}

    /// The transaction of a failed migration could not be rolled back. The
    /// run still returns the original failure.
    fn rollback_failed(&mut self, _migration: &MigrationFile, _error: &Error) {}
}

impl RunListener for () {}

/// Execution engine for pending migrations
pub struct MigrationRunner {
    store: Arc<dyn MigrationStore>,
    ledger: Ledger,
    source: MigrationSource,
    options: RunOptions,
}

impl MigrationRunner {
    pub fn new(store: Arc<dyn MigrationStore>, source: MigrationSource) -> Self {
        Self::with_options(store, source, RunOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn MigrationStore>,
        source: MigrationSource,
        options: RunOptions,
    ) -> Self {
        Self {
            ledger: Ledger::new(Arc::clone(&store)),
            store,
            source,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run all pending migrations
    pub fn run(&self) -> Result<RunReport> {
        self.run_with(&mut ())
    }

    /// Run all pending migrations, reporting progress to `listener`
    pub fn run_with(&self, listener: &mut dyn RunListener) -> Result<RunReport> {
        self.store.ping()?;

        let _lock = match &self.options.lock_path {
            Some(path) => Some(RunLock::acquire(path)?),
            None => None,
        };

        let _gate = self
            .store
            .run_gate()
            .lock()
            .map_err(|e| Error::database(format!("Run gate poisoned: {}", e)))?;

        self.ledger.ensure_schema()?;

        let executed = self.ledger.executed_names()?;
        let catalog = self.source.list()?;
        let already_applied = catalog
            .iter()
            .filter(|m| executed.contains(m.name.as_str()))
            .count();
        let pending: Vec<MigrationFile> = catalog
            .into_iter()
            .filter(|m| !executed.contains(m.name.as_str()))
            .collect();

        listener.pending_found(&pending);

        let mut report = RunReport {
            applied: Vec::with_capacity(pending.len()),
            already_applied,
        };

        for migration in &pending {
            match self.apply(migration, listener) {
                Ok(applied) => {
                    listener.migration_applied(&applied);
                    report.applied.push(applied);
                }
                Err(e) => {
                    listener.migration_failed(migration, &e);
                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    fn apply(
        &self,
        migration: &MigrationFile,
        listener: &mut dyn RunListener,
    ) -> Result<AppliedMigration> {
        let text = migration.read_text()?;
        let statements = split_statements(&text);

        listener.migration_started(migration, statements.len());

        let own_transactions = statements.iter().any(|s| is_transaction_control(s));
        let mut transactional =
            self.options.transactional && self.store.supports_transactional_ddl();
        if transactional && own_transactions {
            listener.runs_unwrapped(migration);
            transactional = false;
        }
        if transactional {
            self.store.begin()?;
        }

        let outcome = self
            .execute_statements(&migration.name, &statements)
            .and_then(|()| self.ledger.mark_executed(&migration.name));

        match outcome {
            Ok(()) => {
                if transactional {
                    self.store.commit()?;
                }
                Ok(AppliedMigration {
                    name: migration.name.clone(),
                    statements: statements.len(),
                })
            }
            Err(e) => {
                if transactional {
                    if let Err(rollback_err) = self.store.rollback() {
                        listener.rollback_failed(migration, &rollback_err);
                    }
                } else if own_transactions {
                    // Close whatever the migration left open; errors if nothing is
                    let _ = self.store.rollback();
                }
                Err(e)
            }
        }
    }

    fn execute_statements(&self, name: &MigrationName, statements: &[String]) -> Result<()> {
        for (index, statement) in statements.iter().enumerate() {
            self.store
                .execute(statement)
                .map_err(|e| Error::StatementExecution {
                    migration: name.to_string(),
                    statement_index: index + 1,
                    statement_count: statements.len(),
                    message: match e {
                        Error::Database(msg) => msg,
                        other => other.to_string(),
                    },
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbStore;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl RunListener for Recorder {
        fn pending_found(&mut self, pending: &[MigrationFile]) {
            self.events.push(format!("pending {}", pending.len()));
        }

        fn migration_started(&mut self, migration: &MigrationFile, statements: usize) {
            self.events
                .push(format!("start {} ({})", migration.name.slug(), statements));
        }

        fn migration_applied(&mut self, applied: &AppliedMigration) {
            self.events.push(format!("applied {}", applied.name.slug()));
        }

        fn migration_failed(&mut self, migration: &MigrationFile, _error: &Error) {
            self.events.push(format!("failed {}", migration.name.slug()));
        }

        fn runs_unwrapped(&mut self, migration: &MigrationFile) {
            self.events.push(format!("unwrapped {}", migration.name.slug()));
        }

        fn rollback_failed(&mut self, migration: &MigrationFile, _error: &Error) {
            self.events.push(format!("rollback failed {}", migration.name.slug()));
        }
    }

    fn table_exists(store: &DuckDbStore, table: &str) -> bool {
        store.execute(&format!("SELECT * FROM {}", table)).is_ok()
    }

    #[test]
    fn test_fresh_store_applies_everything_then_nothing() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("20250101000000_users.sql"),
            "CREATE TABLE users (id INTEGER);",
        )
        .unwrap();

        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        let runner = MigrationRunner::new(store, MigrationSource::new(dir.path()));

        let first = runner.run().unwrap();
        assert_eq!(first.count(), 1);
        assert_eq!(first.already_applied, 0);

        let second = runner.run().unwrap();
        assert_eq!(second.count(), 0);
        assert_eq!(second.already_applied, 1);
    }

    #[test]
    fn test_listener_sees_progress_and_failure() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("20250101000000_ok.sql"),
            "CREATE TABLE a (id INTEGER);\nINSERT INTO a VALUES (1);",
        )
        .unwrap();
        fs::write(
            dir.path().join("20250102000000_bad.sql"),
            "INSERT INTO missing_table VALUES (1);",
        )
        .unwrap();

        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        let runner = MigrationRunner::new(store, MigrationSource::new(dir.path()));
        let mut recorder = Recorder::default();

        let err = runner.run_with(&mut recorder).unwrap_err();

        assert_eq!(err.migration_name(), Some("20250102000000_bad.sql"));
        assert_eq!(
            recorder.events,
            vec![
                "pending 2",
                "start ok (2)",
                "applied ok",
                "start bad (1)",
                "failed bad",
            ]
        );
    }

    #[test]
    fn test_comment_only_migration_is_recorded_with_zero_statements() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("20250101000000_placeholder.sql"),
            "-- nothing yet\n",
        )
        .unwrap();

        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        let runner = MigrationRunner::new(store, MigrationSource::new(dir.path()));

        let report = runner.run().unwrap();

        assert_eq!(report.applied[0].statements, 0);
    }

    #[test]
    fn test_migration_with_own_transaction_runs_unwrapped() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("20250101000000_tx.sql"),
            "BEGIN TRANSACTION;\nCREATE TABLE t (id INTEGER);\nCOMMIT;",
        )
        .unwrap();

        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        let runner = MigrationRunner::new(
            Arc::clone(&store) as Arc<dyn MigrationStore>,
            MigrationSource::new(dir.path()),
        );
        let mut recorder = Recorder::default();

        let report = runner.run_with(&mut recorder).unwrap();

        assert_eq!(report.count(), 1);
        assert_eq!(report.applied[0].statements, 3);
        assert!(table_exists(&store, "t"));
        assert_eq!(store.ledger_entries().unwrap().len(), 1);
        assert!(recorder.events.contains(&"unwrapped tx".to_string()));
    }

    #[test]
    fn test_failure_after_inner_commit_keeps_committed_work_and_skips_rollback() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("20250101000000_partial.sql"),
            "BEGIN;\nCREATE TABLE a (id INTEGER);\nCOMMIT;\nCREATE TABLE b (id INTEGER,;",
        )
        .unwrap();

        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        let runner = MigrationRunner::new(
            Arc::clone(&store) as Arc<dyn MigrationStore>,
            MigrationSource::new(dir.path()),
        );
        let mut recorder = Recorder::default();

        let err = runner.run_with(&mut recorder).unwrap_err();

        match err {
            Error::StatementExecution {
                statement_index,
                statement_count,
                ..
            } => {
                assert_eq!(statement_index, 4);
                assert_eq!(statement_count, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(table_exists(&store, "a"), "work committed by the migration stays");
        assert!(store.ledger_entries().unwrap().is_empty());
        assert_eq!(
            recorder.events,
            vec![
                "pending 1",
                "start partial (4)",
                "unwrapped partial",
                "failed partial",
            ]
        );
    }

    #[test]
    fn test_plain_migration_stays_wrapped() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("20250101000000_plain.sql"),
            "CREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER,;",
        )
        .unwrap();

        let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
        let runner = MigrationRunner::new(
            Arc::clone(&store) as Arc<dyn MigrationStore>,
            MigrationSource::new(dir.path()),
        );
        let mut recorder = Recorder::default();

        runner.run_with(&mut recorder).unwrap_err();

        assert!(!table_exists(&store, "a"), "wrapped migration rolls back as a unit");
        assert!(!recorder.events.iter().any(|e| e.starts_with("unwrapped")));
    }
}
