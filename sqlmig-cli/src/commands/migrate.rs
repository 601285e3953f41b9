//! Migrate command - apply pending migrations

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::{get_context, get_logger, load_config, log_command, log_event};
use crate::output;
use sqlmig_core::ports::MigrationStore;
use sqlmig_core::services::{AppliedMigration, RunListener};
use sqlmig_core::{Error, LogEvent, LoggingService, MigrationFile};

/// Prints progress and mirrors it into the event log
struct ConsoleListener<'a> {
    logger: &'a Option<LoggingService>,
    quiet: bool,
}

impl RunListener for ConsoleListener<'_> {
    fn pending_found(&mut self, pending: &[MigrationFile]) {
        if self.quiet || pending.is_empty() {
            return;
        }
        output::info(&format!(
            "Found {} pending {}",
            pending.len(),
            output::migrations_word(pending.len())
        ));
        println!();
    }

    fn migration_started(&mut self, migration: &MigrationFile, _statements: usize) {
        if !self.quiet {
            println!("▶ Running: {}", migration.name.as_str().bold());
        }
    }

    fn runs_unwrapped(&mut self, migration: &MigrationFile) {
        log_event(
            self.logger,
            LogEvent::new("migration_unwrapped")
                .with_command("migrate")
                .with_migration(migration.name.as_str()),
        );

        if !self.quiet {
            output::warning("  ! Manages its own transactions; statements auto-commit");
        }
    }

    fn migration_applied(&mut self, applied: &AppliedMigration) {
        log_event(
            self.logger,
            LogEvent::new("migration_applied")
                .with_command("migrate")
                .with_migration(applied.name.as_str())
                .with_statements(applied.statements),
        );

        if self.quiet {
            return;
        }
        if applied.statements == 0 {
            output::warning("  ✓ Completed (0 statements; file only has comments)");
        } else {
            output::success(&format!("  ✓ Completed ({} statements)", applied.statements));
        }
    }

    fn migration_failed(&mut self, migration: &MigrationFile, error: &Error) {
        let mut event = LogEvent::new("migration_failed")
            .with_command("migrate")
            .with_migration(migration.name.as_str())
            .with_error(error.to_string());
        if let Error::StatementExecution {
            statement_index,
            statement_count,
            ..
        } = error
        {
            let details = format!("statement {} of {}", statement_index, statement_count);
            event = event.with_error_details(details);
        }
        log_event(self.logger, event);

        if !self.quiet {
            output::error(&format!("  ✗ Failed ({})", migration.path().display()));
        }
    }

    fn rollback_failed(&mut self, migration: &MigrationFile, error: &Error) {
        log_event(
            self.logger,
            LogEvent::new("rollback_failed")
                .with_command("migrate")
                .with_migration(migration.name.as_str())
                .with_error(error.to_string()),
        );

        if !self.quiet {
            output::error(&format!("  ✗ Rollback failed: {}", error));
        }
    }
}

pub fn run(project_dir: &Path, no_transaction: bool, json: bool) -> Result<()> {
    let mut config = load_config(project_dir)?;
    if no_transaction {
        config.transactional = false;
    }

    let logger = get_logger(&config);
    log_command(&logger, "migrate");

    let ctx = get_context(config)?;
    if !json {
        let mode = if ctx.runner.options().transactional {
            "one transaction per migration"
        } else {
            "auto-commit"
        };
        output::info(&format!("Database: {} ({})", ctx.store.location(), mode));
    }

    let mut listener = ConsoleListener {
        logger: &logger,
        quiet: json,
    };
    let report = match ctx.runner.run_with(&mut listener) {
        Ok(report) => report,
        Err(e) => {
            let mut event = LogEvent::new("run_failed")
                .with_command("migrate")
                .with_error(e.to_string());
            if let Some(name) = e.migration_name() {
                event = event.with_migration(name);
            }
            log_event(&logger, event);
            return Err(e.into());
        }
    };

    log_event(
        &logger,
        LogEvent::new("run_completed")
            .with_command("migrate")
            .with_statements(report.applied.iter().map(|a| a.statements).sum()),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.count() == 0 {
        println!("No pending migrations.");
        return Ok(());
    }

    println!();
    output::success(&format!(
        "Applied {} {}",
        report.count(),
        output::migrations_word(report.count())
    ));

    Ok(())
}
