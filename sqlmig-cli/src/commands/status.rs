//! Status command - show executed and pending migrations

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::{get_existing_context, get_existing_logger, load_config, log_command};
use crate::output;
use sqlmig_core::services::MigrationState;

pub fn run(project_dir: &Path, json: bool) -> Result<()> {
    let config = load_config(project_dir)?;
    let logger = get_existing_logger(&config);
    log_command(&logger, "status");

    let ctx = get_existing_context(config)?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Migration Status".bold());
    println!();

    if status.migrations.is_empty() {
        println!("No migration files found.");
    } else {
        let mut table = output::create_table();
        table.set_header(vec!["Status", "Migration", "Created", "Executed At"]);

        for migration in &status.migrations {
            let (marker, executed_at) = match &migration.state {
                MigrationState::Executed { executed_at } => (
                    "✓ executed".green().to_string(),
                    executed_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_default(),
                ),
                MigrationState::Pending => ("○ pending".yellow().to_string(), String::new()),
            };
            let created = migration
                .name
                .created_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            table.add_row(vec![marker, migration.name.to_string(), created, executed_at]);
        }

        println!("{}", table);
    }

    println!();
    println!(
        "Total: {} | Executed: {} | Pending: {}",
        status.total, status.executed, status.pending
    );

    if !status.ledger_present {
        output::info("The ledger has not been created yet; `sqlmig migrate` will create it.");
    }

    if !status.orphaned.is_empty() {
        println!();
        output::warning("Recorded in the ledger but missing on disk:");
        for name in &status.orphaned {
            println!("  • {}", name);
        }
    }

    Ok(())
}
