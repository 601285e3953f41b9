//! Create command - write a new migration template

use std::path::Path;

use anyhow::{Context, Result};

use super::{get_logger, load_config, log_command, log_event};
use crate::output;
use sqlmig_core::services::MigrationAuthor;
use sqlmig_core::LogEvent;

pub fn run(project_dir: &Path, words: &[String], json: bool) -> Result<()> {
    let config = load_config(project_dir)?;
    let logger = get_logger(&config);
    log_command(&logger, "create");

    let author = MigrationAuthor::new(&config.migrations_dir);
    let created = author
        .create(words)
        .context("Failed to create migration file")?;

    log_event(
        &logger,
        LogEvent::new("migration_created")
            .with_command("create")
            .with_migration(created.name.as_str()),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
        return Ok(());
    }

    output::success("Migration created");
    println!("  File: {}", created.name);
    println!("  Path: {}", created.path.display());
    println!();
    println!("Edit the file, then run: sqlmig migrate");

    Ok(())
}
