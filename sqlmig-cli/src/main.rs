//! sqlmig CLI - forward-only SQL migrations

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{create, logs, migrate, status};

/// sqlmig - apply hand-written SQL migrations, once each, in order
#[derive(Parser)]
#[command(name = "sqlmig", version, about, long_about = None)]
struct Cli {
    /// Project directory (holds sqlmig.json and migrations/)
    #[arg(long, global = true, env = "SQLMIG_DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new timestamped migration file
    Create {
        /// Words describing the change (joined into the file name)
        words: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run pending migrations
    Migrate {
        /// Let every statement auto-commit instead of wrapping each
        /// migration in a transaction
        #[arg(long)]
        no_transaction: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show executed and pending migrations
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let project_dir = commands::get_project_dir(cli.dir)?;

    match cli.command {
        Commands::Create { words, json } => create::run(&project_dir, &words, json),
        Commands::Migrate { no_transaction, json } => {
            migrate::run(&project_dir, no_transaction, json)
        }
        Commands::Status { json } => status::run(&project_dir, json),
        Commands::Logs { command } => logs::run(&project_dir, command),
    }
}
