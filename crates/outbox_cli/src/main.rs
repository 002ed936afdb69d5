//! Outbox CLI
//!
//! Inspection and repair tools for an outbox directory. Every command takes
//! the directory lock, so the owning application must be stopped first.
//!
//! # Commands
//!
//! - `status` - Entry counts and log sizes
//! - `list` - Queued operations in drain order
//! - `dead-letters` - Operations that gave up
//! - `replay` - Move a dead letter back into the queue
//! - `discard` - Delete a dead letter
//! - `compact` - Rewrite both logs without superseded records

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Outbox command-line tools.
#[derive(Parser)]
#[command(name = "outbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the outbox directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show entry counts and log sizes
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List queued operations, oldest first
    List {
        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List dead-lettered operations
    DeadLetters {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Move a dead letter back into the queue under a fresh id
    Replay {
        /// Operation id of the dead letter
        id: String,
    },

    /// Delete a dead letter for good
    Discard {
        /// Operation id of the dead letter
        id: String,
    },

    /// Rewrite the logs without superseded records
    Compact {
        /// Only report how much space would be reclaimed
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { format } => {
            let path = cli.path.ok_or("Outbox path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::List { limit, format } => {
            let path = cli.path.ok_or("Outbox path required for list")?;
            commands::list::run(&path, limit, &format)?;
        }
        Commands::DeadLetters { format } => {
            let path = cli.path.ok_or("Outbox path required for dead-letters")?;
            commands::dead_letters::run(&path, &format)?;
        }
        Commands::Replay { id } => {
            let path = cli.path.ok_or("Outbox path required for replay")?;
            commands::replay::run(&path, &id)?;
        }
        Commands::Discard { id } => {
            let path = cli.path.ok_or("Outbox path required for discard")?;
            commands::discard::run(&path, &id)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Outbox path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("Outbox CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Log format v{}", outbox_core::record::LOG_VERSION);
        }
    }

    Ok(())
}
