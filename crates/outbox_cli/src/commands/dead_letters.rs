//! Dead-letters command implementation.

use super::{open_outbox, CommandResult, Format};
use outbox_core::{DeadLetterEntry, DeadLetterStore};
use std::path::Path;

/// Runs the dead-letters command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let format = Format::parse(format)?;
    let outbox = open_outbox(path)?;
    let entries = outbox.dead_letters.get_all()?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        Format::Text => {
            if entries.is_empty() {
                println!("No dead letters");
                return Ok(());
            }
            for entry in &entries {
                print_entry(entry);
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &DeadLetterEntry) {
    let op = &entry.operation;
    println!(
        "{} {} {} ({}, {} retries, moved {})",
        op.id,
        op.kind,
        op.entity_type,
        entry.reason,
        op.retry_count,
        entry.moved_at.to_rfc3339()
    );
    if let Some(error) = &entry.last_error {
        println!("    error: {error}");
    }
    for conflict in &entry.conflicts {
        println!("    conflict: {conflict}");
    }
}
