//! Discard command implementation.

use super::{open_outbox, parse_id, CommandResult};
use std::path::Path;

/// Runs the discard command.
pub fn run(path: &Path, id: &str) -> CommandResult<()> {
    let id = parse_id(id)?;
    let outbox = open_outbox(path)?;
    let entry = outbox_core::discard_dead_letter(&outbox.dead_letters, id)?;
    println!(
        "✓ Discarded {} {} ({})",
        entry.operation.kind, entry.operation.entity_type, entry.reason
    );
    Ok(())
}
