//! Status command implementation.

use super::{open_outbox, CommandResult, Format};
use outbox_core::{DeadLetterStore, QueueStore};
use serde::Serialize;
use std::path::Path;

/// Summary of an outbox directory.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Outbox directory.
    pub path: String,
    /// Queued operations.
    pub pending: usize,
    /// Queued operations currently waiting out a retry delay.
    pub backing_off: usize,
    /// Dead-lettered operations.
    pub dead_letters: usize,
    /// Queue log size in bytes.
    pub queue_bytes: u64,
    /// Queue bytes a compaction would reclaim.
    pub queue_stale_bytes: u64,
    /// Dead-letter log size in bytes.
    pub dead_letter_bytes: u64,
    /// Dead-letter bytes a compaction would reclaim.
    pub dead_letter_stale_bytes: u64,
}

/// Collects the status of the outbox at `path`.
pub fn collect(path: &Path) -> CommandResult<StatusReport> {
    let outbox = open_outbox(path)?;
    let now = chrono::Utc::now();
    let backing_off = outbox
        .queue
        .get_all()?
        .iter()
        .filter(|op| !op.is_due(now))
        .count();

    Ok(StatusReport {
        path: outbox.dir.path().display().to_string(),
        pending: outbox.queue.len(),
        backing_off,
        dead_letters: outbox.dead_letters.len(),
        queue_bytes: outbox.queue.size()?,
        queue_stale_bytes: outbox.queue.stale_bytes(),
        dead_letter_bytes: outbox.dead_letters.size()?,
        dead_letter_stale_bytes: outbox.dead_letters.stale_bytes(),
    })
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let format = Format::parse(format)?;
    let report = collect(path)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("Outbox: {}", report.path);
            println!();
            println!("  Pending:       {}", report.pending);
            println!("  Backing off:   {}", report.backing_off);
            println!("  Dead letters:  {}", report.dead_letters);
            println!();
            println!(
                "  Queue log:       {} bytes ({} stale)",
                report.queue_bytes, report.queue_stale_bytes
            );
            println!(
                "  Dead-letter log: {} bytes ({} stale)",
                report.dead_letter_bytes, report.dead_letter_stale_bytes
            );
        }
    }
    Ok(())
}
