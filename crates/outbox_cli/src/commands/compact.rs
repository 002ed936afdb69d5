//! Compact command implementation.

use super::{open_outbox, CommandResult};
use outbox_core::CompactionStats;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> CommandResult<()> {
    let outbox = open_outbox(path)?;

    println!("Compacting logs at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
        println!();
        println!(
            "  Queue log:       {} of {} bytes reclaimable",
            outbox.queue.stale_bytes(),
            outbox.queue.size()?
        );
        println!(
            "  Dead-letter log: {} of {} bytes reclaimable",
            outbox.dead_letters.stale_bytes(),
            outbox.dead_letters.size()?
        );
        return Ok(());
    }
    println!();

    if outbox.queue.stale_bytes() == 0 && outbox.dead_letters.stale_bytes() == 0 {
        println!("No compaction needed - logs hold no stale records");
        return Ok(());
    }

    print_stats("Queue log", &outbox.queue.compact()?);
    print_stats("Dead-letter log", &outbox.dead_letters.compact()?);
    println!();
    println!("✓ Compaction complete");
    Ok(())
}

fn print_stats(name: &str, stats: &CompactionStats) {
    println!(
        "  {name}: {} -> {} bytes, {} entries ({} reclaimed)",
        stats.bytes_before,
        stats.bytes_after,
        stats.entries,
        stats.reclaimed()
    );
}
