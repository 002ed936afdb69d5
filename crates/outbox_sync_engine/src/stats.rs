//! Coordinator state and statistics.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// The coordinator's drain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No drain pass is running.
    Idle,
    /// A drain pass is in progress.
    Draining,
}

impl SyncState {
    /// Returns true while a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Draining)
    }
}

/// What one drain pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Entries in the snapshot taken at pass start.
    pub snapshot: usize,
    /// Submit calls made, including resubmits after a conflict.
    pub attempts: u64,
    /// Entries applied remotely and removed from the queue.
    pub resolved: u64,
    /// Entries left queued after a retryable failure.
    pub retried: u64,
    /// Entries skipped: backoff not elapsed, or held behind an earlier
    /// entry for the same record.
    pub deferred: u64,
    /// Entries moved to the dead-letter store.
    pub dead_lettered: u64,
    /// Conflict signals received.
    pub conflicts: u64,
    /// Wall time of the pass.
    pub duration: Duration,
}

/// Result of asking for a drain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was already running; nothing was done.
    Skipped,
    /// A pass ran over its snapshot.
    Completed(PassReport),
}

impl PassOutcome {
    /// The report, if a pass ran.
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            Self::Skipped => None,
            Self::Completed(report) => Some(report),
        }
    }
}

/// Running totals across passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to completion.
    pub passes_completed: u64,
    /// Passes aborted by a store failure.
    pub passes_failed: u64,
    /// Triggers ignored because a pass was running.
    pub passes_skipped: u64,
    /// Total submit calls.
    pub attempts: u64,
    /// Total entries resolved.
    pub resolved: u64,
    /// Total retryable failures.
    pub retried: u64,
    /// Total entries dead-lettered.
    pub dead_lettered: u64,
    /// Total conflict signals.
    pub conflicts: u64,
    /// End of the last completed pass.
    pub last_pass_at: Option<DateTime<Utc>>,
    /// Last pass-aborting error.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record_pass(&mut self, report: &PassReport) {
        self.passes_completed += 1;
        self.attempts += report.attempts;
        self.resolved += report.resolved;
        self.retried += report.retried;
        self.dead_lettered += report.dead_lettered;
        self.conflicts += report.conflicts;
        self.last_pass_at = Some(Utc::now());
        self.last_error = None;
    }
}
