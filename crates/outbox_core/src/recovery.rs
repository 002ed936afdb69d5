//! Start-up repair of the queue after a crash.

use crate::error::StoreResult;
use crate::store::{DeadLetterStore, QueueStore};
use tracing::info;

/// What start-up recovery changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// `IN_FLIGHT` entries put back to `PENDING`.
    pub requeued: usize,
    /// Queue entries dropped because they were already dead-lettered.
    pub dropped_duplicates: usize,
}

impl RecoveryReport {
    /// Returns true if recovery changed nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Repairs the queue left behind by a crash.
///
/// Entries left `IN_FLIGHT` go back to `PENDING`. Entries whose id is
/// already in the dead-letter store were caught between the dead-letter
/// write and the queue delete of a move, and are dropped from the queue.
///
/// Must not run while a drain pass is processing the same queue.
pub fn recover(
    queue: &dyn QueueStore,
    dead_letters: &dyn DeadLetterStore,
) -> StoreResult<RecoveryReport> {
    let mut report = RecoveryReport::default();
    for mut op in queue.get_all()? {
        if dead_letters.contains(op.id) {
            queue.delete(op.id)?;
            report.dropped_duplicates += 1;
        } else if op.recover_in_flight() {
            queue.put(&op)?;
            report.requeued += 1;
        }
    }

    if !report.is_clean() {
        info!(
            requeued = report.requeued,
            dropped_duplicates = report.dropped_duplicates,
            "recovered queue"
        );
    }
    Ok(report)
}
