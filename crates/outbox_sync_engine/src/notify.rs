//! Observation hook for UI badges and toasts.
//!
//! The engine works the same with or without a notifier installed.

use crate::stats::PassReport;
use outbox_core::{FailureReason, OperationId};

/// Something the engine did that a UI may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An operation was written to the queue.
    Queued {
        /// Queue entry id.
        operation_id: OperationId,
        /// Target resource type.
        entity_type: String,
    },
    /// A drain pass started.
    SyncStarted {
        /// Entries in the pass snapshot.
        pending: usize,
    },
    /// A drain pass finished.
    SyncCompleted(PassReport),
    /// An operation was moved to the dead-letter store.
    EntryFailed {
        /// Queue entry id.
        operation_id: OperationId,
        /// Target resource type.
        entity_type: String,
        /// Why it failed.
        reason: FailureReason,
        /// Conflict descriptions, empty for non-conflict failures.
        conflicts: Vec<String>,
    },
}

/// Receives [`SyncEvent`]s.
pub trait Notifier: Send + Sync {
    /// Called synchronously from the engine; must not block.
    fn notify(&self, event: &SyncEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &SyncEvent) {}
}

impl<F> Notifier for F
where
    F: Fn(&SyncEvent) + Send + Sync,
{
    fn notify(&self, event: &SyncEvent) {
        self(event)
    }
}
