//! Event recording.

use outbox_sync_engine::{Notifier, SyncEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }

    /// Number of `EntryFailed` events.
    pub fn failures(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SyncEvent::EntryFailed { .. }))
            .count()
    }

    /// Number of `Queued` events.
    pub fn queued(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SyncEvent::Queued { .. }))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &SyncEvent) {
        self.events.lock().push(event.clone());
    }
}
