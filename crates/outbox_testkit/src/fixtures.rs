//! Store and coordinator fixtures.

use outbox_core::{DeadLetterStore, LogDeadLetterStore, LogQueueStore, OutboxDir, QueueStore};
use outbox_storage::{FaultSwitch, InMemoryBackend};
use outbox_sync_engine::{SubmitterRegistry, SyncConfig, SyncCoordinator, Submitter};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// In-memory queue and dead-letter stores with fault switches.
pub struct MemoryFixture {
    /// Primary queue.
    pub queue: Arc<LogQueueStore>,
    /// Dead-letter store.
    pub dead_letters: Arc<LogDeadLetterStore>,
    queue_backend: InMemoryBackend,
    dead_letter_backend: InMemoryBackend,
}

impl MemoryFixture {
    /// Creates empty stores.
    pub fn new() -> Self {
        let queue_backend = InMemoryBackend::new();
        let dead_letter_backend = InMemoryBackend::new();
        Self {
            queue: Arc::new(
                LogQueueStore::open(Box::new(queue_backend.reopen()))
                    .expect("empty queue log opens"),
            ),
            dead_letters: Arc::new(
                LogDeadLetterStore::open(Box::new(dead_letter_backend.reopen()))
                    .expect("empty dead-letter log opens"),
            ),
            queue_backend,
            dead_letter_backend,
        }
    }

    /// Makes queue writes fail while set.
    pub fn queue_faults(&self) -> FaultSwitch {
        self.queue_backend.fault_switch()
    }

    /// Makes dead-letter writes fail while set.
    pub fn dead_letter_faults(&self) -> FaultSwitch {
        self.dead_letter_backend.fault_switch()
    }

    /// Simulates a restart: fresh stores replayed from the same bytes.
    pub fn restart(&self) -> Self {
        let queue_backend = self.queue_backend.reopen();
        let dead_letter_backend = self.dead_letter_backend.reopen();
        Self {
            queue: Arc::new(
                LogQueueStore::open(Box::new(queue_backend.reopen())).expect("queue log replays"),
            ),
            dead_letters: Arc::new(
                LogDeadLetterStore::open(Box::new(dead_letter_backend.reopen()))
                    .expect("dead-letter log replays"),
            ),
            queue_backend,
            dead_letter_backend,
        }
    }

    /// Builds a coordinator over these stores.
    pub fn coordinator(&self, config: SyncConfig, submitters: SubmitterRegistry) -> SyncCoordinator {
        let queue: Arc<dyn QueueStore> = self.queue.clone();
        let dead_letters: Arc<dyn DeadLetterStore> = self.dead_letters.clone();
        SyncCoordinator::new(config, queue, dead_letters, submitters)
            .expect("valid sync configuration")
    }
}

impl Default for MemoryFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary outbox directory, deleted on drop.
pub struct TempOutboxDir {
    temp_dir: TempDir,
}

impl TempOutboxDir {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path of the outbox directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Locks the directory and returns it.
    pub fn open(&self) -> OutboxDir {
        OutboxDir::open(self.path(), true).expect("Failed to open outbox directory")
    }
}

impl Default for TempOutboxDir {
    fn default() -> Self {
        Self::new()
    }
}

/// A registry with one submitter.
pub fn registry_for(entity_type: &str, submitter: Arc<dyn Submitter>) -> SubmitterRegistry {
    SubmitterRegistry::new().with(entity_type, submitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_sees_written_entries() {
        use outbox_core::{Operation, OperationDraft};

        let fixture = MemoryFixture::new();
        let op = Operation::from_draft(
            OperationDraft::create("incident", serde_json::json!({ "id": 1 })),
            Default::default(),
        )
        .unwrap();
        fixture.queue.put(&op).unwrap();

        let restarted = fixture.restart();
        assert_eq!(restarted.queue.get_all().unwrap(), vec![op]);
    }

    #[test]
    fn temp_dir_opens() {
        let dir = TempOutboxDir::new();
        let outbox = dir.open();
        assert_eq!(outbox.path(), dir.path());
    }
}
