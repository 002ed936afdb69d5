//! Durable queue and dead-letter store contracts.
//!
//! Both stores share one implementation, [`LogStore`], which wraps a
//! [`RecordLog`] in a mutex so enqueuers and the drain worker can use it
//! concurrently through `&self`.

use crate::dead_letter::DeadLetterEntry;
use crate::error::{StoreError, StoreResult};
use crate::id::OperationId;
use crate::log::{CompactionStats, LogEntry, RecordLog};
use crate::operation::Operation;
use outbox_storage::{InMemoryBackend, StorageBackend};
use parking_lot::Mutex;

/// The primary queue of pending operations.
///
/// Every successful `put`/`delete` is durable before it returns.
pub trait QueueStore: Send + Sync {
    /// Inserts or replaces the operation with `entry.id`.
    ///
    /// `RESOLVED` and `FAILED` operations are refused with
    /// [`StoreError::InvalidOperation`].
    fn put(&self, entry: &Operation) -> StoreResult<()>;

    /// Reads one operation.
    fn get(&self, id: OperationId) -> StoreResult<Option<Operation>>;

    /// All operations, oldest enqueue first, as currently persisted.
    fn get_all(&self) -> StoreResult<Vec<Operation>>;

    /// Removes an operation. Deleting an absent id is not an error.
    fn delete(&self, id: OperationId) -> StoreResult<()>;

    /// Number of queued operations.
    fn len(&self) -> usize;

    /// Returns true if nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Terminal storage for operations that could not be applied.
pub trait DeadLetterStore: Send + Sync {
    /// Inserts or replaces the entry keyed by its operation id.
    fn put(&self, entry: &DeadLetterEntry) -> StoreResult<()>;

    /// Reads one entry.
    fn get(&self, id: OperationId) -> StoreResult<Option<DeadLetterEntry>>;

    /// All entries in the order they were moved here.
    fn get_all(&self) -> StoreResult<Vec<DeadLetterEntry>>;

    /// Removes an entry. Deleting an absent id is not an error.
    fn delete(&self, id: OperationId) -> StoreResult<()>;

    /// Returns true if an entry with `id` exists.
    fn contains(&self, id: OperationId) -> bool;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns true if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A store backed by a [`RecordLog`].
pub struct LogStore<T: LogEntry> {
    log: Mutex<RecordLog<T>>,
}

/// Log-backed primary queue.
pub type LogQueueStore = LogStore<Operation>;

/// Log-backed dead-letter store.
pub type LogDeadLetterStore = LogStore<DeadLetterEntry>;

impl<T: LogEntry> LogStore<T> {
    /// Opens a store on `backend`, replaying its contents.
    pub fn open(backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        Ok(Self {
            log: Mutex::new(RecordLog::open(backend)?),
        })
    }

    /// Creates an empty store held in memory.
    pub fn in_memory() -> Self {
        Self {
            log: Mutex::new(
                // An empty backend has nothing to replay.
                RecordLog::open_empty(Box::new(InMemoryBackend::new())),
            ),
        }
    }

    /// Rewrites the underlying log without superseded records.
    pub fn compact(&self) -> StoreResult<CompactionStats> {
        self.log.lock().compact()
    }

    /// Bytes held by superseded or deleted records.
    pub fn stale_bytes(&self) -> u64 {
        self.log.lock().stale_bytes()
    }

    /// Size of the underlying log in bytes.
    pub fn size(&self) -> StoreResult<u64> {
        self.log.lock().size()
    }

    fn put_entry(&self, entry: &T) -> StoreResult<()> {
        self.log.lock().put(entry)
    }

    fn get_entry(&self, id: OperationId) -> StoreResult<Option<T>> {
        self.log.lock().get(id)
    }

    fn all_entries(&self) -> StoreResult<Vec<T>> {
        self.log.lock().values()
    }

    fn delete_entry(&self, id: OperationId) -> StoreResult<()> {
        self.log.lock().delete(id).map(|_| ())
    }

    fn count(&self) -> usize {
        self.log.lock().len()
    }
}

impl<T: LogEntry> std::fmt::Debug for LogStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("log", &*self.log.lock())
            .finish()
    }
}

impl QueueStore for LogStore<Operation> {
    fn put(&self, entry: &Operation) -> StoreResult<()> {
        if entry.status.is_terminal() {
            return Err(StoreError::InvalidOperation(format!(
                "{} operation {} does not belong in the queue",
                entry.status, entry.id
            )));
        }
        self.put_entry(entry)
    }

    fn get(&self, id: OperationId) -> StoreResult<Option<Operation>> {
        self.get_entry(id)
    }

    fn get_all(&self) -> StoreResult<Vec<Operation>> {
        self.all_entries()
    }

    fn delete(&self, id: OperationId) -> StoreResult<()> {
        self.delete_entry(id)
    }

    fn len(&self) -> usize {
        self.count()
    }
}

impl DeadLetterStore for LogStore<DeadLetterEntry> {
    fn put(&self, entry: &DeadLetterEntry) -> StoreResult<()> {
        self.put_entry(entry)
    }

    fn get(&self, id: OperationId) -> StoreResult<Option<DeadLetterEntry>> {
        self.get_entry(id)
    }

    fn get_all(&self) -> StoreResult<Vec<DeadLetterEntry>> {
        self.all_entries()
    }

    fn delete(&self, id: OperationId) -> StoreResult<()> {
        self.delete_entry(id)
    }

    fn contains(&self, id: OperationId) -> bool {
        self.log.lock().contains(id)
    }

    fn len(&self) -> usize {
        self.count()
    }
}
