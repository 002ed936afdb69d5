//! # Outbox Core
//!
//! Queue data model and durable stores for the outbox sync engine.
//!
//! This crate provides:
//! - [`Operation`], the unit of queued work, and its lifecycle
//! - [`DeadLetterEntry`] for operations that could not be applied
//! - a checksummed, append-only [`RecordLog`] that replays on open
//! - the [`QueueStore`] and [`DeadLetterStore`] contracts and their
//!   log-backed implementations
//! - [`OutboxDir`], the locked on-disk layout
//! - [`recover`] for crash repair, and dead-letter replay
//!
//! ## Example
//!
//! ```rust
//! use outbox_core::{LogQueueStore, Operation, OperationDraft, QueueStore};
//! use serde_json::json;
//!
//! let queue = LogQueueStore::in_memory();
//! let draft = OperationDraft::create("journalEntry", json!({ "id": "je-1", "amount": 120 }));
//! let op = Operation::from_draft(draft, chrono::Utc::now()).unwrap();
//! queue.put(&op).unwrap();
//! assert_eq!(queue.get_all().unwrap(), vec![op]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dead_letter;
mod dir;
mod error;
mod id;
mod log;
mod operation;
pub mod record;
mod recovery;
mod replay;
mod store;

pub use dead_letter::{DeadLetterEntry, FailureReason};
pub use dir::OutboxDir;
pub use error::{StoreError, StoreResult};
pub use id::OperationId;
pub use log::{CompactionStats, LogEntry, RecordLog};
pub use operation::{Operation, OperationDraft, OperationKind, OperationStatus, RecordKey};
pub use recovery::{recover, RecoveryReport};
pub use replay::{discard_dead_letter, replay_dead_letter};
pub use store::{DeadLetterStore, LogDeadLetterStore, LogQueueStore, LogStore, QueueStore};
