//! Error types for the queue stores.

use crate::id::OperationId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the durable queue and dead-letter stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] outbox_storage::StorageError),

    /// I/O error outside a backend (directory handling, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record body could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The log is damaged somewhere other than its tail.
    #[error("log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the damaged record.
        offset: u64,
        /// Description of the damage.
        message: String,
    },

    /// Another process holds the outbox directory.
    #[error("outbox directory is locked by another process: {}", .0.display())]
    Locked(PathBuf),

    /// The outbox path is missing or is not a directory.
    #[error("invalid outbox directory {}: {reason}", .path.display())]
    InvalidDirectory {
        /// Offending path.
        path: PathBuf,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// No entry with this id.
    #[error("no entry with id {0}")]
    NotFound(OperationId),

    /// The operation draft is malformed.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    pub(crate) fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }

    pub(crate) fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
