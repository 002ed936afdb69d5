//! Error types for the sync engine.

use outbox_core::{OperationId, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while queueing or draining operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The queue or dead-letter store could not persist or read.
    ///
    /// Raised by a drain pass, this aborts the pass.
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// Network or transport failure reported by a submitter.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote system failed (5xx-style).
    #[error("server error: {0}")]
    Server(String),

    /// A submit call did not finish within the configured timeout.
    #[error("submit timed out after {0:?}")]
    Timeout(Duration),

    /// The remote record disagrees with the queued mutation.
    #[error("unresolved conflict for operation {operation}: {}", .conflicts.join("; "))]
    Conflict {
        /// The conflicting operation.
        operation: OperationId,
        /// Conflict descriptions.
        conflicts: Vec<String>,
    },

    /// No submitter is registered for the entity type.
    #[error("unknown entity type `{0}`")]
    UnknownEntity(String),

    /// The remote side refused the operation for good.
    #[error("rejected: {0}")]
    Rejected(String),

    /// No queue or dead-letter entry with this id.
    #[error("no entry with id {0}")]
    NotFound(OperationId),

    /// The operation draft is malformed.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout(_) => true,
            SyncError::Server(_) => true,
            _ => false,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidOperation(message) => Self::InvalidOperation(message),
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}
