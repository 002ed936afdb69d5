//! Dead-letter entries.

use crate::id::OperationId;
use crate::operation::{Operation, OperationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an operation left the primary queue without being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Retryable failures exceeded the retry limit.
    RetriesExhausted,
    /// The remote record disagreed and could not be reconciled.
    Conflict,
    /// No submitter is registered for the entity type.
    UnknownEntityType,
    /// The remote side rejected the operation outright.
    Rejected,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::RetriesExhausted => "retries exhausted",
            Self::Conflict => "unresolved conflict",
            Self::UnknownEntityType => "unknown entity type",
            Self::Rejected => "rejected",
        };
        f.write_str(text)
    }
}

/// An operation parked for operator inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// The failed operation, status `FAILED`.
    pub operation: Operation,
    /// Human-readable conflict descriptions, in resolver order. Empty for
    /// transport/server failures.
    pub conflicts: Vec<String>,
    /// When the entry was moved here.
    pub moved_at: DateTime<Utc>,
    /// Why it was moved.
    pub reason: FailureReason,
    /// Message from the last attempt, if any.
    #[serde(default)]
    pub last_error: Option<String>,
}

impl DeadLetterEntry {
    /// Wraps a failed operation.
    pub fn new(
        mut operation: Operation,
        reason: FailureReason,
        conflicts: Vec<String>,
        moved_at: DateTime<Utc>,
    ) -> Self {
        operation.status = OperationStatus::Failed;
        operation.updated_at = moved_at;
        let last_error = operation.last_error.clone();
        Self {
            operation,
            conflicts,
            moved_at,
            reason,
            last_error,
        }
    }

    /// Id of the wrapped operation.
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.operation.id
    }

    /// Builds the queue entry a replay puts back: fresh id, zero retries,
    /// `PENDING`, enqueued now. Payload, kind and base version are kept.
    #[must_use]
    pub fn to_replay(&self, now: DateTime<Utc>) -> Operation {
        Operation {
            id: OperationId::new(),
            entity_type: self.operation.entity_type.clone(),
            kind: self.operation.kind,
            payload: self.operation.payload.clone(),
            local_version: self.operation.local_version,
            enqueued_at: now,
            updated_at: now,
            retry_count: 0,
            status: OperationStatus::Pending,
            next_attempt_at: None,
            last_error: None,
        }
    }
}
