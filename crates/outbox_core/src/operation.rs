//! Queued operations.

use crate::error::{StoreError, StoreResult};
use crate::id::OperationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The intended remote effect of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Create a remote record.
    Create,
    /// Patch an existing remote record.
    Update,
    /// Delete a remote record.
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a queued operation.
///
/// ```text
/// PENDING → IN_FLIGHT → RESOLVED
///                     → PENDING   (retry)
///                     → FAILED    (dead-lettered)
/// ```
///
/// `IN_FLIGHT` only exists while a submit call runs. An entry read back as
/// `IN_FLIGHT` after a restart is treated as `PENDING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Waiting for a drain pass.
    Pending,
    /// A submit call is running.
    InFlight,
    /// Applied remotely. Terminal.
    Resolved,
    /// Moved to the dead-letter store. Terminal.
    Failed,
}

impl OperationStatus {
    /// Returns true for `RESOLVED` and `FAILED`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Failed)
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use OperationStatus::{Failed, InFlight, Pending, Resolved};
        matches!(
            (self, next),
            (Pending, InFlight)
                | (Pending, Failed)
                | (InFlight, Resolved)
                | (InFlight, Pending)
                | (InFlight, Failed)
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::InFlight => "IN_FLIGHT",
            Self::Resolved => "RESOLVED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Identity of the logical remote record an operation touches.
///
/// Two operations with the same key must reach the remote side in the
/// order they were enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a caller hands over when it wants a write applied remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDraft {
    /// Remote resource/collection tag, e.g. `"journalEntry"`.
    pub entity_type: String,
    /// Intended remote effect.
    pub kind: OperationKind,
    /// Opaque domain data.
    pub payload: Value,
    /// Version the caller believed was current remotely.
    pub local_version: u64,
}

impl OperationDraft {
    /// Creates a draft.
    pub fn new(
        entity_type: impl Into<String>,
        kind: OperationKind,
        payload: Value,
        local_version: u64,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            kind,
            payload,
            local_version,
        }
    }

    /// A `CREATE` against a record the server has never seen (version 0).
    pub fn create(entity_type: impl Into<String>, payload: Value) -> Self {
        Self::new(entity_type, OperationKind::Create, payload, 0)
    }

    /// An `UPDATE` patch based on `local_version`.
    pub fn update(entity_type: impl Into<String>, payload: Value, local_version: u64) -> Self {
        Self::new(entity_type, OperationKind::Update, payload, local_version)
    }

    /// A `DELETE` of the record identified by `target`.
    pub fn delete(entity_type: impl Into<String>, target: Value, local_version: u64) -> Self {
        Self::new(entity_type, OperationKind::Delete, target, local_version)
    }

    /// Checks the draft before it is queued.
    pub fn validate(&self) -> StoreResult<()> {
        if self.entity_type.trim().is_empty() {
            return Err(StoreError::InvalidOperation(
                "entity type must not be empty".into(),
            ));
        }
        if self.kind == OperationKind::Delete && self.payload.is_null() {
            return Err(StoreError::InvalidOperation(
                "delete needs a target id".into(),
            ));
        }
        Ok(())
    }
}

/// A queued local mutation awaiting remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique id, assigned at enqueue time.
    pub id: OperationId,
    /// Remote resource/collection tag; selects the submitter.
    pub entity_type: String,
    /// Intended remote effect.
    pub kind: OperationKind,
    /// Opaque domain data.
    pub payload: Value,
    /// Remote version the client based this mutation on.
    pub local_version: u64,
    /// First queuing time.
    pub enqueued_at: DateTime<Utc>,
    /// Last processing attempt (or enqueue time before any attempt).
    pub updated_at: DateTime<Utc>,
    /// Number of retryable failures so far.
    pub retry_count: u32,
    /// Lifecycle state.
    pub status: OperationStatus,
    /// Earliest time the next attempt may run; `None` means immediately.
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Message from the most recent failed attempt.
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Operation {
    /// Builds a fresh `PENDING` operation from a draft.
    pub fn from_draft(draft: OperationDraft, now: DateTime<Utc>) -> StoreResult<Self> {
        draft.validate()?;
        Ok(Self {
            id: OperationId::new(),
            entity_type: draft.entity_type,
            kind: draft.kind,
            payload: draft.payload,
            local_version: draft.local_version,
            enqueued_at: now,
            updated_at: now,
            retry_count: 0,
            status: OperationStatus::Pending,
            next_attempt_at: None,
            last_error: None,
        })
    }

    /// Returns the logical remote record this operation touches.
    ///
    /// `entity_type` plus the payload identity: `payload.id` for objects,
    /// the payload itself for bare strings/numbers. Payloads without an
    /// identity get a key unique to this operation.
    #[must_use]
    pub fn record_key(&self) -> RecordKey {
        let identity = match &self.payload {
            Value::Object(map) => map.get("id").and_then(scalar_identity),
            other => scalar_identity(other),
        };
        let identity = identity.unwrap_or_else(|| format!("op:{}", self.id));
        RecordKey(format!("{}/{}", self.entity_type, identity))
    }

    /// Returns true if the backoff window (if any) has elapsed.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }

    /// Marks the start of a submit attempt.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) {
        debug_assert!(
            self.status.can_transition_to(OperationStatus::InFlight),
            "cannot start an attempt from {}",
            self.status
        );
        self.status = OperationStatus::InFlight;
        self.updated_at = now;
    }

    /// Records a retryable failure and puts the entry back to `PENDING`.
    ///
    /// `retry_count` only ever grows.
    pub fn schedule_retry(
        &mut self,
        now: DateTime<Utc>,
        next_attempt_at: Option<DateTime<Utc>>,
        error: impl Into<String>,
    ) {
        debug_assert!(
            self.status.can_transition_to(OperationStatus::Pending),
            "cannot retry from {}",
            self.status
        );
        self.retry_count = self.retry_count.saturating_add(1);
        self.status = OperationStatus::Pending;
        self.updated_at = now;
        self.next_attempt_at = next_attempt_at;
        self.last_error = Some(error.into());
    }

    /// Moves the base version forward after a conflict was judged harmless.
    pub fn rebase(&mut self, remote_version: u64) {
        self.local_version = remote_version;
    }

    /// Resets an entry interrupted mid-submit back to `PENDING`.
    ///
    /// Returns true if the status changed.
    pub fn recover_in_flight(&mut self) -> bool {
        if self.status == OperationStatus::InFlight {
            self.status = OperationStatus::Pending;
            true
        } else {
            false
        }
    }
}

fn scalar_identity(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(draft: OperationDraft) -> Operation {
        Operation::from_draft(draft, Utc::now()).unwrap()
    }

    #[test]
    fn new_operation_starts_pending() {
        let op = op(OperationDraft::create("journalEntry", json!({"id": "je-1"})));
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.enqueued_at, op.updated_at);
        assert!(op.next_attempt_at.is_none());
    }

    #[test]
    fn draft_validation() {
        assert!(OperationDraft::create("  ", json!({})).validate().is_err());
        assert!(OperationDraft::delete("medication", Value::Null, 1)
            .validate()
            .is_err());
        assert!(OperationDraft::delete("medication", json!("med-1"), 1)
            .validate()
            .is_ok());
    }

    #[test]
    fn record_key_uses_payload_identity() {
        let update = op(OperationDraft::update("incident", json!({"id": "inc-7", "severity": 2}), 3));
        let delete = op(OperationDraft::delete("incident", json!("inc-7"), 4));
        assert_eq!(update.record_key(), delete.record_key());
        assert_eq!(update.record_key().as_str(), "incident/inc-7");

        let numeric = op(OperationDraft::update("resident", json!({"id": 42}), 1));
        assert_eq!(numeric.record_key().as_str(), "resident/42");

        let other_type = op(OperationDraft::delete("medication", json!("inc-7"), 1));
        assert_ne!(other_type.record_key(), delete.record_key());
    }

    #[test]
    fn anonymous_payloads_get_distinct_keys() {
        let a = op(OperationDraft::create("journalEntry", json!({"amount": 10})));
        let b = op(OperationDraft::create("journalEntry", json!({"amount": 10})));
        assert_ne!(a.record_key(), b.record_key());
    }

    #[test]
    fn retry_bookkeeping() {
        let mut op = op(OperationDraft::create("account", json!({"id": "a"})));
        let now = Utc::now();
        op.begin_attempt(now);
        assert_eq!(op.status, OperationStatus::InFlight);

        let later = now + chrono::Duration::seconds(5);
        op.schedule_retry(now, Some(later), "timeout");
        assert_eq!(op.retry_count, 1);
        assert_eq!(op.status, OperationStatus::Pending);
        assert!(!op.is_due(now));
        assert!(op.is_due(later));
        assert_eq!(op.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn in_flight_recovers_to_pending() {
        let mut op = op(OperationDraft::create("account", json!({"id": "a"})));
        assert!(!op.recover_in_flight());
        op.begin_attempt(Utc::now());
        assert!(op.recover_in_flight());
        assert_eq!(op.status, OperationStatus::Pending);
    }

    #[test]
    fn status_transitions() {
        use OperationStatus::*;
        assert!(Pending.can_transition_to(InFlight));
        assert!(InFlight.can_transition_to(Pending));
        assert!(InFlight.can_transition_to(Resolved));
        assert!(InFlight.can_transition_to(Failed));
        assert!(!Resolved.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(InFlight));
        assert!(Resolved.is_terminal() && Failed.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    #[should_panic(expected = "cannot retry from PENDING")]
    #[cfg(debug_assertions)]
    fn retry_without_attempt_is_rejected() {
        let mut op = op(OperationDraft::create("account", json!({"id": "a"})));
        op.schedule_retry(Utc::now(), None, "timeout");
    }

    #[test]
    fn kind_and_status_display() {
        assert_eq!(OperationKind::Update.to_string(), "UPDATE");
        assert_eq!(OperationStatus::InFlight.to_string(), "IN_FLIGHT");
    }
}
