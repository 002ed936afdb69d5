//! The remote-call contract the engine drains against.
//!
//! Each feature of the application registers one [`Submitter`] per entity
//! type. The engine never knows the concrete endpoint; it hands the
//! submitter a [`SubmitRequest`] and classifies what comes back.

use crate::error::SyncResult;
use async_trait::async_trait;
use outbox_core::{Operation, OperationId, OperationKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a submitter receives for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Queue entry id, usable as an idempotency key.
    pub operation_id: OperationId,
    /// Target resource type.
    pub entity_type: String,
    /// Intended remote effect.
    pub kind: OperationKind,
    /// Record to create or patch, or the target of a delete.
    pub payload: Value,
    /// Remote version the client last saw.
    pub local_version: u64,
}

impl From<&Operation> for SubmitRequest {
    fn from(op: &Operation) -> Self {
        Self {
            operation_id: op.id,
            entity_type: op.entity_type.clone(),
            kind: op.kind,
            payload: op.payload.clone(),
            local_version: op.local_version,
        }
    }
}

/// Remote record state reported alongside a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteState {
    /// Current remote version.
    pub version: u64,
    /// Current remote record; `None` if it no longer exists.
    pub record: Option<Value>,
    /// Fields changed remotely since the client's `local_version`, if the
    /// remote side can tell.
    pub changed_fields: Option<Vec<String>>,
}

impl RemoteState {
    /// A remote record at `version`.
    pub fn new(version: u64, record: Value) -> Self {
        Self {
            version,
            record: Some(record),
            changed_fields: None,
        }
    }

    /// The remote record is gone.
    pub fn deleted(version: u64) -> Self {
        Self {
            version,
            record: None,
            changed_fields: None,
        }
    }

    /// Sets the fields changed since the client's base version.
    pub fn with_changed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// A submit call that reached the remote system.
///
/// Transport and server failures are reported as `Err`; retryable ones
/// (see [`crate::SyncError::is_retryable`]) leave the entry queued.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The mutation was applied.
    Applied,
    /// The remote record's version differs from `local_version`.
    Conflict(RemoteState),
    /// The remote side refused the mutation; retrying cannot help.
    Rejected(String),
}

/// Performs the remote call for one entity type.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Applies one queued mutation remotely.
    async fn submit(&self, request: &SubmitRequest) -> SyncResult<SubmitOutcome>;
}

/// Maps entity types to their submitters.
#[derive(Clone, Default)]
pub struct SubmitterRegistry {
    submitters: HashMap<String, Arc<dyn Submitter>>,
}

impl SubmitterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a submitter, replacing any previous one for the type.
    pub fn register(&mut self, entity_type: impl Into<String>, submitter: Arc<dyn Submitter>) {
        self.submitters.insert(entity_type.into(), submitter);
    }

    /// Builder form of [`SubmitterRegistry::register`].
    #[must_use]
    pub fn with(mut self, entity_type: impl Into<String>, submitter: Arc<dyn Submitter>) -> Self {
        self.register(entity_type, submitter);
        self
    }

    /// Looks up the submitter for an entity type.
    pub fn get(&self, entity_type: &str) -> Option<Arc<dyn Submitter>> {
        self.submitters.get(entity_type).cloned()
    }

    /// Registered entity types, sorted.
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.submitters.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Number of registered submitters.
    pub fn len(&self) -> usize {
        self.submitters.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.submitters.is_empty()
    }
}

impl fmt::Debug for SubmitterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitterRegistry")
            .field("entity_types", &self.entity_types())
            .finish()
    }
}
