//! Conflict resolution.
//!
//! When a submit reports that the remote record moved on since the client's
//! `local_version`, a [`ConflictResolver`] decides whether the queued
//! mutation is still safe to apply. Resolvers must be deterministic: the
//! same operation and remote state always give the same [`Resolution`].

use crate::submit::RemoteState;
use outbox_core::{Operation, OperationKind};
use serde_json::{Map, Value};

/// How an applyable operation should be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Resubmit against the new remote version.
    Resubmit,
    /// The remote state already reflects the mutation; treat as done.
    AlreadyApplied,
}

/// Outcome of comparing a queued operation with the remote state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The operation can be completed without human input.
    Applyable(ApplyMode),
    /// Human-readable descriptions of each disagreement, in field order.
    Conflicting(Vec<String>),
}

impl Resolution {
    /// Returns true for [`Resolution::Conflicting`].
    pub fn is_conflicting(&self) -> bool {
        matches!(self, Self::Conflicting(_))
    }
}

/// Decides what to do with a conflicting operation.
pub trait ConflictResolver: Send + Sync {
    /// Compares `operation` with the remote state returned by the failed
    /// submit.
    fn resolve(&self, operation: &Operation, remote: &RemoteState) -> Resolution;
}

/// Field-level resolver.
///
/// - `DELETE` of a record that is already gone is applied
/// - `DELETE` of a record that still exists is a conflict
/// - `UPDATE` is resubmitted when the remote side changed only fields the
///   update does not touch, or changed them to the same values
/// - `UPDATE` without a changed-field list, or of a deleted record, is a
///   conflict
/// - `CREATE` whose fields all match the remote record is already applied
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMergeResolver;

/// Payload key carrying the record identity; never compared.
const ID_FIELD: &str = "id";

impl ConflictResolver for FieldMergeResolver {
    fn resolve(&self, operation: &Operation, remote: &RemoteState) -> Resolution {
        match operation.kind {
            OperationKind::Delete => resolve_delete(operation, remote),
            OperationKind::Update => resolve_update(operation, remote),
            OperationKind::Create => resolve_create(operation, remote),
        }
    }
}

fn resolve_delete(operation: &Operation, remote: &RemoteState) -> Resolution {
    if remote.record.is_none() {
        return Resolution::Applyable(ApplyMode::AlreadyApplied);
    }
    Resolution::Conflicting(vec![format!(
        "record modified remotely (version {} -> {}) before it could be deleted",
        operation.local_version, remote.version
    )])
}

fn resolve_update(operation: &Operation, remote: &RemoteState) -> Resolution {
    let Some(record) = &remote.record else {
        return Resolution::Conflicting(vec![format!(
            "record deleted remotely at version {}",
            remote.version
        )]);
    };
    let Some(changed) = &remote.changed_fields else {
        return Resolution::Conflicting(vec![format!(
            "record changed remotely (version {} -> {}); changed fields unknown",
            operation.local_version, remote.version
        )]);
    };
    let Value::Object(local) = &operation.payload else {
        return Resolution::Conflicting(vec![
            "update payload is not a field map; cannot compare fields".to_string(),
        ]);
    };

    let conflicts: Vec<String> = local
        .iter()
        .filter(|(field, _)| field.as_str() != ID_FIELD)
        .filter(|(field, _)| changed.iter().any(|c| c == *field))
        .filter_map(|(field, local_value)| {
            let remote_value = remote_field(record, field);
            (remote_value != local_value).then(|| {
                format!("field `{field}` changed remotely: local {local_value}, remote {remote_value}")
            })
        })
        .collect();

    if conflicts.is_empty() {
        Resolution::Applyable(ApplyMode::Resubmit)
    } else {
        Resolution::Conflicting(conflicts)
    }
}

fn resolve_create(operation: &Operation, remote: &RemoteState) -> Resolution {
    let Some(record) = &remote.record else {
        return Resolution::Applyable(ApplyMode::Resubmit);
    };

    let conflicts: Vec<String> = match &operation.payload {
        Value::Object(local) => differing_fields(local, record),
        other if other == record => Vec::new(),
        other => vec![format!(
            "record already exists remotely with different content: local {other}, remote {record}"
        )],
    };

    if conflicts.is_empty() {
        Resolution::Applyable(ApplyMode::AlreadyApplied)
    } else {
        Resolution::Conflicting(conflicts)
    }
}

fn differing_fields(local: &Map<String, Value>, record: &Value) -> Vec<String> {
    local
        .iter()
        .filter_map(|(field, local_value)| {
            let remote_value = remote_field(record, field);
            (remote_value != local_value).then(|| {
                format!("field `{field}` already exists remotely: local {local_value}, remote {remote_value}")
            })
        })
        .collect()
}

fn remote_field<'a>(record: &'a Value, field: &str) -> &'a Value {
    record.get(field).unwrap_or(&Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use outbox_core::OperationDraft;
    use serde_json::json;

    fn op(draft: OperationDraft) -> Operation {
        Operation::from_draft(draft, Utc::now()).unwrap()
    }

    fn resolve(operation: &Operation, remote: &RemoteState) -> Resolution {
        FieldMergeResolver.resolve(operation, remote)
    }

    #[test]
    fn delete_of_missing_record_is_applied() {
        let op = op(OperationDraft::delete("incident", json!("inc-1"), 2));
        assert_eq!(
            resolve(&op, &RemoteState::deleted(3)),
            Resolution::Applyable(ApplyMode::AlreadyApplied)
        );
    }

    #[test]
    fn delete_of_modified_record_conflicts() {
        let op = op(OperationDraft::delete("incident", json!("inc-1"), 2));
        let remote = RemoteState::new(5, json!({ "id": "inc-1", "status": "closed" }));
        assert!(resolve(&op, &remote).is_conflicting());
    }

    #[test]
    fn update_with_disjoint_fields_resubmits() {
        let op = op(OperationDraft::update(
            "resident",
            json!({ "id": "r1", "room": 12 }),
            1,
        ));
        let remote = RemoteState::new(2, json!({ "id": "r1", "room": 4, "phone": "555" }))
            .with_changed_fields(["phone"]);
        assert_eq!(
            resolve(&op, &remote),
            Resolution::Applyable(ApplyMode::Resubmit)
        );
    }

    #[test]
    fn update_with_same_value_change_resubmits() {
        let op = op(OperationDraft::update("resident", json!({ "id": "r1", "room": 12 }), 1));
        let remote =
            RemoteState::new(2, json!({ "id": "r1", "room": 12 })).with_changed_fields(["room"]);
        assert_eq!(
            resolve(&op, &remote),
            Resolution::Applyable(ApplyMode::Resubmit)
        );
    }

    #[test]
    fn update_with_overlapping_fields_conflicts_in_field_order() {
        let op = op(OperationDraft::update(
            "medication",
            json!({ "id": "m1", "route": "oral", "dose": 5 }),
            1,
        ));
        let remote = RemoteState::new(
            3,
            json!({ "id": "m1", "route": "iv", "dose": 10 }),
        )
        .with_changed_fields(["route", "dose"]);

        let Resolution::Conflicting(conflicts) = resolve(&op, &remote) else {
            panic!("expected conflict");
        };
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts[0].contains("`dose`"));
        assert!(conflicts[1].contains("`route`"));
    }

    #[test]
    fn update_without_field_list_conflicts() {
        let op = op(OperationDraft::update("resident", json!({ "id": "r1", "room": 1 }), 1));
        let remote = RemoteState::new(2, json!({ "id": "r1", "room": 1 }));
        assert!(resolve(&op, &remote).is_conflicting());
    }

    #[test]
    fn update_of_deleted_record_conflicts() {
        let op = op(OperationDraft::update("resident", json!({ "id": "r1", "room": 1 }), 1));
        let Resolution::Conflicting(conflicts) = resolve(&op, &RemoteState::deleted(4)) else {
            panic!("expected conflict");
        };
        assert!(conflicts[0].contains("deleted remotely"));
    }

    #[test]
    fn create_matching_remote_is_already_applied() {
        let op = op(OperationDraft::create(
            "journalEntry",
            json!({ "id": "je-1", "amount": 120 }),
        ));
        let remote = RemoteState::new(1, json!({ "id": "je-1", "amount": 120, "posted": true }));
        assert_eq!(
            resolve(&op, &remote),
            Resolution::Applyable(ApplyMode::AlreadyApplied)
        );
    }

    #[test]
    fn create_differing_from_remote_conflicts() {
        let op = op(OperationDraft::create(
            "journalEntry",
            json!({ "id": "je-1", "amount": 120 }),
        ));
        let remote = RemoteState::new(1, json!({ "id": "je-1", "amount": 95 }));
        let Resolution::Conflicting(conflicts) = resolve(&op, &remote) else {
            panic!("expected conflict");
        };
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("`amount`"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let op = op(OperationDraft::update(
            "medication",
            json!({ "id": "m1", "a": 1, "b": 2, "c": 3 }),
            1,
        ));
        let remote = RemoteState::new(2, json!({ "id": "m1", "a": 9, "b": 2, "c": 8 }))
            .with_changed_fields(["c", "a", "b"]);
        let first = resolve(&op, &remote);
        for _ in 0..10 {
            assert_eq!(resolve(&op, &remote), first);
        }
    }
}
