//! Property-based test generators using proptest.

use outbox_core::{OperationDraft, OperationKind};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Entity types used across generated drafts.
pub const ENTITY_TYPES: &[&str] = &[
    "journalEntry",
    "medication",
    "incidentDraft",
    "resident",
    "reconciliation",
];

/// Strategy for entity type tags.
pub fn entity_type_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(ENTITY_TYPES).prop_map(str::to_string)
}

/// Strategy for operation kinds.
pub fn kind_strategy() -> impl Strategy<Value = OperationKind> {
    prop_oneof![
        Just(OperationKind::Create),
        Just(OperationKind::Update),
        Just(OperationKind::Delete),
    ]
}

/// Strategy for record ids drawn from a small pool, so drafts often share
/// a record.
pub fn record_id_strategy(pool: u32) -> impl Strategy<Value = String> {
    (0..pool.max(1)).prop_map(|n| format!("rec-{n}"))
}

/// Strategy for a flat JSON object with an `id` field.
pub fn payload_strategy(id: impl Strategy<Value = String>) -> impl Strategy<Value = Value> {
    (
        id,
        prop::collection::btree_map("[a-z]{1,8}", any::<i32>(), 0..5),
    )
        .prop_map(|(id, fields)| {
            let mut object = serde_json::Map::new();
            for (key, value) in fields {
                object.insert(key, json!(value));
            }
            object.insert("id".to_string(), json!(id));
            Value::Object(object)
        })
}

/// Strategy for valid drafts.
///
/// `record_pool` bounds the number of distinct record ids.
pub fn draft_strategy(record_pool: u32) -> impl Strategy<Value = OperationDraft> {
    (
        entity_type_strategy(),
        kind_strategy(),
        payload_strategy(record_id_strategy(record_pool)),
        0u64..100,
    )
        .prop_map(|(entity_type, kind, payload, version)| {
            let payload = match kind {
                OperationKind::Delete => payload["id"].clone(),
                _ => payload,
            };
            OperationDraft::new(entity_type, kind, payload, version)
        })
}

/// Strategy for a batch of drafts.
pub fn draft_batch_strategy(
    record_pool: u32,
    min: usize,
    max: usize,
) -> impl Strategy<Value = Vec<OperationDraft>> {
    prop::collection::vec(draft_strategy(record_pool), min..max)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn drafts_validate(draft in draft_strategy(4)) {
            prop_assert!(draft.validate().is_ok());
        }

        #[test]
        fn payload_has_id(payload in payload_strategy(record_id_strategy(3))) {
            prop_assert!(payload["id"].as_str().is_some_and(|id| id.starts_with("rec-")));
        }
    }
}
