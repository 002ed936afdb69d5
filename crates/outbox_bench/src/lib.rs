//! Benchmark utilities.

use async_trait::async_trait;
use chrono::Utc;
use outbox_core::{Operation, OperationDraft};
use outbox_sync_engine::{SubmitOutcome, SubmitRequest, Submitter, SyncResult};
use rand::Rng;
use serde_json::{json, Value};

/// Entity type used by every generated draft.
pub const ENTITY_TYPE: &str = "journalEntry";

/// A journal-entry style payload with `fields` numeric columns.
pub fn random_payload(record: usize, fields: usize) -> Value {
    let mut rng = rand::thread_rng();
    let mut object = serde_json::Map::new();
    object.insert("id".into(), json!(format!("rec-{record}")));
    for field in 0..fields {
        object.insert(format!("f{field}"), json!(rng.gen_range(0..10_000)));
    }
    Value::Object(object)
}

/// `count` create drafts spread over `records` distinct records.
pub fn generate_drafts(count: usize, records: usize, fields: usize) -> Vec<OperationDraft> {
    (0..count)
        .map(|i| OperationDraft::create(ENTITY_TYPE, random_payload(i % records.max(1), fields)))
        .collect()
}

/// Materialized operations for store-level benchmarks.
pub fn generate_operations(count: usize, fields: usize) -> Vec<Operation> {
    generate_drafts(count, count, fields)
        .into_iter()
        .filter_map(|draft| Operation::from_draft(draft, Utc::now()).ok())
        .collect()
}

/// Accepts every operation immediately.
#[derive(Debug, Default)]
pub struct AcceptAll;

#[async_trait]
impl Submitter for AcceptAll {
    async fn submit(&self, _request: &SubmitRequest) -> SyncResult<SubmitOutcome> {
        Ok(SubmitOutcome::Applied)
    }
}
