//! Manual dead-letter actions.

use crate::dead_letter::DeadLetterEntry;
use crate::error::{StoreError, StoreResult};
use crate::id::OperationId;
use crate::operation::Operation;
use crate::store::{DeadLetterStore, QueueStore};
use chrono::{DateTime, Utc};
use tracing::info;

/// Puts a dead-lettered operation back into the queue.
///
/// The queued copy gets a fresh id and a zero retry count. It is written
/// before the dead letter is deleted, so a crash in between leaves a
/// duplicate rather than losing the operation. A stale queue entry under
/// the dead letter's own id, left by an interrupted move, is dropped first.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no dead letter has `id`.
pub fn replay_dead_letter(
    queue: &dyn QueueStore,
    dead_letters: &dyn DeadLetterStore,
    id: OperationId,
    now: DateTime<Utc>,
) -> StoreResult<Operation> {
    let entry = dead_letters.get(id)?.ok_or(StoreError::NotFound(id))?;
    let operation = entry.to_replay(now);
    queue.put(&operation)?;
    queue.delete(id)?;
    dead_letters.delete(id)?;
    info!(dead_letter = %id, queued = %operation.id, "replayed dead letter");
    Ok(operation)
}

/// Deletes a dead letter for good, returning what was removed.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if no dead letter has `id`.
pub fn discard_dead_letter(
    dead_letters: &dyn DeadLetterStore,
    id: OperationId,
) -> StoreResult<DeadLetterEntry> {
    let entry = dead_letters.get(id)?.ok_or(StoreError::NotFound(id))?;
    dead_letters.delete(id)?;
    info!(dead_letter = %id, "discarded dead letter");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dead_letter::FailureReason;
    use crate::operation::{OperationDraft, OperationStatus};
    use crate::store::{LogDeadLetterStore, LogQueueStore};
    use serde_json::json;

    fn dead_letter() -> DeadLetterEntry {
        let mut op = Operation::from_draft(
            OperationDraft::update("medication", json!({ "id": "m1", "dose": 2 }), 4),
            Utc::now(),
        )
        .unwrap();
        op.retry_count = 3;
        DeadLetterEntry::new(op, FailureReason::RetriesExhausted, vec![], Utc::now())
    }

    #[test]
    fn replay_moves_entry_back_with_fresh_id() {
        let queue = LogQueueStore::in_memory();
        let dlq = LogDeadLetterStore::in_memory();
        let entry = dead_letter();
        dlq.put(&entry).unwrap();

        let queued = replay_dead_letter(&queue, &dlq, entry.id(), Utc::now()).unwrap();
        assert_ne!(queued.id, entry.id());
        assert_eq!(queued.retry_count, 0);
        assert_eq!(queued.status, OperationStatus::Pending);
        assert_eq!(queued.payload, entry.operation.payload);
        assert_eq!(queue.get_all().unwrap(), vec![queued]);
        assert!(dlq.is_empty());
    }

    #[test]
    fn replay_drops_stale_queue_copy_of_half_moved_entry() {
        let queue = LogQueueStore::in_memory();
        let dlq = LogDeadLetterStore::in_memory();
        let entry = dead_letter();
        let mut stale = entry.operation.clone();
        stale.status = OperationStatus::InFlight;
        queue.put(&stale).unwrap();
        dlq.put(&entry).unwrap();

        let queued = replay_dead_letter(&queue, &dlq, entry.id(), Utc::now()).unwrap();
        assert_eq!(queue.get_all().unwrap(), vec![queued]);
        assert!(dlq.is_empty());
    }

    #[test]
    fn missing_dead_letter_is_not_found() {
        let queue = LogQueueStore::in_memory();
        let dlq = LogDeadLetterStore::in_memory();
        let id = OperationId::new();
        assert!(matches!(
            replay_dead_letter(&queue, &dlq, id, Utc::now()),
            Err(StoreError::NotFound(missing)) if missing == id
        ));
        assert!(matches!(
            discard_dead_letter(&dlq, id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn discard_removes_entry() {
        let dlq = LogDeadLetterStore::in_memory();
        let entry = dead_letter();
        dlq.put(&entry).unwrap();
        assert_eq!(discard_dead_letter(&dlq, entry.id()).unwrap(), entry);
        assert!(dlq.is_empty());
    }
}
