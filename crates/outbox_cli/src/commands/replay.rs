//! Replay command implementation.

use super::{open_outbox, parse_id, CommandResult};
use std::path::Path;

/// Runs the replay command.
pub fn run(path: &Path, id: &str) -> CommandResult<()> {
    let id = parse_id(id)?;
    let outbox = open_outbox(path)?;
    let replayed =
        outbox_core::replay_dead_letter(&outbox.queue, &outbox.dead_letters, id, chrono::Utc::now())?;
    println!("✓ Replayed {id} as {}", replayed.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::{
        DeadLetterEntry, DeadLetterStore, FailureReason, Operation, OperationDraft,
        OperationStatus, OutboxDir, QueueStore,
    };
    use serde_json::json;

    #[test]
    fn replay_moves_entry_back_to_queue() {
        let temp = tempfile::tempdir().unwrap();
        let id = {
            let dir = OutboxDir::open(temp.path(), true).unwrap();
            let dead_letters = dir.open_dead_letters().unwrap();
            let op = Operation::from_draft(
                OperationDraft::create("incident", json!({ "id": "i1" })),
                chrono::Utc::now(),
            )
            .unwrap();
            let entry = DeadLetterEntry::new(op, FailureReason::Rejected, Vec::new(), chrono::Utc::now());
            dead_letters.put(&entry).unwrap();
            entry.id()
        };

        run(temp.path(), &id.to_string()).unwrap();

        let outbox = open_outbox(temp.path()).unwrap();
        assert!(outbox.dead_letters.is_empty());
        let queued = outbox.queue.get_all().unwrap();
        assert_eq!(queued.len(), 1);
        assert_ne!(queued[0].id, id);
    }

    #[test]
    fn replay_after_interrupted_move_queues_one_copy() {
        let temp = tempfile::tempdir().unwrap();
        let id = {
            let dir = OutboxDir::open(temp.path(), true).unwrap();
            let queue = dir.open_queue().unwrap();
            let dead_letters = dir.open_dead_letters().unwrap();
            let mut op = Operation::from_draft(
                OperationDraft::update("medication", json!({ "id": "m1", "dose": 5 }), 2),
                chrono::Utc::now(),
            )
            .unwrap();
            op.begin_attempt(chrono::Utc::now());
            queue.put(&op).unwrap();
            let entry =
                DeadLetterEntry::new(op, FailureReason::Conflict, vec!["dose".into()], chrono::Utc::now());
            dead_letters.put(&entry).unwrap();
            entry.id()
        };

        run(temp.path(), &id.to_string()).unwrap();

        let outbox = open_outbox(temp.path()).unwrap();
        let queued = outbox.queue.get_all().unwrap();
        assert_eq!(queued.len(), 1);
        assert_ne!(queued[0].id, id);
        assert_eq!(queued[0].status, OperationStatus::Pending);
        assert!(outbox.dead_letters.is_empty());
    }

    #[test]
    fn unknown_id_fails() {
        let temp = tempfile::tempdir().unwrap();
        OutboxDir::open(temp.path(), true).unwrap();
        assert!(run(temp.path(), &outbox_core::OperationId::new().to_string()).is_err());
    }
}
