//! Persistence tests against real files.

use chrono::Utc;
use outbox_core::{
    DeadLetterEntry, DeadLetterStore, FailureReason, Operation, OperationDraft, OperationStatus,
    OutboxDir, QueueStore, StoreError,
};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

fn op(n: u32) -> Operation {
    Operation::from_draft(
        OperationDraft::update("resident", json!({ "id": format!("r{n}"), "room": n }), 1),
        Utc::now(),
    )
    .unwrap()
}

#[test]
fn queue_survives_reopen() {
    let tmp = tempdir().unwrap();
    let ops: Vec<_> = (0..4).map(op).collect();

    {
        let dir = OutboxDir::open(tmp.path(), true).unwrap();
        let queue = dir.open_queue().unwrap();
        for o in &ops {
            queue.put(o).unwrap();
        }
        queue.delete(ops[2].id).unwrap();
    }

    let dir = OutboxDir::open(tmp.path(), false).unwrap();
    let queue = dir.open_queue().unwrap();
    let ids: Vec<_> = queue.get_all().unwrap().into_iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![ops[0].id, ops[1].id, ops[3].id]);
}

#[test]
fn in_flight_status_is_persisted_as_written() {
    let tmp = tempdir().unwrap();
    let mut a = op(1);
    {
        let dir = OutboxDir::open(tmp.path(), true).unwrap();
        let queue = dir.open_queue().unwrap();
        a.begin_attempt(Utc::now());
        queue.put(&a).unwrap();
    }

    let dir = OutboxDir::open(tmp.path(), false).unwrap();
    let queue = dir.open_queue().unwrap();
    let mut reloaded = queue.get(a.id).unwrap().unwrap();
    assert_eq!(reloaded.status, OperationStatus::InFlight);
    assert!(reloaded.recover_in_flight());
    assert_eq!(reloaded.status, OperationStatus::Pending);
}

#[test]
fn torn_tail_on_disk_is_dropped() {
    let tmp = tempdir().unwrap();
    let a = op(1);
    let queue_path;
    {
        let dir = OutboxDir::open(tmp.path(), true).unwrap();
        queue_path = dir.queue_path();
        dir.open_queue().unwrap().put(&a).unwrap();
    }

    // A crash part-way through the next append.
    let mut file = OpenOptions::new().append(true).open(&queue_path).unwrap();
    file.write_all(b"OBXL\x01\x00\x01\xff").unwrap();
    drop(file);

    let dir = OutboxDir::open(tmp.path(), false).unwrap();
    let queue = dir.open_queue().unwrap();
    assert_eq!(queue.get_all().unwrap(), vec![a.clone()]);

    let b = op(2);
    queue.put(&b).unwrap();
    drop(queue);
    let queue = dir.open_queue().unwrap();
    assert_eq!(queue.get_all().unwrap(), vec![a, b]);
}

#[test]
fn garbage_in_the_middle_is_corruption() {
    let tmp = tempdir().unwrap();
    let queue_path;
    {
        let dir = OutboxDir::open(tmp.path(), true).unwrap();
        queue_path = dir.queue_path();
        let queue = dir.open_queue().unwrap();
        queue.put(&op(1)).unwrap();
        queue.put(&op(2)).unwrap();
    }

    let mut bytes = std::fs::read(&queue_path).unwrap();
    bytes[0] = b'Z';
    std::fs::write(&queue_path, bytes).unwrap();

    let dir = OutboxDir::open(tmp.path(), false).unwrap();
    assert!(matches!(
        dir.open_queue(),
        Err(StoreError::Corrupted { offset: 0, .. })
    ));
}

#[test]
fn compaction_shrinks_file_and_keeps_entries() {
    let tmp = tempdir().unwrap();
    let dir = OutboxDir::open(tmp.path(), true).unwrap();
    let queue = dir.open_queue().unwrap();

    let mut keep = op(0);
    queue.put(&keep).unwrap();
    for n in 1..20 {
        let o = op(n);
        queue.put(&o).unwrap();
        queue.delete(o.id).unwrap();
    }
    for attempt in 0..3 {
        keep.begin_attempt(Utc::now());
        keep.schedule_retry(Utc::now(), None, format!("attempt {attempt}"));
        queue.put(&keep).unwrap();
    }

    let before = std::fs::metadata(dir.queue_path()).unwrap().len();
    let stats = queue.compact().unwrap();
    let after = std::fs::metadata(dir.queue_path()).unwrap().len();
    assert_eq!(stats.bytes_before, before);
    assert_eq!(stats.bytes_after, after);
    assert!(after < before);
    drop(queue);

    let queue = dir.open_queue().unwrap();
    assert_eq!(queue.get_all().unwrap(), vec![keep]);
}

#[test]
fn dead_letters_persist_with_metadata() {
    let tmp = tempdir().unwrap();
    let entry = DeadLetterEntry::new(
        op(9),
        FailureReason::Conflict,
        vec!["field `room` changed remotely (local 9, remote 12)".into()],
        Utc::now(),
    );
    {
        let dir = OutboxDir::open(tmp.path(), true).unwrap();
        dir.open_dead_letters().unwrap().put(&entry).unwrap();
    }

    let dir = OutboxDir::open(tmp.path(), false).unwrap();
    let dlq = dir.open_dead_letters().unwrap();
    assert_eq!(dlq.get_all().unwrap(), vec![entry]);
}
