//! Keyed, append-only record log.
//!
//! A [`RecordLog`] keeps a map of live entries on top of a
//! [`StorageBackend`]. Every `put` and `delete` is appended as a framed
//! record and synced before the call returns. Only an index of record
//! offsets lives in memory; bodies are read back from the backend on demand.
//!
//! # Recovery
//!
//! Opening a log replays every record from offset zero:
//!
//! - a record cut short at the end of the log (crash mid-append) is
//!   truncated away
//! - a checksum mismatch on the final record is treated the same way
//! - any other damage is reported as [`StoreError::Corrupted`]
//!
//! # Ordering
//!
//! Entries keep the position of their first `put`. Re-putting an entry
//! updates it in place without moving it to the back.

use crate::dead_letter::DeadLetterEntry;
use crate::error::{StoreError, StoreResult};
use crate::id::OperationId;
use crate::operation::Operation;
use crate::record::{
    encode_record, verify_record, RecordHeader, RecordType, HEADER_SIZE, ID_SIZE,
};
use outbox_storage::StorageBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// A value that can be stored in a [`RecordLog`].
pub trait LogEntry: Serialize + DeserializeOwned {
    /// The key the entry is stored under.
    fn log_id(&self) -> OperationId;
}

impl LogEntry for Operation {
    fn log_id(&self) -> OperationId {
        self.id
    }
}

impl LogEntry for DeadLetterEntry {
    fn log_id(&self) -> OperationId {
        self.operation.id
    }
}

/// Location of a live entry's latest body.
#[derive(Debug, Clone, Copy)]
struct Slot {
    seq: u64,
    body_offset: u64,
    body_len: usize,
    record_len: u64,
}

/// Result of compacting a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
    /// Number of live entries rewritten.
    pub entries: usize,
}

impl CompactionStats {
    /// Bytes reclaimed.
    #[must_use]
    pub fn reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

enum Scan {
    Record {
        record_type: RecordType,
        id: OperationId,
        body_offset: u64,
        body_len: usize,
        record_len: u64,
    },
    TornTail(&'static str),
}

/// Append-only keyed log of `T` entries.
pub struct RecordLog<T: LogEntry> {
    backend: Box<dyn StorageBackend>,
    index: HashMap<OperationId, Slot>,
    order: BTreeMap<u64, OperationId>,
    next_seq: u64,
    stale_bytes: u64,
    _entry: PhantomData<fn() -> T>,
}

impl<T: LogEntry> RecordLog<T> {
    /// Opens a log, replaying whatever the backend already holds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if a record other than the last
    /// one is damaged.
    pub fn open(backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let mut log = Self::open_empty(backend);
        log.replay()?;
        Ok(log)
    }

    /// Wraps a backend without replaying it.
    ///
    /// Only meaningful for a backend known to be empty.
    pub(crate) fn open_empty(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            index: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            stale_bytes: 0,
            _entry: PhantomData,
        }
    }

    fn replay(&mut self) -> StoreResult<()> {
        let size = self.backend.size()?;
        let mut offset = 0u64;
        let mut records = 0usize;

        while offset < size {
            match self.scan_record(offset, size)? {
                Scan::Record {
                    record_type,
                    id,
                    body_offset,
                    body_len,
                    record_len,
                } => {
                    match record_type {
                        RecordType::Put => self.apply_put(
                            id,
                            Slot {
                                seq: 0,
                                body_offset,
                                body_len,
                                record_len,
                            },
                        ),
                        RecordType::Delete => self.apply_delete(id, record_len),
                    }
                    records += 1;
                    offset += record_len;
                }
                Scan::TornTail(reason) => {
                    warn!(offset, size, reason, "truncating torn record at log tail");
                    self.backend.truncate(offset)?;
                    self.backend.sync()?;
                    break;
                }
            }
        }

        debug!(records, live = self.index.len(), "replayed record log");
        Ok(())
    }

    fn scan_record(&self, offset: u64, size: u64) -> StoreResult<Scan> {
        let remaining = size - offset;
        if remaining < HEADER_SIZE as u64 {
            return Ok(Scan::TornTail("incomplete header"));
        }

        let header_bytes = self.backend.read_at(offset, HEADER_SIZE)?;
        let header = RecordHeader::parse(&header_bytes, offset)?;
        let record_len = header.record_len();
        if record_len > remaining {
            return Ok(Scan::TornTail("incomplete record"));
        }

        let bytes = self.backend.read_at(offset, record_len as usize)?;
        let Some((id, body)) = verify_record(&bytes) else {
            if offset + record_len == size {
                return Ok(Scan::TornTail("checksum mismatch on final record"));
            }
            return Err(StoreError::corrupted(offset, "checksum mismatch"));
        };

        Ok(Scan::Record {
            record_type: header.record_type,
            id,
            body_offset: offset + (HEADER_SIZE + ID_SIZE) as u64,
            body_len: body.len(),
            record_len,
        })
    }

    fn apply_put(&mut self, id: OperationId, mut slot: Slot) {
        if let Some(previous) = self.index.get(&id) {
            slot.seq = previous.seq;
            self.stale_bytes += previous.record_len;
        } else {
            slot.seq = self.next_seq;
            self.next_seq += 1;
            self.order.insert(slot.seq, id);
        }
        self.index.insert(id, slot);
    }

    fn apply_delete(&mut self, id: OperationId, record_len: u64) {
        if let Some(previous) = self.index.remove(&id) {
            self.order.remove(&previous.seq);
            self.stale_bytes += previous.record_len + record_len;
        } else {
            self.stale_bytes += record_len;
        }
    }

    /// Appends a synced record, cutting any partial write back off on failure.
    fn append(&mut self, bytes: &[u8]) -> StoreResult<u64> {
        let before = self.backend.size()?;
        match self.backend.append_synced(bytes) {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Err(rollback) = self.backend.truncate(before) {
                    warn!(error = %rollback, "failed to roll back partial append");
                }
                Err(err.into())
            }
        }
    }

    /// Inserts or replaces the entry keyed by `value.log_id()`.
    pub fn put(&mut self, value: &T) -> StoreResult<()> {
        let id = value.log_id();
        let mut body = Vec::new();
        ciborium::ser::into_writer(value, &mut body).map_err(StoreError::codec)?;
        let bytes = encode_record(RecordType::Put, &id, &body)?;

        let offset = self.append(&bytes)?;
        self.apply_put(
            id,
            Slot {
                seq: 0,
                body_offset: offset + (HEADER_SIZE + ID_SIZE) as u64,
                body_len: body.len(),
                record_len: bytes.len() as u64,
            },
        );
        Ok(())
    }

    /// Removes an entry. Returns `false` if it was not present.
    ///
    /// Nothing is written for an absent id.
    pub fn delete(&mut self, id: OperationId) -> StoreResult<bool> {
        if !self.index.contains_key(&id) {
            return Ok(false);
        }
        let bytes = encode_record(RecordType::Delete, &id, &[])?;
        self.append(&bytes)?;
        self.apply_delete(id, bytes.len() as u64);
        Ok(true)
    }

    /// Returns true if an entry with `id` is live.
    #[must_use]
    pub fn contains(&self, id: OperationId) -> bool {
        self.index.contains_key(&id)
    }

    /// Reads the entry with `id`.
    pub fn get(&self, id: OperationId) -> StoreResult<Option<T>> {
        match self.index.get(&id) {
            Some(slot) => self.read_slot(slot).map(Some),
            None => Ok(None),
        }
    }

    /// Reads every live entry in insertion order.
    pub fn values(&self) -> StoreResult<Vec<T>> {
        self.order
            .values()
            .filter_map(|id| self.index.get(id))
            .map(|slot| self.read_slot(slot))
            .collect()
    }

    fn read_slot(&self, slot: &Slot) -> StoreResult<T> {
        let body = self.backend.read_at(slot.body_offset, slot.body_len)?;
        ciborium::de::from_reader(body.as_slice()).map_err(StoreError::codec)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes held by superseded or deleted records.
    #[must_use]
    pub fn stale_bytes(&self) -> u64 {
        self.stale_bytes
    }

    /// Current size of the underlying log.
    pub fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Rewrites the log with one `Put` per live entry, in order.
    ///
    /// The swap is atomic: a crash leaves either the old or the new log.
    pub fn compact(&mut self) -> StoreResult<CompactionStats> {
        let bytes_before = self.backend.size()?;
        let mut buf = Vec::with_capacity((bytes_before - self.stale_bytes) as usize);
        let mut slots = Vec::with_capacity(self.index.len());

        for (seq, id) in &self.order {
            let Some(slot) = self.index.get(id) else {
                continue;
            };
            let body = self.backend.read_at(slot.body_offset, slot.body_len)?;
            let bytes = encode_record(RecordType::Put, id, &body)?;
            let offset = buf.len() as u64;
            buf.extend_from_slice(&bytes);
            slots.push((
                *id,
                Slot {
                    seq: *seq,
                    body_offset: offset + (HEADER_SIZE + ID_SIZE) as u64,
                    body_len: body.len(),
                    record_len: bytes.len() as u64,
                },
            ));
        }

        self.backend.replace(&buf)?;
        let entries = slots.len();
        self.index = slots.into_iter().collect();
        self.stale_bytes = 0;

        let stats = CompactionStats {
            bytes_before,
            bytes_after: buf.len() as u64,
            entries,
        };
        debug!(?stats, "compacted record log");
        Ok(stats)
    }
}

impl<T: LogEntry> std::fmt::Debug for RecordLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLog")
            .field("live", &self.index.len())
            .field("stale_bytes", &self.stale_bytes)
            .finish_non_exhaustive()
    }
}
