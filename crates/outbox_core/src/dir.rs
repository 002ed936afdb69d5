//! Outbox directory management.
//!
//! ```text
//! <outbox_path>/
//! ├─ LOCK               # Advisory lock for single-writer
//! ├─ queue.log          # Primary queue record log
//! └─ dead_letters.log   # Dead-letter record log
//! ```
//!
//! The LOCK file ensures only one process works on the outbox at a time,
//! whether that is the application's sync engine or the operator CLI.

use crate::error::{StoreError, StoreResult};
use crate::store::{LogDeadLetterStore, LogQueueStore};
use fs2::FileExt;
use outbox_storage::FileBackend;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const QUEUE_FILE: &str = "queue.log";
const DEAD_LETTER_FILE: &str = "dead_letters.log";

/// A locked outbox directory.
///
/// The lock is held for as long as this value lives.
#[derive(Debug)]
pub struct OutboxDir {
    path: PathBuf,
    _lock_file: File,
}

impl OutboxDir {
    /// Opens or creates an outbox directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidDirectory`] if the path is missing (and
    ///   `create_if_missing` is false) or is not a directory
    /// - [`StoreError::Locked`] if another process holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::InvalidDirectory {
                    path: path.to_path_buf(),
                    reason: "does not exist",
                });
            }
        }

        if !path.is_dir() {
            return Err(StoreError::InvalidDirectory {
                path: path.to_path_buf(),
                reason: "not a directory",
            });
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Root of the outbox directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the primary queue log.
    #[must_use]
    pub fn queue_path(&self) -> PathBuf {
        self.path.join(QUEUE_FILE)
    }

    /// Path of the dead-letter log.
    #[must_use]
    pub fn dead_letter_path(&self) -> PathBuf {
        self.path.join(DEAD_LETTER_FILE)
    }

    /// Opens the primary queue, replaying its log.
    pub fn open_queue(&self) -> StoreResult<LogQueueStore> {
        LogQueueStore::open(Box::new(FileBackend::open(&self.queue_path())?))
    }

    /// Opens the dead-letter store, replaying its log.
    pub fn open_dead_letters(&self) -> StoreResult<LogDeadLetterStore> {
        LogDeadLetterStore::open(Box::new(FileBackend::open(&self.dead_letter_path())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_layout() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("outbox");
        let dir = OutboxDir::open(&path, true).unwrap();
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.queue_path(), path.join("queue.log"));
        assert_eq!(dir.dead_letter_path(), path.join("dead_letters.log"));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let tmp = tempdir().unwrap();
        let err = OutboxDir::open(&tmp.path().join("nope"), false).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDirectory { .. }));
    }

    #[test]
    fn second_open_is_locked() {
        let tmp = tempdir().unwrap();
        let _first = OutboxDir::open(tmp.path(), true).unwrap();
        let second = OutboxDir::open(tmp.path(), true);
        assert!(matches!(second, Err(StoreError::Locked(_))));
    }

    #[test]
    fn lock_released_on_drop() {
        let tmp = tempdir().unwrap();
        drop(OutboxDir::open(tmp.path(), true).unwrap());
        assert!(OutboxDir::open(tmp.path(), true).is_ok());
    }
}
