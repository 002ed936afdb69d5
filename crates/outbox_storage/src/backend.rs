//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// The outbox record logs sit on top of this trait. A backend never
/// interprets the bytes it holds.
///
/// # Invariants
///
/// - `append` returns the offset where the data starts
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `sync` returns, every appended byte survives a process crash
/// - `replace` swaps the whole content atomically: a crash leaves either
///   the old or the new content, never a mix
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not fully
    /// inside the stored data.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end and returns its starting offset.
    ///
    /// The data is not guaranteed durable until [`StorageBackend::sync`].
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Makes all appended data durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Drops everything after `new_size`.
    ///
    /// Used to cut a torn record off the tail after a crash.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the whole content with `data` and makes it durable.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Appends and syncs in one step.
    fn append_synced(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.append(data)?;
        self.sync()?;
        Ok(offset)
    }
}
