//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for the operation log.
///
/// Storage backends are **opaque byte stores**. The store owns all
/// record framing and interpretation - backends do not understand
/// frames, commands, or statuses.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` ensures all appended data survives process termination
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current
    /// size or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to the OS.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// After this returns successfully, all previously appended data is
    /// guaranteed to survive process termination.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to the given size.
    ///
    /// Used to discard a torn frame at the log tail after recovery and
    /// to rewrite the log during compaction.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size
    /// or the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
