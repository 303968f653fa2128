//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store underneath a history file.
///
/// Backends are **opaque byte stores**. They read, append and flush bytes
/// and know nothing about history records; [`crate::HistoryStore`] owns the
/// record framing.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `flush` pushes appended data towards durable storage
/// - `truncate` only ever shortens; it discards a failed append
/// - Backends must be `Send + Sync`; stores are shared across commit threads
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the read extends past
    /// the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, which is where the next `append`
    /// will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Waits until written data reaches durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Shortens the storage to `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` is past the current size or the I/O fails.
    fn truncate(&mut self, len: u64) -> StorageResult<()>;
}
