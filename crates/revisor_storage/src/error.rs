//! Error types for storage operations.

use revisor_history::{CodecError, DocumentRevision};
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The history file does not exist yet.
    #[error("history file not found: {0}")]
    NotFound(String),

    /// The history file exists but cannot be read back.
    #[error("invalid history file {name}: {reason}")]
    InvalidHistoryFile {
        /// File or store name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A record was appended out of revision order.
    #[error("out-of-order record: expected revision {expected}, got {actual}")]
    OutOfOrder {
        /// The revision the store expected next.
        expected: DocumentRevision,
        /// The revision carried by the record.
        actual: DocumentRevision,
    },

    /// A record could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StorageError {
    /// Creates an invalid-file error.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHistoryFile {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error means the file is missing rather than broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
