//! Error types for history operations.

use crate::revision::DocumentRevision;
use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// A change could not be applied to a document snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The change removes a statement the document does not contain.
    #[error("statement not present: {0}")]
    MissingStatement(String),

    /// The change removes an import the document does not declare.
    #[error("import not present: {0}")]
    MissingImport(String),

    /// The change removes an annotation the document does not carry.
    #[error("annotation not present: {0}")]
    MissingAnnotation(String),
}

/// Errors that can occur while reading or mutating a change history.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Invalid revision bounds.
    #[error("invalid revision range [{from}, {to}) for history [{start}, {head}]")]
    Range {
        /// Requested lower bound (inclusive).
        from: DocumentRevision,
        /// Requested upper bound (exclusive).
        to: DocumentRevision,
        /// First revision held by the history.
        start: DocumentRevision,
        /// Head revision of the history.
        head: DocumentRevision,
    },

    /// No bundle exists for the revision.
    #[error("revision {0} not found")]
    NotFound(DocumentRevision),

    /// A bundle was appended out of order.
    #[error("non-contiguous bundle: expected revision {expected}, got {actual}")]
    NonContiguous {
        /// The revision the history expected next.
        expected: DocumentRevision,
        /// The revision carried by the bundle.
        actual: DocumentRevision,
    },

    /// Replaying a bundle against a snapshot failed.
    #[error("replay failed at revision {revision}: {source}")]
    Replay {
        /// Revision of the bundle being replayed.
        revision: DocumentRevision,
        /// Underlying document error.
        #[source]
        source: ReplayError,
    },
}

/// Errors from encoding or decoding CBOR payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a value.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// Failed to decode bytes.
    #[error("decoding failed: {0}")]
    DecodingFailed(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
