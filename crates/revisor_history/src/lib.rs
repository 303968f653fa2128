//! # Revisor History
//!
//! Revision history, conflict detection and protocol types for Revisor.
//!
//! This crate provides:
//! - `DocumentRevision` and `ChangeOperation` for addressing and editing documents
//! - `ChangeHistory`, the append-only log of revision bundles
//! - `detect_conflicts` for commit-time conflict checks
//! - `RevisionLogCache` for recent revision metadata
//! - Protocol messages and their CBOR codec
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod codec;
mod commit;
mod conflict;
mod document;
mod error;
mod history;
mod log_cache;
mod messages;
mod revision;

pub use change::{
    Annotation, ChangeCategory, ChangeMetadata, ChangeOperation, DocumentIdentity, Import,
    Statement, UserId,
};
pub use codec::{from_cbor, to_cbor};
pub use commit::{CommitBundle, CommitOutcome};
pub use conflict::{detect_conflicts, CollectedChanges, LastWriters};
pub use document::{DetachedSnapshot, Document, StatementDocument};
pub use error::{CodecError, CodecResult, HistoryError, HistoryResult, ReplayError};
pub use history::{ChangeHistory, RevisionBundle};
pub use log_cache::{RevisionLogCache, RevisionLogEntry, REVISION_LOG_CACHE_SIZE};
pub use messages::{
    AuthToken, Checkpoint, CheckpointRequest, CommitRequest, CreateProjectRequest, DocumentInfo,
    ErrorKind, ErrorResponse, FetchChangesRequest, FetchChangesResponse, HeadRequest,
    LatestRevisionLogRequest, ListDocumentsRequest, RevisionLogRequest, VersionMessage,
};
pub use revision::DocumentRevision;
