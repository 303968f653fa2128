//! Protocol messages exchanged between clients and the version server.

use crate::change::ChangeOperation;
use crate::codec::{from_cbor, to_cbor};
use crate::commit::{CommitBundle, CommitOutcome};
use crate::document::StatementDocument;
use crate::error::CodecResult;
use crate::history::RevisionBundle;
use crate::log_cache::RevisionLogEntry;
use crate::revision::DocumentRevision;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque credential presented with every request.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// Summary of a registered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Document id.
    pub id: String,
    /// Description given at creation.
    pub description: String,
    /// Current head revision.
    pub head: DocumentRevision,
}

/// A full document snapshot at a known revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Revision the snapshot reflects.
    pub revision: DocumentRevision,
    /// The snapshot.
    pub document: StatementDocument,
}

/// Request to register a new, empty document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    /// Caller credential.
    pub token: AuthToken,
    /// Id of the new document.
    pub document_id: String,
    /// Free-text description.
    pub description: String,
}

/// Request to commit changes to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Caller credential.
    pub token: AuthToken,
    /// Target document.
    pub document_id: String,
    /// The proposed commit.
    pub commit: CommitBundle,
}

/// Request naming a document and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRequest {
    /// Caller credential.
    pub token: AuthToken,
    /// Target document.
    pub document_id: String,
}

/// Request for the bundles in `(after, through]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchChangesRequest {
    /// Caller credential.
    pub token: AuthToken,
    /// Target document.
    pub document_id: String,
    /// Exclusive lower bound.
    pub after: DocumentRevision,
    /// Inclusive upper bound.
    pub through: DocumentRevision,
}

/// Bundles returned for a fetch.
///
/// The server may return fewer bundles than requested; the client asks
/// again from the last revision it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchChangesResponse {
    /// Contiguous bundles starting at `after + 1`.
    pub bundles: Vec<RevisionBundle>,
    /// Server head at the time of the fetch.
    pub head: DocumentRevision,
}

/// Request for the latest checkpoint at or below `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRequest {
    /// Caller credential.
    pub token: AuthToken,
    /// Target document.
    pub document_id: String,
    /// Upper bound for the checkpoint revision.
    pub target: DocumentRevision,
}

/// Request for the metadata of one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionLogRequest {
    /// Caller credential.
    pub token: AuthToken,
    /// Target document.
    pub document_id: String,
    /// The revision.
    pub revision: DocumentRevision,
}

/// Request for the most recent revision metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRevisionLogRequest {
    /// Caller credential.
    pub token: AuthToken,
    /// Target document.
    pub document_id: String,
    /// Number of entries wanted.
    pub limit: u32,
}

/// Request for the registered documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDocumentsRequest {
    /// Caller credential.
    pub token: AuthToken,
}

/// Error classes that cross the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Credential missing, invalid or expired.
    NotAuthorized,
    /// The commit conflicts with accepted changes.
    Conflict,
    /// The document's commit lock could not be acquired in time.
    Busy,
    /// The server is shutting down.
    ShuttingDown,
    /// No such document.
    UnknownDocument,
    /// A document with that id already exists.
    DocumentExists,
    /// Revision bounds outside the history.
    Range,
    /// The requested revision or checkpoint does not exist.
    NotFound,
    /// Malformed request.
    InvalidRequest,
    /// Server-side storage failure.
    Storage,
    /// Any other server failure.
    Internal,
}

/// Error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error class.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Conflicting client operations, for [`ErrorKind::Conflict`].
    pub conflicts: Vec<ChangeOperation>,
}

impl ErrorResponse {
    /// Creates an error response without conflicts.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            conflicts: Vec::new(),
        }
    }

    /// Creates a conflict response.
    pub fn conflict(conflicts: Vec<ChangeOperation>) -> Self {
        Self {
            kind: ErrorKind::Conflict,
            message: format!("commit rejected: {} conflicting change(s)", conflicts.len()),
            conflicts,
        }
    }
}

/// A version protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionMessage {
    /// Create a document.
    CreateProject(CreateProjectRequest),
    /// Document created.
    ProjectCreated(DocumentInfo),
    /// Commit changes.
    Commit(CommitRequest),
    /// Commit accepted.
    Committed(CommitOutcome),
    /// Ask for the head revision.
    Head(HeadRequest),
    /// Head revision.
    HeadRevision(DocumentRevision),
    /// Fetch bundles.
    FetchChanges(FetchChangesRequest),
    /// Fetched bundles.
    Changes(FetchChangesResponse),
    /// Ask for a checkpoint.
    LatestCheckpoint(CheckpointRequest),
    /// A checkpoint.
    Checkpoint(Checkpoint),
    /// Ask for one revision's metadata.
    RevisionLog(RevisionLogRequest),
    /// One revision's metadata.
    RevisionLogEntry(RevisionLogEntry),
    /// Ask for recent revision metadata.
    LatestRevisionLog(LatestRevisionLogRequest),
    /// Recent revision metadata, oldest first.
    RevisionLogEntries(Vec<RevisionLogEntry>),
    /// Ask for the registered documents.
    ListDocuments(ListDocumentsRequest),
    /// Registered documents.
    Documents(Vec<DocumentInfo>),
    /// Error reply.
    Error(ErrorResponse),
}

impl VersionMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            VersionMessage::CreateProject(_) => 1,
            VersionMessage::ProjectCreated(_) => 2,
            VersionMessage::Commit(_) => 3,
            VersionMessage::Committed(_) => 4,
            VersionMessage::Head(_) => 5,
            VersionMessage::HeadRevision(_) => 6,
            VersionMessage::FetchChanges(_) => 7,
            VersionMessage::Changes(_) => 8,
            VersionMessage::LatestCheckpoint(_) => 9,
            VersionMessage::Checkpoint(_) => 10,
            VersionMessage::RevisionLog(_) => 11,
            VersionMessage::RevisionLogEntry(_) => 12,
            VersionMessage::LatestRevisionLog(_) => 13,
            VersionMessage::RevisionLogEntries(_) => 14,
            VersionMessage::ListDocuments(_) => 15,
            VersionMessage::Documents(_) => 16,
            VersionMessage::Error(_) => 255,
        }
    }

    /// Returns true for client-to-server messages.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            VersionMessage::CreateProject(_)
                | VersionMessage::Commit(_)
                | VersionMessage::Head(_)
                | VersionMessage::FetchChanges(_)
                | VersionMessage::LatestCheckpoint(_)
                | VersionMessage::RevisionLog(_)
                | VersionMessage::LatestRevisionLog(_)
                | VersionMessage::ListDocuments(_)
        )
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
