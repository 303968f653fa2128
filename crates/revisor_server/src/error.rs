//! Error types for the version server.

use revisor_history::{ChangeOperation, DocumentRevision, ErrorKind, ErrorResponse, HistoryError};
use revisor_storage::StorageError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the version server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authorization failed.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The commit touches keys changed since its baseline.
    #[error("commit rejected: {} conflicting change(s)", .conflicts.len())]
    Conflict {
        /// The client's conflicting operations.
        conflicts: Vec<ChangeOperation>,
    },

    /// The document's commit lock was not acquired in time.
    #[error("document {0} is busy")]
    Busy(String),

    /// The server is shutting down.
    #[error("server is shutting down")]
    ShuttingDown,

    /// No document with that id.
    #[error("unknown document: {0}")]
    UnknownDocument(String),

    /// A document with that id already exists.
    #[error("document already exists: {0}")]
    DocumentExists(String),

    /// No checkpoint at or below the requested revision.
    #[error("no checkpoint at or below revision {0}")]
    NoCheckpoint(DocumentRevision),

    /// History error.
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if the caller can fix the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::NotAuthorized(_)
                | ServerError::Conflict { .. }
                | ServerError::UnknownDocument(_)
                | ServerError::DocumentExists(_)
                | ServerError::NoCheckpoint(_)
                | ServerError::History(_)
        )
    }

    /// Returns true if the failure is on the server side.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::Busy(_)
                | ServerError::ShuttingDown
                | ServerError::Storage(_)
                | ServerError::Internal(_)
        )
    }

    /// Wire error class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ServerError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            ServerError::Conflict { .. } => ErrorKind::Conflict,
            ServerError::Busy(_) => ErrorKind::Busy,
            ServerError::ShuttingDown => ErrorKind::ShuttingDown,
            ServerError::UnknownDocument(_) => ErrorKind::UnknownDocument,
            ServerError::DocumentExists(_) => ErrorKind::DocumentExists,
            ServerError::NoCheckpoint(_) => ErrorKind::NotFound,
            ServerError::History(HistoryError::Range { .. }) => ErrorKind::Range,
            ServerError::History(HistoryError::NotFound(_)) => ErrorKind::NotFound,
            ServerError::History(_) => ErrorKind::InvalidRequest,
            ServerError::Storage(_) => ErrorKind::Storage,
            ServerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Converts the error into its wire form.
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            ServerError::Conflict { conflicts } => ErrorResponse::conflict(conflicts.clone()),
            other => ErrorResponse::new(other.kind(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisor_history::Statement;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(ServerError::Busy("doc".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn conflict_response_keeps_operations() {
        let op = ChangeOperation::RemoveStatement(Statement::new("S1"));
        let err = ServerError::Conflict {
            conflicts: vec![op.clone()],
        };
        assert!(err.to_string().contains('1'));

        let resp = err.to_response();
        assert_eq!(resp.kind, ErrorKind::Conflict);
        assert_eq!(resp.conflicts, vec![op]);
    }

    #[test]
    fn history_errors_map_to_kinds() {
        let range = ServerError::from(HistoryError::Range {
            from: DocumentRevision::new(4),
            to: DocumentRevision::new(9),
            start: DocumentRevision::START,
            head: DocumentRevision::new(3),
        });
        assert_eq!(range.kind(), ErrorKind::Range);

        let missing = ServerError::from(HistoryError::NotFound(DocumentRevision::new(8)));
        assert_eq!(missing.to_response().kind, ErrorKind::NotFound);
    }
}
