//! Error types for client sessions.

use revisor_history::{ChangeOperation, CodecError, ErrorKind, ErrorResponse, HistoryError, ReplayError};
use revisor_storage::StorageError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in a client session.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// The transport is closed.
    #[error("not connected to server")]
    NotConnected,

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Unexpected or malformed reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected the credential.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The commit conflicts with changes accepted since the baseline.
    #[error("commit rejected: {} conflicting change(s)", .conflicts.len())]
    Conflict {
        /// The local operations that conflict.
        conflicts: Vec<ChangeOperation>,
    },

    /// The server could not take the document's commit lock in time.
    #[error("document busy: {0}")]
    Busy(String),

    /// The server is shutting down.
    #[error("server is shutting down")]
    ShuttingDown,

    /// The server does not know the document.
    #[error("unknown document: {0}")]
    UnknownDocument(String),

    /// A document with that id already exists.
    #[error("document already exists: {0}")]
    DocumentExists(String),

    /// Revision bounds outside the server history.
    #[error("revision out of range: {0}")]
    Range(String),

    /// The revision or checkpoint does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the request as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server failed internally.
    #[error("server error: {0}")]
    Server(String),

    /// The session has no local copy of the document.
    #[error("document not tracked: {0}")]
    NotTracked(String),

    /// A change could not be applied to the local document.
    #[error("local change rejected: {0}")]
    Replay(#[from] ReplayError),

    /// History error.
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the request can be retried.
    ///
    /// Authorization failures and conflicts are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Timeout | ClientError::Busy(_) | ClientError::Server(_) => true,
            _ => false,
        }
    }

    /// Returns the conflicting operations of a rejected commit.
    pub fn conflicts(&self) -> Option<&[ChangeOperation]> {
        match self {
            ClientError::Conflict { conflicts } => Some(conflicts),
            _ => None,
        }
    }
}

impl From<ErrorResponse> for ClientError {
    fn from(response: ErrorResponse) -> Self {
        let message = response.message;
        match response.kind {
            ErrorKind::NotAuthorized => ClientError::NotAuthorized(message),
            ErrorKind::Conflict => ClientError::Conflict {
                conflicts: response.conflicts,
            },
            ErrorKind::Busy => ClientError::Busy(message),
            ErrorKind::ShuttingDown => ClientError::ShuttingDown,
            ErrorKind::UnknownDocument => ClientError::UnknownDocument(message),
            ErrorKind::DocumentExists => ClientError::DocumentExists(message),
            ErrorKind::Range => ClientError::Range(message),
            ErrorKind::NotFound => ClientError::NotFound(message),
            ErrorKind::InvalidRequest => ClientError::InvalidRequest(message),
            ErrorKind::Storage | ErrorKind::Internal => ClientError::Server(message),
        }
    }
}
