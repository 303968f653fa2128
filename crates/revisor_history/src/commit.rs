//! Commit requests and their outcome.

use crate::change::{ChangeMetadata, ChangeOperation};
use crate::revision::DocumentRevision;
use serde::{Deserialize, Serialize};

/// A client's proposed commit.
///
/// `baseline` is the revision the client's changes were made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBundle {
    /// Revision the changes were made against.
    pub baseline: DocumentRevision,
    /// Changes in application order.
    pub changes: Vec<ChangeOperation>,
    /// Commit comment.
    pub comment: String,
}

impl CommitBundle {
    /// Creates a commit bundle.
    pub fn new(
        baseline: DocumentRevision,
        changes: Vec<ChangeOperation>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            baseline,
            changes,
            comment: comment.into(),
        }
    }

    /// Returns true if the bundle carries no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Result of an accepted commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// The new head revision.
    pub revision: DocumentRevision,
    /// Metadata recorded for it.
    pub metadata: ChangeMetadata,
}
