//! Commit coordination.
//!
//! A commit moves a document from idle to committing and back. The
//! document's commit lock is the committing state; it is held while the
//! server changes since the baseline are collected, checked against the
//! client's changes and, if nothing conflicts, appended as a new bundle.

use crate::config::ServerConfig;
use crate::document::ServerDocument;
use crate::error::{ServerError, ServerResult};
use revisor_history::{
    detect_conflicts, ChangeMetadata, CommitBundle, CommitOutcome, DetachedSnapshot, Document,
    DocumentRevision, HistoryError, RevisionBundle, UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serializes and validates commits.
#[derive(Debug)]
pub struct CommitCoordinator {
    lock_timeout: Duration,
    checkpoint_interval: u64,
    shutting_down: AtomicBool,
}

impl CommitCoordinator {
    /// Creates a coordinator from the server configuration.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            lock_timeout: config.commit_lock_timeout,
            checkpoint_interval: config.checkpoint_interval,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Returns true once shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Refuses every commit from now on.
    ///
    /// Commits already holding their document's lock run to completion.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    /// Applies `commit` to `document` on behalf of `author`.
    ///
    /// # Errors
    ///
    /// - [`ServerError::ShuttingDown`] once shutdown has begun
    /// - [`ServerError::Busy`] if the commit lock is not acquired in time
    /// - [`HistoryError::Range`] if the baseline is past the head
    /// - [`ServerError::Conflict`] if changes since the baseline touch the
    ///   same keys
    /// - [`HistoryError::Replay`] if the changes do not apply at head
    /// - [`ServerError::Storage`] if the bundle cannot be persisted
    ///
    /// On any error the document is unchanged.
    pub fn commit(
        &self,
        document: &ServerDocument,
        author: UserId,
        commit: CommitBundle,
    ) -> ServerResult<CommitOutcome> {
        if self.is_shutting_down() {
            return Err(ServerError::ShuttingDown);
        }

        let Some(_guard) = document.commit_lock().try_lock_for(self.lock_timeout) else {
            tracing::warn!(
                document = %document.id(),
                timeout_ms = self.lock_timeout.as_millis() as u64,
                "commit lock timed out"
            );
            return Err(ServerError::Busy(document.id().to_string()));
        };

        // Shutdown may have started while we waited for the lock.
        if self.is_shutting_down() {
            return Err(ServerError::ShuttingDown);
        }

        let head = document.head_revision();
        if commit.baseline > head {
            return Err(HistoryError::Range {
                from: commit.baseline,
                to: head.next(),
                start: DocumentRevision::START,
                head,
            }
            .into());
        }

        let delta = document.crop_changes(commit.baseline.next(), head.next())?;
        let server_changes = delta.get_changes(&DetachedSnapshot)?;
        let conflicts = detect_conflicts(&commit.changes, &server_changes);
        if !conflicts.is_empty() {
            tracing::warn!(
                document = %document.id(),
                author = %author,
                baseline = %commit.baseline,
                head = %head,
                conflicts = conflicts.len(),
                "commit rejected"
            );
            return Err(ServerError::Conflict { conflicts });
        }

        let revision = head.next();
        let mut snapshot = document.head_snapshot();
        snapshot
            .apply_changes(&commit.changes)
            .map_err(|source| HistoryError::Replay { revision, source })?;

        let metadata = ChangeMetadata::new(author, commit.comment);
        let changes = commit.changes.len();
        let bundle = Arc::new(RevisionBundle::new(revision, metadata.clone(), commit.changes));
        document.accept(bundle, snapshot, self.checkpoint_interval)?;

        tracing::info!(
            document = %document.id(),
            author = %metadata.author,
            baseline = %commit.baseline,
            revision = %revision,
            changes,
            "commit accepted"
        );
        Ok(CommitOutcome { revision, metadata })
    }
}
