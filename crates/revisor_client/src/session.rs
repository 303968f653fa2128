//! Client sync session.
//!
//! A session keeps a local copy of every document it has checked out:
//! the live document, the revision it was last synchronized to and the
//! edits made since. `update` moves the copy forward with server changes,
//! `commit` submits the local edits with the local revision as baseline.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::VersionTransport;
use revisor_history::{
    ChangeHistory, ChangeOperation, CheckpointRequest, CommitBundle, CommitRequest,
    CreateProjectRequest, Document, DocumentInfo, DocumentRevision, FetchChangesRequest,
    HeadRequest, HistoryError, LatestRevisionLogRequest, ListDocumentsRequest, RevisionBundle,
    RevisionLogCache, RevisionLogEntry, RevisionLogRequest, StatementDocument, VersionMessage,
};
use revisor_storage::HistoryStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Local state of one checked-out document.
///
/// `local_history` always ends at `local_revision`; it starts after the
/// checkpoint the document was checked out from.
#[derive(Debug, Clone)]
pub struct VersionedDocument {
    document: StatementDocument,
    local_revision: DocumentRevision,
    local_changes: Vec<ChangeOperation>,
    local_history: ChangeHistory,
    log_cache: RevisionLogCache,
    history_dirty: bool,
}

impl VersionedDocument {
    fn checked_out(document: StatementDocument, history: ChangeHistory) -> Self {
        Self {
            document,
            local_revision: history.head_revision(),
            local_changes: Vec::new(),
            log_cache: RevisionLogCache::from_history(&history),
            local_history: history,
            history_dirty: true,
        }
    }

    /// Returns the live document, local edits included.
    pub fn document(&self) -> &StatementDocument {
        &self.document
    }

    /// Returns the revision the document was last synchronized to.
    pub fn local_revision(&self) -> DocumentRevision {
        self.local_revision
    }

    /// Returns the uncommitted local edits, in the order they were made.
    pub fn local_changes(&self) -> &[ChangeOperation] {
        &self.local_changes
    }

    /// Returns true if there are uncommitted local edits.
    pub fn has_local_changes(&self) -> bool {
        !self.local_changes.is_empty()
    }

    /// Returns the bundles received since checkout.
    pub fn local_history(&self) -> &ChangeHistory {
        &self.local_history
    }

    /// Returns the metadata of the most recent local revisions.
    pub fn revision_log(&self) -> &RevisionLogCache {
        &self.log_cache
    }

    /// Returns true if the local history changed since it was last saved.
    pub fn is_history_dirty(&self) -> bool {
        self.history_dirty
    }

    /// Applies server bundles and, after them, the bundle of our own commit.
    ///
    /// Works on copies; on error nothing changes.
    fn advance(
        &mut self,
        remote: Vec<RevisionBundle>,
        committed: Option<RevisionBundle>,
    ) -> ClientResult<()> {
        let mut document = self.document.clone();
        let mut history = self.local_history.clone();
        let mut new_entries = Vec::new();

        for bundle in remote {
            document
                .apply_changes(&bundle.changes)
                .map_err(|source| HistoryError::Replay {
                    revision: bundle.revision,
                    source,
                })?;
            new_entries.push((bundle.revision, bundle.metadata.clone()));
            history.append_bundle(Arc::new(bundle))?;
        }
        if let Some(bundle) = committed {
            // already applied to the live document
            new_entries.push((bundle.revision, bundle.metadata.clone()));
            history.append_bundle(Arc::new(bundle))?;
            self.local_changes.clear();
        }

        if !new_entries.is_empty() {
            self.history_dirty = true;
        }
        for (revision, metadata) in new_entries {
            self.log_cache.push(revision, metadata);
        }
        self.local_revision = history.head_revision();
        self.local_history = history;
        self.document = document;
        Ok(())
    }
}

/// A client session against one version server.
///
/// # Example
///
/// ```
/// use revisor_client::{ClientConfig, ClientSyncSession, LoopbackTransport};
/// use revisor_history::{AuthToken, ChangeOperation, DocumentRevision, Statement};
/// use revisor_server::{ServerConfig, VersionServer};
/// use std::sync::Arc;
///
/// let server = Arc::new(VersionServer::open(ServerConfig::default()).unwrap());
/// let mut session = ClientSyncSession::new(
///     ClientConfig::new(AuthToken::new("alice")),
///     LoopbackTransport::new(server),
/// );
///
/// session.create_project("pizza", "Pizza ontology").unwrap();
/// session.checkout("pizza", DocumentRevision::ZERO).unwrap();
/// session
///     .apply_local_change("pizza", ChangeOperation::AddStatement(Statement::new("S1")))
///     .unwrap();
/// let revision = session.commit("pizza", "add S1").unwrap();
/// assert_eq!(revision, DocumentRevision::START);
/// ```
pub struct ClientSyncSession<T: VersionTransport> {
    config: ClientConfig,
    transport: T,
    documents: HashMap<String, VersionedDocument>,
}

impl<T: VersionTransport> ClientSyncSession<T> {
    /// Creates a session.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            documents: HashMap::new(),
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the local copy of a document, if it is tracked.
    pub fn document(&self, document_id: &str) -> Option<&VersionedDocument> {
        self.documents.get(document_id)
    }

    /// Returns true if the session tracks the document.
    pub fn is_tracked(&self, document_id: &str) -> bool {
        self.documents.contains_key(document_id)
    }

    /// Stops tracking a document and returns its local state.
    pub fn untrack(&mut self, document_id: &str) -> Option<VersionedDocument> {
        self.documents.remove(document_id)
    }

    /// Registers a new document on the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DocumentExists`] if the id is taken.
    pub fn create_project(&self, document_id: &str, description: &str) -> ClientResult<DocumentInfo> {
        let request = VersionMessage::CreateProject(CreateProjectRequest {
            token: self.config.token.clone(),
            document_id: document_id.to_string(),
            description: description.to_string(),
        });
        match self.send(&request)? {
            VersionMessage::ProjectCreated(info) => Ok(info),
            other => Err(unexpected(&other)),
        }
    }

    /// Lists the documents registered on the server.
    pub fn list_documents(&self) -> ClientResult<Vec<DocumentInfo>> {
        let request = VersionMessage::ListDocuments(ListDocumentsRequest {
            token: self.config.token.clone(),
        });
        match self.read(&request)? {
            VersionMessage::Documents(documents) => Ok(documents),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the server head revision of a document.
    pub fn head_revision(&self, document_id: &str) -> ClientResult<DocumentRevision> {
        let request = VersionMessage::Head(HeadRequest {
            token: self.config.token.clone(),
            document_id: document_id.to_string(),
        });
        match self.read(&request)? {
            VersionMessage::HeadRevision(head) => Ok(head),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the server metadata of one revision.
    pub fn revision_log(
        &self,
        document_id: &str,
        revision: DocumentRevision,
    ) -> ClientResult<RevisionLogEntry> {
        let request = VersionMessage::RevisionLog(RevisionLogRequest {
            token: self.config.token.clone(),
            document_id: document_id.to_string(),
            revision,
        });
        match self.read(&request)? {
            VersionMessage::RevisionLogEntry(entry) => Ok(entry),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the server metadata of up to `n` recent revisions, oldest
    /// first.
    pub fn latest_revision_log(
        &self,
        document_id: &str,
        n: usize,
    ) -> ClientResult<Vec<RevisionLogEntry>> {
        let request = VersionMessage::LatestRevisionLog(LatestRevisionLogRequest {
            token: self.config.token.clone(),
            document_id: document_id.to_string(),
            limit: u32::try_from(n).unwrap_or(u32::MAX),
        });
        match self.read(&request)? {
            VersionMessage::RevisionLogEntries(entries) => Ok(entries),
            other => Err(unexpected(&other)),
        }
    }

    /// Materializes a document at `target`.
    ///
    /// Starts from the latest server checkpoint at or below `target` and
    /// replays the bundles after it. The session's tracked state is not
    /// touched.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotFound`] if no checkpoint exists at or below `target`
    /// - [`ClientError::Range`] if `target` is past the server head
    pub fn pull(&self, document_id: &str, target: DocumentRevision) -> ClientResult<StatementDocument> {
        self.materialize(document_id, target).map(|(document, _)| document)
    }

    /// Pulls a document at `target` and starts tracking it.
    ///
    /// Replaces any state the session already had for the document,
    /// uncommitted edits included.
    ///
    /// # Errors
    ///
    /// Same as [`pull`](Self::pull).
    pub fn checkout(
        &mut self,
        document_id: &str,
        target: DocumentRevision,
    ) -> ClientResult<&VersionedDocument> {
        let (document, history) = self.materialize(document_id, target)?;
        let versioned = VersionedDocument::checked_out(document, history);
        if let Some(previous) = self.documents.insert(document_id.to_string(), versioned) {
            if previous.has_local_changes() {
                tracing::warn!(
                    document = %document_id,
                    discarded = previous.local_changes.len(),
                    "checkout discarded local changes"
                );
            }
        }
        tracing::info!(document = %document_id, revision = %target, "checked out");
        self.tracked(document_id)
    }

    /// Applies an edit to the live local document and records it for the
    /// next commit.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotTracked`] if the document is not checked out
    /// - [`ClientError::Replay`] if the edit does not apply; nothing changes
    pub fn apply_local_change(&mut self, document_id: &str, change: ChangeOperation) -> ClientResult<()> {
        let versioned = self.tracked_mut(document_id)?;
        versioned.document.apply_change(&change)?;
        versioned.local_changes.push(change);
        Ok(())
    }

    /// Moves the local copy forward to `target`, or to the server head.
    ///
    /// Uncommitted local edits are kept. Returns the new local revision; a
    /// target at or below the local revision is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotTracked`] if the document is not checked out
    /// - [`ClientError::Range`] if `target` is past the server head
    /// - [`ClientError::History`] if server changes do not apply on top of
    ///   the local edits; nothing changes
    pub fn update(
        &mut self,
        document_id: &str,
        target: Option<DocumentRevision>,
    ) -> ClientResult<DocumentRevision> {
        let local = self.tracked(document_id)?.local_revision;
        let target = match target {
            Some(target) => target,
            None => self.head_revision(document_id)?,
        };
        if target <= local {
            return Ok(local);
        }

        let bundles = self.fetch_range(document_id, local, target)?;
        self.tracked_mut(document_id)?.advance(bundles, None)?;
        tracing::info!(document = %document_id, from = %local, to = %target, "updated");
        Ok(target)
    }

    /// Commits the local edits with the local revision as baseline.
    ///
    /// On success the local revision becomes the new revision and the local
    /// edits are cleared. Revisions other clients committed between the
    /// baseline and the new revision are fetched and applied, so the local
    /// document matches the server at the new revision.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotTracked`] if the document is not checked out
    /// - [`ClientError::Conflict`] with the conflicting local operations;
    ///   the local state is unchanged
    ///
    /// If the commit is accepted but the skipped revisions cannot be
    /// fetched or applied, the document is untracked and the error is
    /// returned; check it out again.
    pub fn commit(&mut self, document_id: &str, comment: &str) -> ClientResult<DocumentRevision> {
        let (baseline, changes) = {
            let versioned = self.tracked(document_id)?;
            (versioned.local_revision, versioned.local_changes.clone())
        };

        let request = VersionMessage::Commit(CommitRequest {
            token: self.config.token.clone(),
            document_id: document_id.to_string(),
            commit: CommitBundle::new(baseline, changes.clone(), comment),
        });
        let outcome = match self.send(&request) {
            Ok(VersionMessage::Committed(outcome)) => outcome,
            Ok(other) => return Err(unexpected(&other)),
            Err(e) => {
                if let Some(conflicts) = e.conflicts() {
                    tracing::warn!(
                        document = %document_id,
                        baseline = %baseline,
                        conflicts = conflicts.len(),
                        "commit rejected"
                    );
                }
                return Err(e);
            }
        };

        let revision = outcome.revision;
        let own = RevisionBundle::new(revision, outcome.metadata, changes);
        let skipped_through = DocumentRevision::new(revision.as_u64().saturating_sub(1));
        let result = self
            .fetch_range(document_id, baseline, skipped_through)
            .and_then(|skipped| self.tracked_mut(document_id)?.advance(skipped, Some(own)));

        if let Err(e) = result {
            tracing::warn!(
                document = %document_id,
                revision = %revision,
                error = %e,
                "committed but could not catch up; untracking"
            );
            self.documents.remove(document_id);
            return Err(e);
        }

        tracing::info!(document = %document_id, baseline = %baseline, revision = %revision, "committed");
        Ok(revision)
    }

    /// Saves the local history of a document to `store`.
    ///
    /// Nothing is written unless the history changed since the last save or
    /// the store is empty. Bundles already in the store are skipped.
    /// Returns true if the store was written.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotTracked`] or a storage error; on a storage
    /// error the history stays dirty.
    pub fn save_local_history(&mut self, document_id: &str, store: &HistoryStore) -> ClientResult<bool> {
        let versioned = self.tracked_mut(document_id)?;
        if !versioned.history_dirty && !store.is_empty() {
            return Ok(false);
        }

        let stored = store.head_revision();
        let mut written = 0usize;
        for bundle in versioned.local_history.iter() {
            if stored.is_some_and(|head| bundle.revision <= head) {
                continue;
            }
            store.append(bundle)?;
            written += 1;
        }
        store.flush_if_dirty()?;
        versioned.history_dirty = false;

        tracing::debug!(document = %document_id, store = %store.name(), written, "saved local history");
        Ok(true)
    }

    fn tracked(&self, document_id: &str) -> ClientResult<&VersionedDocument> {
        self.documents
            .get(document_id)
            .ok_or_else(|| ClientError::NotTracked(document_id.to_string()))
    }

    fn tracked_mut(&mut self, document_id: &str) -> ClientResult<&mut VersionedDocument> {
        self.documents
            .get_mut(document_id)
            .ok_or_else(|| ClientError::NotTracked(document_id.to_string()))
    }

    /// Checkpoint at or below `target`, plus the bundles up to `target`.
    fn materialize(
        &self,
        document_id: &str,
        target: DocumentRevision,
    ) -> ClientResult<(StatementDocument, ChangeHistory)> {
        let request = VersionMessage::LatestCheckpoint(CheckpointRequest {
            token: self.config.token.clone(),
            document_id: document_id.to_string(),
            target,
        });
        let checkpoint = match self.read(&request)? {
            VersionMessage::Checkpoint(checkpoint) => checkpoint,
            other => return Err(unexpected(&other)),
        };
        if checkpoint.revision > target {
            return Err(ClientError::Protocol(format!(
                "checkpoint {} is past target {target}",
                checkpoint.revision
            )));
        }

        let mut document = checkpoint.document;
        let mut history = ChangeHistory::starting_at(checkpoint.revision.next());
        for bundle in self.fetch_range(document_id, checkpoint.revision, target)? {
            document
                .apply_changes(&bundle.changes)
                .map_err(|source| HistoryError::Replay {
                    revision: bundle.revision,
                    source,
                })?;
            history.append_bundle(Arc::new(bundle))?;
        }

        tracing::debug!(
            document = %document_id,
            checkpoint = %checkpoint.revision,
            target = %target,
            replayed = history.len(),
            "materialized document"
        );
        Ok((document, history))
    }

    /// Fetches the bundles in `(after, through]`, across as many requests
    /// as the server's fetch cap needs.
    fn fetch_range(
        &self,
        document_id: &str,
        after: DocumentRevision,
        through: DocumentRevision,
    ) -> ClientResult<Vec<RevisionBundle>> {
        let mut bundles = Vec::new();
        let mut cursor = after;

        while cursor < through {
            let request = VersionMessage::FetchChanges(FetchChangesRequest {
                token: self.config.token.clone(),
                document_id: document_id.to_string(),
                after: cursor,
                through,
            });
            let response = match self.read(&request)? {
                VersionMessage::Changes(response) => response,
                other => return Err(unexpected(&other)),
            };
            if response.bundles.is_empty() {
                return Err(ClientError::Protocol(format!(
                    "no bundles after revision {cursor}"
                )));
            }
            for bundle in response.bundles {
                if bundle.revision != cursor.next() || bundle.revision > through {
                    return Err(ClientError::Protocol(format!(
                        "expected revision {}, got {}",
                        cursor.next(),
                        bundle.revision
                    )));
                }
                cursor = bundle.revision;
                bundles.push(bundle);
            }
        }

        Ok(bundles)
    }

    /// Sends a request once.
    fn send(&self, request: &VersionMessage) -> ClientResult<VersionMessage> {
        match self.transport.exchange(request)? {
            VersionMessage::Error(response) => Err(response.into()),
            reply => Ok(reply),
        }
    }

    /// Sends an idempotent request, retrying transient failures.
    fn read(&self, request: &VersionMessage) -> ClientResult<VersionMessage> {
        let started = Instant::now();
        let mut delays = self.config.retry.delays();
        let mut attempt = 1u32;

        loop {
            let error = match self.send(request) {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };
            let Some(delay) = delays.next() else {
                return Err(error);
            };
            if started.elapsed() + delay > self.config.request_timeout {
                tracing::warn!(attempt, error = %error, "request timed out");
                return Err(ClientError::Timeout);
            }
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying request"
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

impl<T: VersionTransport + std::fmt::Debug> std::fmt::Debug for ClientSyncSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSyncSession")
            .field("transport", &self.transport)
            .field("documents", &self.documents.len())
            .finish_non_exhaustive()
    }
}

fn unexpected(reply: &VersionMessage) -> ClientError {
    ClientError::Protocol(format!("unexpected reply type {}", reply.type_code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::transport::MockTransport;
    use revisor_history::{
        AuthToken, ChangeMetadata, Checkpoint, CommitOutcome, ErrorResponse,
        FetchChangesResponse, Statement, UserId,
    };

    fn add(s: &str) -> ChangeOperation {
        ChangeOperation::AddStatement(Statement::new(s))
    }

    fn bundle(revision: u64, statement: &str) -> RevisionBundle {
        RevisionBundle::new(
            DocumentRevision::new(revision),
            ChangeMetadata::with_timestamp(UserId::new("bob"), revision, statement),
            vec![add(statement)],
        )
    }

    fn session(retry: RetryConfig) -> ClientSyncSession<MockTransport> {
        ClientSyncSession::new(
            ClientConfig::new(AuthToken::new("alice")).with_retry(retry),
            MockTransport::new(),
        )
    }

    fn checkout_empty(session: &mut ClientSyncSession<MockTransport>) {
        session
            .transport()
            .push_reply(VersionMessage::Checkpoint(Checkpoint {
                revision: DocumentRevision::ZERO,
                document: StatementDocument::new(),
            }));
        session.checkout("pizza", DocumentRevision::ZERO).unwrap();
    }

    #[test]
    fn untracked_documents_are_rejected() {
        let mut session = session(RetryConfig::no_retry());
        assert!(matches!(
            session.apply_local_change("pizza", add("S")),
            Err(ClientError::NotTracked(_))
        ));
        assert!(matches!(
            session.update("pizza", None),
            Err(ClientError::NotTracked(_))
        ));
        assert!(matches!(session.commit("pizza", ""), Err(ClientError::NotTracked(_))));
        assert!(session.transport().requests().is_empty());
    }

    #[test]
    fn reads_are_retried() {
        let retry = RetryConfig::new(3)
            .with_initial_delay(std::time::Duration::ZERO)
            .without_jitter();
        let session = session(retry);
        session
            .transport()
            .push_error(ClientError::transport_retryable("reset"));
        session
            .transport()
            .push_reply(VersionMessage::HeadRevision(DocumentRevision::new(4)));

        assert_eq!(session.head_revision("pizza").unwrap(), DocumentRevision::new(4));
        assert_eq!(session.transport().requests().len(), 2);
    }

    #[test]
    fn commits_are_not_retried() {
        let retry = RetryConfig::new(3)
            .with_initial_delay(std::time::Duration::ZERO)
            .without_jitter();
        let mut session = session(retry);
        checkout_empty(&mut session);
        session.apply_local_change("pizza", add("S")).unwrap();

        session
            .transport()
            .push_error(ClientError::transport_retryable("reset"));
        assert!(session.commit("pizza", "c").is_err());
        // checkpoint request plus a single commit attempt
        assert_eq!(session.transport().requests().len(), 2);
        assert_eq!(session.document("pizza").unwrap().local_changes().len(), 1);
    }

    #[test]
    fn conflict_leaves_local_state() {
        let mut session = session(RetryConfig::no_retry());
        checkout_empty(&mut session);
        session.apply_local_change("pizza", add("S1")).unwrap();

        session
            .transport()
            .push_reply(VersionMessage::Error(ErrorResponse::conflict(vec![add("S1")])));
        let err = session.commit("pizza", "c").unwrap_err();
        assert_eq!(err.conflicts(), Some(&[add("S1")][..]));

        let local = session.document("pizza").unwrap();
        assert_eq!(local.local_revision(), DocumentRevision::ZERO);
        assert_eq!(local.local_changes(), &[add("S1")]);
    }

    #[test]
    fn commit_fetches_skipped_revisions() {
        let mut session = session(RetryConfig::no_retry());
        checkout_empty(&mut session);
        session.apply_local_change("pizza", add("S2")).unwrap();

        session
            .transport()
            .push_reply(VersionMessage::Committed(CommitOutcome {
                revision: DocumentRevision::new(2),
                metadata: ChangeMetadata::with_timestamp(UserId::new("alice"), 2, "c"),
            }));
        session
            .transport()
            .push_reply(VersionMessage::Changes(FetchChangesResponse {
                bundles: vec![bundle(1, "S1")],
                head: DocumentRevision::new(2),
            }));

        assert_eq!(session.commit("pizza", "c").unwrap(), DocumentRevision::new(2));
        let local = session.document("pizza").unwrap();
        assert_eq!(local.local_revision(), DocumentRevision::new(2));
        assert!(!local.has_local_changes());
        assert!(local.document().contains_statement(&Statement::new("S1")));
        assert!(local.document().contains_statement(&Statement::new("S2")));
        assert_eq!(local.local_history().len(), 2);
        assert_eq!(local.revision_log().len(), 2);
    }

    #[test]
    fn failed_catch_up_untracks() {
        let mut session = session(RetryConfig::no_retry());
        checkout_empty(&mut session);

        session
            .transport()
            .push_reply(VersionMessage::Committed(CommitOutcome {
                revision: DocumentRevision::new(3),
                metadata: ChangeMetadata::with_timestamp(UserId::new("alice"), 3, "c"),
            }));
        session
            .transport()
            .push_error(ClientError::transport_fatal("gone"));

        assert!(session.commit("pizza", "c").is_err());
        assert!(!session.is_tracked("pizza"));
    }

    #[test]
    fn fetch_rejects_gaps() {
        let mut session = session(RetryConfig::no_retry());
        checkout_empty(&mut session);
        session
            .transport()
            .push_reply(VersionMessage::Changes(FetchChangesResponse {
                bundles: vec![bundle(2, "S2")],
                head: DocumentRevision::new(2),
            }));

        assert!(matches!(
            session.update("pizza", Some(DocumentRevision::new(2))),
            Err(ClientError::Protocol(_))
        ));
        assert_eq!(
            session.document("pizza").unwrap().local_revision(),
            DocumentRevision::ZERO
        );
    }

    #[test]
    fn unexpected_reply_is_protocol_error() {
        let session = session(RetryConfig::no_retry());
        session
            .transport()
            .push_reply(VersionMessage::Documents(Vec::new()));
        assert!(matches!(
            session.head_revision("pizza"),
            Err(ClientError::Protocol(_))
        ));
    }
}
