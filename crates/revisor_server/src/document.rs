//! Server-side state of one versioned document.

use crate::error::{ServerError, ServerResult};
use parking_lot::{Mutex, RwLock};
use revisor_history::{
    ChangeHistory, ChangeMetadata, Checkpoint, Document, DocumentInfo, DocumentRevision,
    HistoryError, HistoryResult, RevisionBundle, RevisionLogCache, RevisionLogEntry,
    StatementDocument,
};
use revisor_storage::{HistoryStore, StorageResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One document registered with the server.
///
/// The server document maintains:
/// - The change history, readable concurrently
/// - A commit lock serializing commits to this document
/// - The metadata cache of the most recent revisions
/// - Checkpoints and the materialized head snapshot
/// - The history store the bundles are persisted to
///
/// The history write lock is only taken to append a fully built bundle,
/// so readers never observe a partial commit.
pub struct ServerDocument {
    id: String,
    description: String,
    commit_lock: Mutex<()>,
    history: RwLock<ChangeHistory>,
    log_cache: RwLock<RevisionLogCache>,
    checkpoints: RwLock<BTreeMap<DocumentRevision, Arc<StatementDocument>>>,
    head_snapshot: Mutex<StatementDocument>,
    store: HistoryStore,
}

impl ServerDocument {
    /// Creates a new, empty document.
    pub(crate) fn create(id: String, description: String, store: HistoryStore) -> Self {
        let mut checkpoints = BTreeMap::new();
        checkpoints.insert(DocumentRevision::ZERO, Arc::new(StatementDocument::new()));

        Self {
            id,
            description,
            commit_lock: Mutex::new(()),
            history: RwLock::new(ChangeHistory::new()),
            log_cache: RwLock::new(RevisionLogCache::new()),
            checkpoints: RwLock::new(checkpoints),
            head_snapshot: Mutex::new(StatementDocument::new()),
            store,
        }
    }

    /// Rebuilds a document from its persisted history.
    ///
    /// Every bundle is replayed to rebuild the head snapshot and the
    /// checkpoints; the metadata cache is rebuilt from the history tail.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be read, or a replay
    /// error if the stored history does not apply to an empty document.
    pub(crate) fn restore(
        id: String,
        description: String,
        store: HistoryStore,
        checkpoint_interval: u64,
    ) -> ServerResult<Self> {
        let history = store.load_history()?;
        if history.start_revision() != DocumentRevision::START {
            return Err(ServerError::Internal(format!(
                "history of {id} starts at revision {}",
                history.start_revision()
            )));
        }

        let mut snapshot = StatementDocument::new();
        let mut checkpoints = BTreeMap::new();
        checkpoints.insert(DocumentRevision::ZERO, Arc::new(snapshot.clone()));

        for bundle in history.iter() {
            snapshot
                .apply_changes(&bundle.changes)
                .map_err(|source| HistoryError::Replay {
                    revision: bundle.revision,
                    source,
                })?;
            if is_checkpoint(bundle.revision, checkpoint_interval) {
                checkpoints.insert(bundle.revision, Arc::new(snapshot.clone()));
            }
        }

        let log_cache = RevisionLogCache::from_history(&history);
        tracing::debug!(
            document = %id,
            head = %history.head_revision(),
            checkpoints = checkpoints.len(),
            "restored document"
        );

        Ok(Self {
            id,
            description,
            commit_lock: Mutex::new(()),
            history: RwLock::new(history),
            log_cache: RwLock::new(log_cache),
            checkpoints: RwLock::new(checkpoints),
            head_snapshot: Mutex::new(snapshot),
            store,
        })
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the description given at creation.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the current head revision.
    pub fn head_revision(&self) -> DocumentRevision {
        self.history.read().head_revision()
    }

    /// Returns a summary of the document.
    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            id: self.id.clone(),
            description: self.description.clone(),
            head: self.head_revision(),
        }
    }

    /// Returns a copy of the full history.
    ///
    /// Bundles are shared, not copied.
    pub fn history(&self) -> ChangeHistory {
        self.history.read().clone()
    }

    /// Returns the bundles in `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Range`] for bounds outside the history.
    pub fn crop_changes(
        &self,
        from: DocumentRevision,
        to: DocumentRevision,
    ) -> HistoryResult<ChangeHistory> {
        self.history.read().crop_changes(from, to)
    }

    /// Returns the metadata of `revision`, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotFound`] if no such revision exists.
    pub fn revision_log(&self, revision: DocumentRevision) -> HistoryResult<RevisionLogEntry> {
        if let Some(entry) = self.log_cache.read().get(revision) {
            return Ok(entry.clone());
        }
        let history = self.history.read();
        let metadata = history.change_metadata_for_revision(revision)?;
        Ok(RevisionLogEntry {
            revision,
            metadata: metadata.clone(),
        })
    }

    /// Returns up to `n` of the most recent revisions, oldest first.
    pub fn latest_revision_log(&self, n: usize) -> Vec<RevisionLogEntry> {
        self.log_cache.read().latest(n)
    }

    /// Returns the latest checkpoint at or below `target`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Range`] if `target` is past the head.
    pub fn latest_checkpoint(&self, target: DocumentRevision) -> ServerResult<Checkpoint> {
        let head = self.head_revision();
        if target > head {
            return Err(HistoryError::Range {
                from: target,
                to: target.next(),
                start: DocumentRevision::START,
                head,
            }
            .into());
        }

        self.checkpoints
            .read()
            .range(..=target)
            .next_back()
            .map(|(revision, document)| Checkpoint {
                revision: *revision,
                document: document.as_ref().clone(),
            })
            .ok_or(ServerError::NoCheckpoint(target))
    }

    /// Returns the revisions that have checkpoints.
    pub fn checkpoint_revisions(&self) -> Vec<DocumentRevision> {
        self.checkpoints.read().keys().copied().collect()
    }

    /// Returns true if the store has unflushed records.
    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    /// Flushes the store if it has unflushed records.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush_if_dirty(&self) -> StorageResult<bool> {
        self.store.flush_if_dirty()
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub(crate) fn commit_lock(&self) -> &Mutex<()> {
        &self.commit_lock
    }

    /// Clone of the head snapshot, for validating a commit.
    pub(crate) fn head_snapshot(&self) -> StatementDocument {
        self.head_snapshot.lock().clone()
    }

    /// Persists and publishes an accepted bundle.
    ///
    /// Caller holds the commit lock. The store is written first; if that
    /// fails nothing else changes.
    pub(crate) fn accept(
        &self,
        bundle: Arc<RevisionBundle>,
        snapshot: StatementDocument,
        checkpoint_interval: u64,
    ) -> ServerResult<()> {
        self.store.append(&bundle)?;

        let revision = bundle.revision;
        let metadata: ChangeMetadata = bundle.metadata.clone();
        self.history.write().append_bundle(bundle)?;
        self.log_cache.write().push(revision, metadata);

        if is_checkpoint(revision, checkpoint_interval) {
            self.checkpoints
                .write()
                .insert(revision, Arc::new(snapshot.clone()));
            tracing::debug!(document = %self.id, revision = %revision, "recorded checkpoint");
        }
        *self.head_snapshot.lock() = snapshot;
        Ok(())
    }
}

impl std::fmt::Debug for ServerDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDocument")
            .field("id", &self.id)
            .field("head", &self.head_revision())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

fn is_checkpoint(revision: DocumentRevision, interval: u64) -> bool {
    interval > 0 && revision.as_u64() % interval == 0
}
