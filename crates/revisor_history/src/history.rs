//! Append-only change history.

use crate::change::{ChangeMetadata, ChangeOperation};
use crate::document::Document;
use crate::error::{HistoryError, HistoryResult};
use crate::revision::DocumentRevision;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One commit's worth of changes, stored as a single history entry.
///
/// A bundle is created once, when a commit is accepted, and is never
/// mutated afterwards. Its revision is the revision it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionBundle {
    /// Revision produced by this bundle.
    pub revision: DocumentRevision,
    /// Commit metadata.
    pub metadata: ChangeMetadata,
    /// Changes in application order.
    pub changes: Vec<ChangeOperation>,
}

impl RevisionBundle {
    /// Creates a bundle.
    pub fn new(
        revision: DocumentRevision,
        metadata: ChangeMetadata,
        changes: Vec<ChangeOperation>,
    ) -> Self {
        Self {
            revision,
            metadata,
            changes,
        }
    }
}

/// An ordered log of revision bundles keyed by contiguous revisions.
///
/// # Invariants
///
/// - Bundle revisions are contiguous and strictly increasing from `start`
/// - `head == start + len - 1`, or `start - 1` when empty
/// - Bundles are never removed or reordered; crops are derived views that
///   share the same bundles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeHistory {
    start: DocumentRevision,
    bundles: Vec<Arc<RevisionBundle>>,
}

impl ChangeHistory {
    /// Creates an empty history whose first bundle will be revision 1.
    pub fn new() -> Self {
        Self::starting_at(DocumentRevision::START)
    }

    /// Creates an empty history whose first bundle will carry `start`.
    ///
    /// Revision zero denotes the empty document and cannot hold a bundle, so
    /// a zero start is raised to [`DocumentRevision::START`].
    pub fn starting_at(start: DocumentRevision) -> Self {
        Self {
            start: start.max(DocumentRevision::START),
            bundles: Vec::new(),
        }
    }

    /// Builds a history from already-numbered bundles.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NonContiguous`] if the bundles do not form a
    /// contiguous run starting at `start`.
    pub fn from_bundles(
        start: DocumentRevision,
        bundles: impl IntoIterator<Item = Arc<RevisionBundle>>,
    ) -> HistoryResult<Self> {
        let mut history = Self::starting_at(start);
        for bundle in bundles {
            history.append_bundle(bundle)?;
        }
        Ok(history)
    }

    /// Returns the first revision this history can hold.
    pub fn start_revision(&self) -> DocumentRevision {
        self.start
    }

    /// Returns the latest revision, or `start - 1` if the history is empty.
    pub fn head_revision(&self) -> DocumentRevision {
        DocumentRevision::new(self.start.as_u64() + self.bundles.len() as u64 - 1)
    }

    /// Returns the number of bundles.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Returns true if the history holds no bundles.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Returns the bundles in revision order.
    pub fn bundles(&self) -> &[Arc<RevisionBundle>] {
        &self.bundles
    }

    /// Iterates bundles in revision order.
    pub fn iter(&self) -> impl Iterator<Item = &RevisionBundle> {
        self.bundles.iter().map(|b| b.as_ref())
    }

    /// Appends a new bundle at `head + 1` and returns its revision.
    pub fn add_revision_bundle(
        &mut self,
        metadata: ChangeMetadata,
        changes: Vec<ChangeOperation>,
    ) -> DocumentRevision {
        let revision = self.head_revision().next();
        self.bundles
            .push(Arc::new(RevisionBundle::new(revision, metadata, changes)));
        revision
    }

    /// Appends a bundle that already carries its revision.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NonContiguous`] unless the bundle revision is
    /// exactly `head + 1`.
    pub fn append_bundle(&mut self, bundle: Arc<RevisionBundle>) -> HistoryResult<DocumentRevision> {
        let expected = self.head_revision().next();
        if bundle.revision != expected {
            return Err(HistoryError::NonContiguous {
                expected,
                actual: bundle.revision,
            });
        }
        self.bundles.push(bundle);
        Ok(expected)
    }

    /// Returns a read-only sub-history with bundles in `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Range`] if `from > to` or either bound lies
    /// outside `[start, head + 1]`.
    pub fn crop_changes(&self, from: DocumentRevision, to: DocumentRevision) -> HistoryResult<Self> {
        let upper = self.head_revision().next();
        if from > to || from < self.start || to > upper {
            return Err(HistoryError::Range {
                from,
                to,
                start: self.start,
                head: self.head_revision(),
            });
        }

        let lo = self.index_of(from);
        let hi = self.index_of(to);
        Ok(Self {
            start: from,
            bundles: self.bundles[lo..hi].to_vec(),
        })
    }

    /// Returns the bundle that produced `revision`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotFound`] outside `[start, head]`.
    pub fn bundle(&self, revision: DocumentRevision) -> HistoryResult<&Arc<RevisionBundle>> {
        if revision < self.start || revision > self.head_revision() || self.is_empty() {
            return Err(HistoryError::NotFound(revision));
        }
        self.bundles
            .get(self.index_of(revision))
            .ok_or(HistoryError::NotFound(revision))
    }

    /// Returns the metadata recorded for `revision`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotFound`] outside `[start, head]`.
    pub fn change_metadata_for_revision(
        &self,
        revision: DocumentRevision,
    ) -> HistoryResult<&ChangeMetadata> {
        self.bundle(revision).map(|b| &b.metadata)
    }

    /// Replays every bundle against a copy of `base` and returns the
    /// concatenated changes that bring it to head.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Replay`] if a change cannot be resolved
    /// against the base.
    pub fn get_changes<D>(&self, base: &D) -> HistoryResult<Vec<ChangeOperation>>
    where
        D: Document + Clone,
    {
        let mut scratch = base.clone();
        self.replay_onto(&mut scratch)?;
        Ok(self
            .bundles
            .iter()
            .flat_map(|b| b.changes.iter().cloned())
            .collect())
    }

    /// Replays every bundle, in order, onto `document`.
    ///
    /// On failure the document holds every change before the failing one.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Replay`] naming the failing bundle.
    pub fn replay_onto<D: Document>(&self, document: &mut D) -> HistoryResult<()> {
        for bundle in &self.bundles {
            document
                .apply_changes(&bundle.changes)
                .map_err(|source| HistoryError::Replay {
                    revision: bundle.revision,
                    source,
                })?;
        }
        tracing::debug!(
            start = %self.start,
            head = %self.head_revision(),
            bundles = self.bundles.len(),
            "replayed history"
        );
        Ok(())
    }

    /// Index of `revision` in `bundles`. Caller guarantees `revision >= start`.
    fn index_of(&self, revision: DocumentRevision) -> usize {
        self.start.distance_to(revision) as usize
    }
}

impl Default for ChangeHistory {
    fn default() -> Self {
        Self::new()
    }
}
