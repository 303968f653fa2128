//! Bounded recency cache of revision metadata.

use crate::change::ChangeMetadata;
use crate::history::ChangeHistory;
use crate::revision::DocumentRevision;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Capacity of a [`RevisionLogCache`].
pub const REVISION_LOG_CACHE_SIZE: usize = 10;

/// Metadata of one revision as kept in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionLogEntry {
    /// The revision.
    pub revision: DocumentRevision,
    /// Its commit metadata.
    pub metadata: ChangeMetadata,
}

/// Ring buffer holding the metadata of the most recent revisions.
///
/// Pushing into a full cache evicts the oldest entry. The cache is never
/// persisted; it is rebuilt from the tail of the history on load.
#[derive(Debug, Clone)]
pub struct RevisionLogCache {
    entries: VecDeque<RevisionLogEntry>,
    capacity: usize,
}

impl RevisionLogCache {
    /// Creates an empty cache of [`REVISION_LOG_CACHE_SIZE`] entries.
    pub fn new() -> Self {
        Self::with_capacity(REVISION_LOG_CACHE_SIZE)
    }

    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// The capacity is clamped to `1..=REVISION_LOG_CACHE_SIZE`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, REVISION_LOG_CACHE_SIZE);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuilds a cache from the tail of `history`.
    pub fn from_history(history: &ChangeHistory) -> Self {
        let mut cache = Self::new();
        let skip = history.len().saturating_sub(cache.capacity);
        for bundle in history.iter().skip(skip) {
            cache.push(bundle.revision, bundle.metadata.clone());
        }
        cache
    }

    /// Records the metadata of a newly accepted revision.
    pub fn push(&mut self, revision: DocumentRevision, metadata: ChangeMetadata) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(RevisionLogEntry { revision, metadata });
    }

    /// Returns the `n` most recent entries, oldest first.
    ///
    /// `n` is clamped to the cache capacity.
    pub fn latest(&self, n: usize) -> Vec<RevisionLogEntry> {
        let n = n.min(self.capacity);
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Looks up a cached revision.
    pub fn get(&self, revision: DocumentRevision) -> Option<&RevisionLogEntry> {
        self.entries.iter().find(|e| e.revision == revision)
    }

    /// Iterates cached entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RevisionLogEntry> {
        self.entries.iter()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RevisionLogCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::UserId;

    fn meta(i: u64) -> ChangeMetadata {
        ChangeMetadata::with_timestamp(UserId::new("u"), i, format!("commit {i}"))
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = RevisionLogCache::new();
        for i in 1..=25 {
            cache.push(DocumentRevision::new(i), meta(i));
            assert!(cache.len() <= REVISION_LOG_CACHE_SIZE);
        }

        assert_eq!(cache.len(), REVISION_LOG_CACHE_SIZE);
        let revisions: Vec<_> = cache.iter().map(|e| e.revision.as_u64()).collect();
        assert_eq!(revisions, (16..=25).collect::<Vec<_>>());
        assert!(cache.get(DocumentRevision::new(15)).is_none());
        assert!(cache.get(DocumentRevision::new(16)).is_some());
    }

    #[test]
    fn latest_clamps_and_keeps_order() {
        let mut cache = RevisionLogCache::new();
        for i in 1..=4 {
            cache.push(DocumentRevision::new(i), meta(i));
        }

        let two: Vec<_> = cache.latest(2).iter().map(|e| e.revision.as_u64()).collect();
        assert_eq!(two, vec![3, 4]);
        assert_eq!(cache.latest(100).len(), 4);
        assert!(cache.latest(0).is_empty());
    }

    #[test]
    fn rebuilt_from_history_tail() {
        let mut history = ChangeHistory::new();
        for i in 0..13 {
            history.add_revision_bundle(meta(i), vec![]);
        }
        let cache = RevisionLogCache::from_history(&history);
        assert_eq!(cache.len(), REVISION_LOG_CACHE_SIZE);
        assert_eq!(
            cache.iter().next().map(|e| e.revision),
            Some(DocumentRevision::new(4))
        );
        assert_eq!(
            cache.latest(1)[0].revision,
            history.head_revision()
        );
    }

    #[test]
    fn capacity_is_bounded() {
        assert_eq!(RevisionLogCache::with_capacity(50).capacity(), REVISION_LOG_CACHE_SIZE);
        assert_eq!(RevisionLogCache::with_capacity(0).capacity(), 1);
    }
}
