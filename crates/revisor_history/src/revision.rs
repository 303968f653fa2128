//! Document revision identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered, gapless revision number within one document's history.
///
/// Revision `0` is the empty document that exists before any bundle has
/// been committed. Every accepted bundle produces the next revision, so the
/// first bundle carries revision [`DocumentRevision::START`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRevision(u64);

impl DocumentRevision {
    /// The empty document, before any bundle.
    pub const ZERO: Self = Self(0);

    /// Revision produced by the first bundle of a history.
    pub const START: Self = Self(1);

    /// Creates a revision from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the successor revision.
    ///
    /// Saturates at `u64::MAX`; a history never gets anywhere near it.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the predecessor revision, or `None` for revision zero.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// Returns the number of revisions in `[self, other)`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> u64 {
        other.0.saturating_sub(self.0)
    }
}

impl fmt::Display for DocumentRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocumentRevision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_and_successor() {
        let r = DocumentRevision::ZERO;
        assert!(r < r.next());
        assert_eq!(r.next(), DocumentRevision::START);
        assert_eq!(DocumentRevision::new(7).next().as_u64(), 8);
    }

    #[test]
    fn previous_of_zero() {
        assert_eq!(DocumentRevision::ZERO.previous(), None);
        assert_eq!(
            DocumentRevision::new(3).previous(),
            Some(DocumentRevision::new(2))
        );
    }

    #[test]
    fn distance() {
        let a = DocumentRevision::new(2);
        let b = DocumentRevision::new(6);
        assert_eq!(a.distance_to(b), 4);
        assert_eq!(b.distance_to(a), 0);
    }
}
