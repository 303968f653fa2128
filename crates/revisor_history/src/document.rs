//! Document snapshots that change operations are replayed against.

use crate::change::{Annotation, ChangeOperation, DocumentIdentity, Import, Statement};
use crate::error::ReplayError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A document snapshot that can absorb change operations.
///
/// The history engine never looks inside statements; it only needs a
/// snapshot to apply changes to and to report when a change refers to
/// something the snapshot does not have.
pub trait Document {
    /// Applies one change to the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if the change references a key the
    /// snapshot cannot resolve.
    fn apply_change(&mut self, change: &ChangeOperation) -> Result<(), ReplayError>;

    /// Applies a sequence of changes in order, stopping at the first failure.
    fn apply_changes<'a, I>(&mut self, changes: I) -> Result<(), ReplayError>
    where
        I: IntoIterator<Item = &'a ChangeOperation>,
        Self: Sized,
    {
        for change in changes {
            self.apply_change(change)?;
        }
        Ok(())
    }
}

/// In-memory document made of statements, imports and annotations.
///
/// Additions are idempotent. Removals must name something the document
/// contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementDocument {
    identity: DocumentIdentity,
    imports: BTreeSet<Import>,
    annotations: BTreeSet<Annotation>,
    statements: BTreeSet<Statement>,
}

impl StatementDocument {
    /// Creates an empty, anonymous document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the document identity.
    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    /// Returns true if the statement is present.
    pub fn contains_statement(&self, statement: &Statement) -> bool {
        self.statements.contains(statement)
    }

    /// Iterates statements in canonical order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    /// Iterates imports in canonical order.
    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.imports.iter()
    }

    /// Iterates annotations in canonical order.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    /// Number of statements.
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Returns true if the document has no content and no identity.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
            && self.imports.is_empty()
            && self.annotations.is_empty()
            && self.identity == DocumentIdentity::default()
    }
}

impl Document for StatementDocument {
    fn apply_change(&mut self, change: &ChangeOperation) -> Result<(), ReplayError> {
        match change {
            ChangeOperation::SetIdentity(identity) => {
                self.identity = identity.clone();
            }
            ChangeOperation::AddStatement(statement) => {
                self.statements.insert(statement.clone());
            }
            ChangeOperation::RemoveStatement(statement) => {
                if !self.statements.remove(statement) {
                    return Err(ReplayError::MissingStatement(statement.to_string()));
                }
            }
            ChangeOperation::AddImport(import) => {
                self.imports.insert(import.clone());
            }
            ChangeOperation::RemoveImport(import) => {
                if !self.imports.remove(import) {
                    return Err(ReplayError::MissingImport(import.to_string()));
                }
            }
            ChangeOperation::AddAnnotation(annotation) => {
                self.annotations.insert(annotation.clone());
            }
            ChangeOperation::RemoveAnnotation(annotation) => {
                if !self.annotations.remove(annotation) {
                    return Err(ReplayError::MissingAnnotation(annotation.to_string()));
                }
            }
        }
        Ok(())
    }
}

/// A disposable snapshot with no base content.
///
/// It accepts every change, which makes it suitable for materializing a
/// delta whose base state is not loaded (the commit-time conflict check).
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSnapshot;

impl Document for DetachedSnapshot {
    fn apply_change(&mut self, _change: &ChangeOperation) -> Result<(), ReplayError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(s: &str) -> Statement {
        Statement::new(s)
    }

    #[test]
    fn add_and_remove_statement() {
        let mut doc = StatementDocument::new();
        doc.apply_change(&ChangeOperation::AddStatement(stmt("A")))
            .unwrap();
        assert!(doc.contains_statement(&stmt("A")));

        doc.apply_change(&ChangeOperation::RemoveStatement(stmt("A")))
            .unwrap();
        assert!(!doc.contains_statement(&stmt("A")));
        assert!(doc.is_empty());
    }

    #[test]
    fn remove_missing_fails() {
        let mut doc = StatementDocument::new();
        let err = doc
            .apply_change(&ChangeOperation::RemoveStatement(stmt("A")))
            .unwrap_err();
        assert_eq!(err, ReplayError::MissingStatement("A".into()));

        let err = doc
            .apply_change(&ChangeOperation::RemoveImport(Import::new("http://b")))
            .unwrap_err();
        assert!(matches!(err, ReplayError::MissingImport(_)));
    }

    #[test]
    fn add_is_idempotent() {
        let mut doc = StatementDocument::new();
        let add = ChangeOperation::AddStatement(stmt("A"));
        doc.apply_changes([&add, &add]).unwrap();
        assert_eq!(doc.statement_count(), 1);
    }

    #[test]
    fn identity_and_annotations() {
        let mut doc = StatementDocument::new();
        let annotation = Annotation::new("rdfs:comment", "\"draft\"");
        doc.apply_changes(&[
            ChangeOperation::SetIdentity(DocumentIdentity::named("http://example.org/pizza")),
            ChangeOperation::AddAnnotation(annotation.clone()),
            ChangeOperation::AddImport(Import::new("http://example.org/food")),
        ])
        .unwrap();

        assert_eq!(
            doc.identity().iri.as_deref(),
            Some("http://example.org/pizza")
        );
        assert_eq!(doc.annotations().count(), 1);
        assert_eq!(doc.imports().count(), 1);

        doc.apply_change(&ChangeOperation::RemoveAnnotation(annotation))
            .unwrap();
        assert_eq!(doc.annotations().count(), 0);
    }

    #[test]
    fn detached_snapshot_accepts_everything() {
        let mut scratch = DetachedSnapshot;
        assert!(scratch
            .apply_change(&ChangeOperation::RemoveStatement(stmt("never added")))
            .is_ok());
    }
}
