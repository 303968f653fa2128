//! Change operations and commit metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of a user, as resolved by the authorization layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single statement of a document, in canonical text form.
///
/// The text is the statement's identity: two statements are the same key
/// exactly when their canonical forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statement(String);

impl Statement {
    /// Creates a statement from its canonical text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An import declaration referencing another document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Import(String);

impl Import {
    /// Creates an import of the given document IRI.
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    /// Returns the imported IRI.
    pub fn iri(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document-level annotation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation property.
    pub property: String,
    /// Annotation value in canonical text form.
    pub value: String,
}

impl Annotation {
    /// Creates an annotation.
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.property, self.value)
    }
}

/// The identity of a document (its IRI and optional version IRI).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DocumentIdentity {
    /// Document IRI, absent for anonymous documents.
    pub iri: Option<String>,
    /// Version IRI.
    pub version_iri: Option<String>,
}

impl DocumentIdentity {
    /// Creates a named identity without a version.
    pub fn named(iri: impl Into<String>) -> Self {
        Self {
            iri: Some(iri.into()),
            version_iri: None,
        }
    }

    /// Sets the version IRI.
    pub fn with_version(mut self, version_iri: impl Into<String>) -> Self {
        self.version_iri = Some(version_iri.into());
        self
    }
}

/// The category a change falls into for conflict detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCategory {
    /// Document identity changes.
    Identity,
    /// Import declarations.
    Import,
    /// Document annotations.
    Annotation,
    /// Statements.
    Statement,
}

/// One atomic edit to a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum ChangeOperation {
    /// Replace the document identity.
    SetIdentity(DocumentIdentity),
    /// Add a statement.
    AddStatement(Statement),
    /// Remove a statement.
    RemoveStatement(Statement),
    /// Add an import declaration.
    AddImport(Import),
    /// Remove an import declaration.
    RemoveImport(Import),
    /// Add a document annotation.
    AddAnnotation(Annotation),
    /// Remove a document annotation.
    RemoveAnnotation(Annotation),
}

impl ChangeOperation {
    /// Returns the conflict category of this change.
    pub fn category(&self) -> ChangeCategory {
        match self {
            ChangeOperation::SetIdentity(_) => ChangeCategory::Identity,
            ChangeOperation::AddImport(_) | ChangeOperation::RemoveImport(_) => {
                ChangeCategory::Import
            }
            ChangeOperation::AddAnnotation(_) | ChangeOperation::RemoveAnnotation(_) => {
                ChangeCategory::Annotation
            }
            ChangeOperation::AddStatement(_) | ChangeOperation::RemoveStatement(_) => {
                ChangeCategory::Statement
            }
        }
    }

    /// Returns true for add operations.
    pub fn is_addition(&self) -> bool {
        matches!(
            self,
            ChangeOperation::AddStatement(_)
                | ChangeOperation::AddImport(_)
                | ChangeOperation::AddAnnotation(_)
        )
    }

    /// Returns true for remove operations.
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            ChangeOperation::RemoveStatement(_)
                | ChangeOperation::RemoveImport(_)
                | ChangeOperation::RemoveAnnotation(_)
        )
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOperation::SetIdentity(id) => write!(
                f,
                "SetIdentity({})",
                id.iri.as_deref().unwrap_or("<anonymous>")
            ),
            ChangeOperation::AddStatement(s) => write!(f, "AddStatement({s})"),
            ChangeOperation::RemoveStatement(s) => write!(f, "RemoveStatement({s})"),
            ChangeOperation::AddImport(i) => write!(f, "AddImport({i})"),
            ChangeOperation::RemoveImport(i) => write!(f, "RemoveImport({i})"),
            ChangeOperation::AddAnnotation(a) => write!(f, "AddAnnotation({a})"),
            ChangeOperation::RemoveAnnotation(a) => write!(f, "RemoveAnnotation({a})"),
        }
    }
}

/// Metadata attached to one committed revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMetadata {
    /// Author of the commit.
    pub author: UserId,
    /// Commit time (Unix millis).
    pub timestamp_millis: u64,
    /// Free-text commit comment.
    pub comment: String,
}

impl ChangeMetadata {
    /// Creates metadata stamped with the current time.
    pub fn new(author: UserId, comment: impl Into<String>) -> Self {
        let timestamp_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::with_timestamp(author, timestamp_millis, comment)
    }

    /// Creates metadata with an explicit timestamp.
    pub fn with_timestamp(author: UserId, timestamp_millis: u64, comment: impl Into<String>) -> Self {
        Self {
            author,
            timestamp_millis,
            comment: comment.into(),
        }
    }
}
