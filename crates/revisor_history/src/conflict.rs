//! Commit-time conflict detection.
//!
//! Both sides of a commit (the client's pending changes and the server's
//! changes accepted since the client's baseline) are reduced to "last
//! writer" projections per category. A client change conflicts when the
//! server also wrote the same key. Presence is all that matters: writing
//! the same value on both sides is still a conflict, and nothing is ever
//! merged.

use crate::change::{Annotation, ChangeOperation, Import, Statement};
use std::collections::HashMap;
use std::hash::Hash;

/// Last operation per key, remembering the order keys were first seen.
#[derive(Debug, Clone)]
pub struct LastWriters<K> {
    index: HashMap<K, usize>,
    entries: Vec<(K, ChangeOperation)>,
}

impl<K: Eq + Hash + Clone> LastWriters<K> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Records `op` as the latest write to `key`.
    fn record(&mut self, key: &K, op: &ChangeOperation) {
        match self.index.get(key) {
            Some(&slot) => self.entries[slot].1 = op.clone(),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key.clone(), op.clone()));
            }
        }
    }

    /// Returns true if `key` was written.
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the last write to `key`.
    pub fn get(&self, key: &K) -> Option<&ChangeOperation> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Iterates `(key, last write)` in first-encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &ChangeOperation)> {
        self.entries.iter().map(|(k, op)| (k, op))
    }

    /// Number of distinct keys written.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last writes whose key was also written by `other`, in our order.
    fn overlapping<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = &'a ChangeOperation> {
        self.iter()
            .filter(move |(key, _)| other.contains_key(key))
            .map(|(_, op)| op)
    }
}

/// The four last-writer projections of one change sequence.
#[derive(Debug, Clone)]
pub struct CollectedChanges {
    last_identity_change: Option<ChangeOperation>,
    last_import_changes: LastWriters<Import>,
    last_annotation_changes: LastWriters<Annotation>,
    last_statement_changes: LastWriters<Statement>,
}

impl CollectedChanges {
    /// Reduces `changes` to last-writer projections, in sequence order.
    pub fn collect<'a, I>(changes: I) -> Self
    where
        I: IntoIterator<Item = &'a ChangeOperation>,
    {
        let mut collected = Self {
            last_identity_change: None,
            last_import_changes: LastWriters::new(),
            last_annotation_changes: LastWriters::new(),
            last_statement_changes: LastWriters::new(),
        };

        for op in changes {
            match op {
                ChangeOperation::SetIdentity(_) => {
                    collected.last_identity_change = Some(op.clone());
                }
                ChangeOperation::AddImport(import) | ChangeOperation::RemoveImport(import) => {
                    collected.last_import_changes.record(import, op);
                }
                ChangeOperation::AddAnnotation(annotation)
                | ChangeOperation::RemoveAnnotation(annotation) => {
                    collected.last_annotation_changes.record(annotation, op);
                }
                ChangeOperation::AddStatement(statement)
                | ChangeOperation::RemoveStatement(statement) => {
                    collected.last_statement_changes.record(statement, op);
                }
            }
        }

        collected
    }

    /// Last identity change, if any.
    pub fn last_identity_change(&self) -> Option<&ChangeOperation> {
        self.last_identity_change.as_ref()
    }

    /// Last change per import.
    pub fn last_import_changes(&self) -> &LastWriters<Import> {
        &self.last_import_changes
    }

    /// Last change per annotation.
    pub fn last_annotation_changes(&self) -> &LastWriters<Annotation> {
        &self.last_annotation_changes
    }

    /// Last change per statement.
    pub fn last_statement_changes(&self) -> &LastWriters<Statement> {
        &self.last_statement_changes
    }

    /// Returns our operations that collide with `server`.
    ///
    /// Order: identity, then imports, annotations and statements, each in
    /// the order their keys first appeared on our side.
    pub fn conflicts_with(&self, server: &CollectedChanges) -> Vec<ChangeOperation> {
        let mut conflicts = Vec::new();

        if let (Some(ours), Some(_)) = (&self.last_identity_change, &server.last_identity_change) {
            conflicts.push(ours.clone());
        }
        conflicts.extend(
            self.last_import_changes
                .overlapping(&server.last_import_changes)
                .cloned(),
        );
        conflicts.extend(
            self.last_annotation_changes
                .overlapping(&server.last_annotation_changes)
                .cloned(),
        );
        conflicts.extend(
            self.last_statement_changes
                .overlapping(&server.last_statement_changes)
                .cloned(),
        );

        conflicts
    }
}

/// Returns the client operations that conflict with the server's changes.
///
/// An empty result means the commit can be accepted.
pub fn detect_conflicts(
    client_changes: &[ChangeOperation],
    server_changes: &[ChangeOperation],
) -> Vec<ChangeOperation> {
    if client_changes.is_empty() || server_changes.is_empty() {
        return Vec::new();
    }
    let client = CollectedChanges::collect(client_changes);
    let server = CollectedChanges::collect(server_changes);
    client.conflicts_with(&server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::DocumentIdentity;
    use proptest::prelude::*;

    fn add(s: &str) -> ChangeOperation {
        ChangeOperation::AddStatement(Statement::new(s))
    }

    fn remove(s: &str) -> ChangeOperation {
        ChangeOperation::RemoveStatement(Statement::new(s))
    }

    fn set_id(iri: &str) -> ChangeOperation {
        ChangeOperation::SetIdentity(DocumentIdentity::named(iri))
    }

    #[test]
    fn later_changes_shadow_earlier() {
        let collected = CollectedChanges::collect(&[add("A"), add("B"), remove("A")]);
        let statements = collected.last_statement_changes();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements.get(&Statement::new("A")), Some(&remove("A")));

        // first-encounter order survives shadowing
        let keys: Vec<_> = statements.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn disjoint_keys_do_not_conflict() {
        let client = vec![add("S2"), ChangeOperation::AddImport(Import::new("http://a"))];
        let server = vec![add("S1"), ChangeOperation::AddImport(Import::new("http://b"))];
        assert!(detect_conflicts(&client, &server).is_empty());
    }

    #[test]
    fn same_statement_conflicts() {
        let client = vec![remove("S1")];
        let server = vec![add("S1")];
        assert_eq!(detect_conflicts(&client, &server), vec![remove("S1")]);
    }

    #[test]
    fn same_value_still_conflicts() {
        let client = vec![add("S1")];
        let server = vec![add("S1")];
        assert_eq!(detect_conflicts(&client, &server), vec![add("S1")]);
    }

    #[test]
    fn reports_clients_last_write() {
        let client = vec![add("S1"), remove("S1")];
        let server = vec![add("S1")];
        assert_eq!(detect_conflicts(&client, &server), vec![remove("S1")]);
    }

    #[test]
    fn identity_requires_both_sides() {
        assert!(detect_conflicts(&[set_id("http://a")], &[add("S")]).is_empty());
        assert!(detect_conflicts(&[add("S")], &[set_id("http://a")]).is_empty());
        assert_eq!(
            detect_conflicts(&[set_id("http://a"), set_id("http://b")], &[set_id("http://c")]),
            vec![set_id("http://b")]
        );
    }

    #[test]
    fn output_order_by_category_then_encounter() {
        let ann = Annotation::new("rdfs:label", "\"x\"");
        let imp = Import::new("http://imp");
        let client = vec![
            add("S2"),
            ChangeOperation::AddAnnotation(ann.clone()),
            add("S1"),
            ChangeOperation::RemoveImport(imp.clone()),
            set_id("http://client"),
        ];
        let server = vec![
            add("S1"),
            add("S2"),
            ChangeOperation::RemoveAnnotation(ann.clone()),
            ChangeOperation::AddImport(imp.clone()),
            set_id("http://server"),
        ];

        assert_eq!(
            detect_conflicts(&client, &server),
            vec![
                set_id("http://client"),
                ChangeOperation::RemoveImport(imp),
                ChangeOperation::AddAnnotation(ann),
                add("S2"),
                add("S1"),
            ]
        );
    }

    #[test]
    fn empty_sides_never_conflict() {
        assert!(detect_conflicts(&[], &[add("A")]).is_empty());
        assert!(detect_conflicts(&[add("A")], &[]).is_empty());
    }

    proptest! {
        #[test]
        fn disjoint_statement_sets_never_conflict(
            client_keys in proptest::collection::vec(0u32..500, 0..40),
            server_keys in proptest::collection::vec(500u32..1000, 0..40),
            removals in proptest::collection::vec(any::<bool>(), 40),
        ) {
            let client: Vec<_> = client_keys
                .iter()
                .zip(&removals)
                .map(|(k, r)| if *r { remove(&format!("S{k}")) } else { add(&format!("S{k}")) })
                .collect();
            let server: Vec<_> = server_keys.iter().map(|k| add(&format!("S{k}"))).collect();
            prop_assert!(detect_conflicts(&client, &server).is_empty());
        }

        #[test]
        fn shared_statement_always_conflicts(key in 0u32..100, extra in proptest::collection::vec(100u32..200, 0..10)) {
            let shared = format!("S{key}");
            let mut client: Vec<_> = extra.iter().map(|k| add(&format!("S{k}"))).collect();
            client.push(remove(&shared));
            let server = vec![add(&shared)];
            let conflicts = detect_conflicts(&client, &server);
            prop_assert_eq!(conflicts, vec![remove(&shared)]);
        }
    }
}
