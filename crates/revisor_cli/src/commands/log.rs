//! Log command implementation.

use revisor_history::{ChangeHistory, DocumentRevision};
use revisor_storage::HistoryStore;
use serde::Serialize;
use std::path::Path;

/// One revision, for output.
#[derive(Debug, Serialize)]
pub struct LogEntry {
    /// Revision number.
    pub revision: u64,
    /// Commit author.
    pub author: String,
    /// Commit time (Unix millis).
    pub timestamp_millis: u64,
    /// Commit comment.
    pub comment: String,
    /// Number of change operations.
    pub changes: usize,
}

/// Runs the log command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    revision: Option<u64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = HistoryStore::open(path, false)?;
    let history = store.load_history()?;
    let entries = select_entries(&history, limit, revision)?;
    tracing::debug!(file = %path.display(), entries = entries.len(), "read history");

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            print_text_output(&history, &entries);
        }
    }

    Ok(())
}

fn select_entries(
    history: &ChangeHistory,
    limit: Option<usize>,
    revision: Option<u64>,
) -> Result<Vec<LogEntry>, Box<dyn std::error::Error>> {
    if let Some(revision) = revision {
        let bundle = history.bundle(DocumentRevision::new(revision))?;
        return Ok(vec![LogEntry::from_bundle(bundle)]);
    }

    let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
    Ok(history.iter().skip(skip).map(LogEntry::from_bundle).collect())
}

impl LogEntry {
    fn from_bundle(bundle: &revisor_history::RevisionBundle) -> Self {
        Self {
            revision: bundle.revision.as_u64(),
            author: bundle.metadata.author.to_string(),
            timestamp_millis: bundle.metadata.timestamp_millis,
            comment: bundle.metadata.comment.clone(),
            changes: bundle.changes.len(),
        }
    }
}

fn print_text_output(history: &ChangeHistory, entries: &[LogEntry]) {
    println!(
        "History: revisions {}..={} ({} total)",
        history.start_revision(),
        history.head_revision(),
        history.len()
    );
    println!("================");
    println!();

    for entry in entries {
        println!(
            "r{:<6} {:<16} {:>14}  {} change(s)  {}",
            entry.revision, entry.author, entry.timestamp_millis, entry.changes, entry.comment
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisor_history::{ChangeMetadata, RevisionBundle, UserId};
    use std::sync::Arc;

    fn history(n: u64) -> ChangeHistory {
        ChangeHistory::from_bundles(
            DocumentRevision::START,
            (1..=n).map(|r| {
                Arc::new(RevisionBundle::new(
                    DocumentRevision::new(r),
                    ChangeMetadata::with_timestamp(UserId::new("alice"), r, format!("c{r}")),
                    vec![],
                ))
            }),
        )
        .unwrap()
    }

    #[test]
    fn limit_keeps_most_recent() {
        let entries = select_entries(&history(5), Some(2), None).unwrap();
        let revisions: Vec<_> = entries.iter().map(|e| e.revision).collect();
        assert_eq!(revisions, vec![4, 5]);
    }

    #[test]
    fn single_revision() {
        let entries = select_entries(&history(5), None, Some(3)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].comment, "c3");
        assert!(select_entries(&history(5), None, Some(9)).is_err());
    }
}
