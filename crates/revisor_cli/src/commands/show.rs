//! Show command implementation.

use revisor_history::{ChangeHistory, DocumentRevision, StatementDocument};
use revisor_storage::HistoryStore;
use std::path::Path;

/// Runs the show command.
pub fn run(path: &Path, revision: Option<u64>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = HistoryStore::open(path, false)?;
    let history = store.load_history()?;
    let target = revision.map_or(history.head_revision(), DocumentRevision::new);
    let document = document_at(&history, target)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        _ => {
            print_text_output(target, &document);
        }
    }

    Ok(())
}

/// Replays the history from the empty document up to `target`.
fn document_at(
    history: &ChangeHistory,
    target: DocumentRevision,
) -> Result<StatementDocument, Box<dyn std::error::Error>> {
    if history.start_revision() != DocumentRevision::START {
        return Err(format!(
            "history starts at revision {}; the document before it is unknown",
            history.start_revision()
        )
        .into());
    }

    let mut document = StatementDocument::new();
    history
        .crop_changes(history.start_revision(), target.next())?
        .replay_onto(&mut document)?;
    Ok(document)
}

fn print_text_output(revision: DocumentRevision, document: &StatementDocument) {
    println!("Document at revision {revision}");
    println!("================");
    let identity = document.identity();
    if let Some(iri) = &identity.iri {
        println!("Identity: {iri}");
    }
    if let Some(version) = &identity.version_iri {
        println!("Version: {version}");
    }
    for import in document.imports() {
        println!("Import: {import}");
    }
    for annotation in document.annotations() {
        println!("Annotation: {annotation}");
    }
    println!();
    for statement in document.statements() {
        println!("{statement}");
    }
}
