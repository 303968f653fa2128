//! The version server.

use crate::auth::{Authorizer, HmacAuthorizer, OpenAuthorizer};
use crate::config::ServerConfig;
use crate::coordinator::CommitCoordinator;
use crate::document::ServerDocument;
use crate::error::{ServerError, ServerResult};
use crate::handler;
use parking_lot::RwLock;
use revisor_history::{
    AuthToken, ChangeHistory, Checkpoint, CommitBundle, CommitOutcome, DocumentInfo,
    DocumentRevision, FetchChangesResponse, HistoryError, RevisionLogEntry, UserId,
    VersionMessage,
};
use revisor_storage::HistoryStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const HISTORY_EXTENSION: &str = "history";
const DESCRIPTION_EXTENSION: &str = "description";

/// The version server.
///
/// Holds every registered document and routes requests to them. Commits
/// are serialized per document by the [`CommitCoordinator`]; reads never
/// wait for commits.
///
/// # Example
///
/// ```
/// use revisor_history::{AuthToken, ChangeOperation, CommitBundle, DocumentRevision, Statement};
/// use revisor_server::{ServerConfig, VersionServer};
///
/// let server = VersionServer::open(ServerConfig::default()).unwrap();
/// let token = AuthToken::new("alice");
/// server.create_project(&token, "pizza", "Pizza ontology").unwrap();
///
/// let commit = CommitBundle::new(
///     DocumentRevision::ZERO,
///     vec![ChangeOperation::AddStatement(Statement::new("Declaration(Class(:Pizza))"))],
///     "first class",
/// );
/// let outcome = server.commit(&token, "pizza", commit).unwrap();
/// assert_eq!(outcome.revision, DocumentRevision::START);
/// ```
pub struct VersionServer {
    config: ServerConfig,
    authorizer: Arc<dyn Authorizer>,
    coordinator: CommitCoordinator,
    documents: RwLock<HashMap<String, Arc<ServerDocument>>>,
}

impl VersionServer {
    /// Opens a server, loading every history found under the root directory.
    ///
    /// Requests are authorized with signed tokens when the configuration
    /// carries an [`AuthConfig`](crate::AuthConfig), otherwise the token
    /// text is taken as the user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created or listed.
    /// Histories that fail to load are logged and skipped.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let authorizer: Arc<dyn Authorizer> = match &config.auth {
            Some(auth) => Arc::new(HmacAuthorizer::new(auth.clone())),
            None => Arc::new(OpenAuthorizer),
        };
        Self::open_with_authorizer(config, authorizer)
    }

    /// Opens a server with a custom authorizer.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_authorizer(
        config: ServerConfig,
        authorizer: Arc<dyn Authorizer>,
    ) -> ServerResult<Self> {
        let mut documents = HashMap::new();
        if let Some(root) = &config.root_dir {
            std::fs::create_dir_all(root).map_err(revisor_storage::StorageError::from)?;
            for document in load_documents(root, &config)? {
                documents.insert(document.id().to_string(), Arc::new(document));
            }
        }

        tracing::info!(
            root = ?config.root_dir,
            documents = documents.len(),
            auth = config.requires_auth(),
            "version server opened"
        );

        Ok(Self {
            coordinator: CommitCoordinator::new(&config),
            config,
            authorizer,
            documents: RwLock::new(documents),
        })
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registers a new, empty document.
    ///
    /// # Errors
    ///
    /// - [`ServerError::NotAuthorized`] for a rejected token
    /// - [`ServerError::InvalidRequest`] for an unusable id
    /// - [`ServerError::DocumentExists`] if the id or its history file is taken
    pub fn create_project(
        &self,
        token: &AuthToken,
        document_id: &str,
        description: &str,
    ) -> ServerResult<DocumentInfo> {
        let user = self.authorize(token)?;
        self.ensure_running()?;
        validate_document_id(document_id)?;

        let mut documents = self.documents.write();
        // shutdown may have drained the registry while we waited
        self.ensure_running()?;
        if documents.contains_key(document_id) {
            return Err(ServerError::DocumentExists(document_id.to_string()));
        }

        let store = match &self.config.root_dir {
            Some(root) => {
                let path = history_path(root, document_id);
                if path.exists() {
                    return Err(ServerError::DocumentExists(document_id.to_string()));
                }
                let store = HistoryStore::create(&path, self.config.sync_on_commit)?;
                if let Err(e) = std::fs::write(description_path(root, document_id), description) {
                    drop(store);
                    if let Err(cleanup) = std::fs::remove_file(&path) {
                        tracing::warn!(path = ?path, error = %cleanup, "could not remove history file");
                    }
                    return Err(revisor_storage::StorageError::from(e).into());
                }
                store
            }
            None => HistoryStore::in_memory(document_id),
        };

        let document = Arc::new(ServerDocument::create(
            document_id.to_string(),
            description.to_string(),
            store,
        ));
        let info = document.info();
        documents.insert(document_id.to_string(), document);

        tracing::info!(document = %document_id, user = %user, "project created");
        Ok(info)
    }

    /// Commits changes to a document.
    ///
    /// # Errors
    ///
    /// See [`CommitCoordinator::commit`]; additionally
    /// [`ServerError::NotAuthorized`] and [`ServerError::UnknownDocument`].
    pub fn commit(
        &self,
        token: &AuthToken,
        document_id: &str,
        commit: CommitBundle,
    ) -> ServerResult<CommitOutcome> {
        let author = self.authorize(token)?;
        let document = self.document(document_id)?;
        self.coordinator.commit(&document, author, commit)
    }

    /// Returns the full history of a document.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] or [`ServerError::UnknownDocument`].
    pub fn all_changes(&self, token: &AuthToken, document_id: &str) -> ServerResult<ChangeHistory> {
        self.authorize(token)?;
        Ok(self.document(document_id)?.history())
    }

    /// Returns the head revision of a document.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] or [`ServerError::UnknownDocument`].
    pub fn head_revision(&self, token: &AuthToken, document_id: &str) -> ServerResult<DocumentRevision> {
        self.authorize(token)?;
        Ok(self.document(document_id)?.head_revision())
    }

    /// Returns the bundles of a document in `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns a range error for bounds outside the history.
    pub fn crop_changes(
        &self,
        token: &AuthToken,
        document_id: &str,
        from: DocumentRevision,
        to: DocumentRevision,
    ) -> ServerResult<ChangeHistory> {
        self.authorize(token)?;
        Ok(self.document(document_id)?.crop_changes(from, to)?)
    }

    /// Returns the bundles in `(after, through]`, at most
    /// `max_fetch_bundles` of them.
    ///
    /// # Errors
    ///
    /// Returns a range error if `after > through` or `through` is past the
    /// head.
    pub fn fetch_changes(
        &self,
        token: &AuthToken,
        document_id: &str,
        after: DocumentRevision,
        through: DocumentRevision,
    ) -> ServerResult<FetchChangesResponse> {
        self.authorize(token)?;
        let document = self.document(document_id)?;

        let head = document.head_revision();
        if after > through || through > head {
            return Err(HistoryError::Range {
                from: after.next(),
                to: through.next(),
                start: DocumentRevision::START,
                head,
            }
            .into());
        }

        let limit = u64::from(self.config.max_fetch_bundles);
        let end = DocumentRevision::new(through.as_u64().min(after.as_u64().saturating_add(limit)));
        let history = document.crop_changes(after.next(), end.next())?;

        tracing::debug!(
            document = %document_id,
            after = %after,
            through = %through,
            bundles = history.len(),
            "fetched changes"
        );
        Ok(FetchChangesResponse {
            bundles: history.iter().cloned().collect(),
            head,
        })
    }

    /// Returns the latest checkpoint at or below `target`.
    ///
    /// # Errors
    ///
    /// Returns a range error if `target` is past the head.
    pub fn latest_checkpoint(
        &self,
        token: &AuthToken,
        document_id: &str,
        target: DocumentRevision,
    ) -> ServerResult<Checkpoint> {
        self.authorize(token)?;
        self.document(document_id)?.latest_checkpoint(target)
    }

    /// Returns the metadata of one revision.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for revisions outside the history.
    pub fn revision_log(
        &self,
        token: &AuthToken,
        document_id: &str,
        revision: DocumentRevision,
    ) -> ServerResult<RevisionLogEntry> {
        self.authorize(token)?;
        Ok(self.document(document_id)?.revision_log(revision)?)
    }

    /// Returns up to `n` of the most recent revisions, oldest first.
    ///
    /// `n` is clamped to the cache capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] or [`ServerError::UnknownDocument`].
    pub fn latest_revision_log(
        &self,
        token: &AuthToken,
        document_id: &str,
        n: usize,
    ) -> ServerResult<Vec<RevisionLogEntry>> {
        self.authorize(token)?;
        Ok(self.document(document_id)?.latest_revision_log(n))
    }

    /// Lists registered documents, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] for a rejected token.
    pub fn list_documents(&self, token: &AuthToken) -> ServerResult<Vec<DocumentInfo>> {
        self.authorize(token)?;
        let mut infos: Vec<_> = self.documents.read().values().map(|d| d.info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(infos)
    }

    /// Returns a registered document.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::UnknownDocument`] if the id is not registered.
    pub fn document(&self, document_id: &str) -> ServerResult<Arc<ServerDocument>> {
        self.documents
            .read()
            .get(document_id)
            .cloned()
            .ok_or_else(|| ServerError::UnknownDocument(document_id.to_string()))
    }

    /// Flushes every dirty history store.
    ///
    /// Returns the number of stores flushed.
    ///
    /// # Errors
    ///
    /// Returns the first flush error; the remaining stores are still tried.
    pub fn flush(&self) -> ServerResult<usize> {
        let documents: Vec<_> = self.documents.read().values().cloned().collect();
        flush_all(&documents)
    }

    /// Stops accepting commits, waits for in-flight ones, flushes dirty
    /// stores and drops every document.
    ///
    /// # Errors
    ///
    /// Returns the first flush error. The registry is cleared regardless.
    pub fn shutdown(&self) -> ServerResult<()> {
        self.coordinator.begin_shutdown();

        let documents: Vec<_> = self.documents.write().drain().map(|(_, d)| d).collect();
        for document in &documents {
            // wait for any commit still holding the lock
            drop(document.commit_lock().lock());
        }
        let flushed = flush_all(&documents)?;

        tracing::info!(documents = documents.len(), flushed, "version server shut down");
        Ok(())
    }

    /// Returns true once shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.coordinator.is_shutting_down()
    }

    /// Handles one protocol message and returns the reply.
    ///
    /// Failures are returned as [`VersionMessage::Error`].
    pub fn handle_message(&self, message: VersionMessage) -> VersionMessage {
        handler::dispatch(self, message)
    }

    /// Handles one CBOR-encoded message and returns the encoded reply.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Internal`] only if the reply cannot be
    /// encoded; undecodable requests get an encoded error reply.
    pub fn handle_bytes(&self, bytes: &[u8]) -> ServerResult<Vec<u8>> {
        let reply = match VersionMessage::decode(bytes) {
            Ok(message) => self.handle_message(message),
            Err(e) => VersionMessage::Error(
                ServerError::InvalidRequest(format!("undecodable message: {e}")).to_response(),
            ),
        };
        reply
            .encode()
            .map_err(|e| ServerError::Internal(e.to_string()))
    }

    fn authorize(&self, token: &AuthToken) -> ServerResult<UserId> {
        self.authorizer.validate(token).inspect_err(|e| {
            tracing::warn!(error = %e, "request not authorized");
        })
    }

    fn ensure_running(&self) -> ServerResult<()> {
        if self.coordinator.is_shutting_down() {
            return Err(ServerError::ShuttingDown);
        }
        Ok(())
    }
}

impl std::fmt::Debug for VersionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionServer")
            .field("config", &self.config)
            .field("documents", &self.documents.read().len())
            .finish_non_exhaustive()
    }
}

fn flush_all(documents: &[Arc<ServerDocument>]) -> ServerResult<usize> {
    let mut flushed = 0;
    let mut first_error = None;
    for document in documents {
        match document.flush_if_dirty() {
            Ok(true) => flushed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(document = %document.id(), error = %e, "flush failed");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(flushed),
    }
}

fn validate_document_id(id: &str) -> ServerResult<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ServerError::InvalidRequest(format!(
            "invalid document id {id:?}"
        )))
    }
}

fn history_path(root: &Path, id: &str) -> PathBuf {
    root.join(format!("{id}.{HISTORY_EXTENSION}"))
}

fn description_path(root: &Path, id: &str) -> PathBuf {
    root.join(format!("{id}.{DESCRIPTION_EXTENSION}"))
}

/// Loads every `<id>.history` under `root`.
fn load_documents(root: &Path, config: &ServerConfig) -> ServerResult<Vec<ServerDocument>> {
    let entries = std::fs::read_dir(root).map_err(revisor_storage::StorageError::from)?;
    let mut documents = Vec::new();

    for entry in entries {
        let path = entry.map_err(revisor_storage::StorageError::from)?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(HISTORY_EXTENSION) {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        let description = std::fs::read_to_string(description_path(root, &id)).unwrap_or_default();
        let loaded = HistoryStore::open(&path, config.sync_on_commit)
            .map_err(ServerError::from)
            .and_then(|store| {
                ServerDocument::restore(id.clone(), description, store, config.checkpoint_interval)
            });

        match loaded {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable history");
            }
        }
    }

    Ok(documents)
}
