//! Server configuration.

use crate::auth::AuthConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the version server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding one `<id>.history` file per document.
    ///
    /// `None` keeps every history in memory.
    pub root_dir: Option<PathBuf>,
    /// How long a commit waits for a document's commit lock.
    pub commit_lock_timeout: Duration,
    /// Whether every accepted commit is synced to disk before returning.
    pub sync_on_commit: bool,
    /// A checkpoint is kept every this many revisions (0 disables).
    pub checkpoint_interval: u64,
    /// Maximum bundles returned by one fetch.
    pub max_fetch_bundles: u32,
    /// Signed-token authentication; `None` trusts the token as the user id.
    pub auth: Option<AuthConfig>,
}

impl ServerConfig {
    /// Creates an in-memory configuration.
    pub fn new() -> Self {
        Self {
            root_dir: None,
            commit_lock_timeout: Duration::from_secs(5),
            sync_on_commit: false,
            checkpoint_interval: 100,
            max_fetch_bundles: 1000,
            auth: None,
        }
    }

    /// Creates a configuration persisting histories under `root_dir`.
    pub fn persistent(root_dir: impl Into<PathBuf>) -> Self {
        Self::new().with_root_dir(root_dir)
    }

    /// Sets the history directory.
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    /// Sets the commit lock timeout.
    pub fn with_commit_lock_timeout(mut self, timeout: Duration) -> Self {
        self.commit_lock_timeout = timeout;
        self
    }

    /// Syncs every accepted commit to disk before acknowledging it.
    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    /// Sets the checkpoint interval.
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Sets the maximum fetch size.
    pub fn with_max_fetch_bundles(mut self, max: u32) -> Self {
        self.max_fetch_bundles = max.max(1);
        self
    }

    /// Enables signed-token authentication.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Returns true if requests must carry signed tokens.
    pub fn requires_auth(&self) -> bool {
        self.auth.is_some()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert!(config.root_dir.is_none());
        assert_eq!(config.commit_lock_timeout, Duration::from_secs(5));
        assert!(!config.requires_auth());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::persistent("/var/lib/revisor")
            .with_commit_lock_timeout(Duration::from_millis(200))
            .with_checkpoint_interval(10)
            .with_max_fetch_bundles(0)
            .with_auth(AuthConfig::new(vec![1, 2, 3, 4]));

        assert_eq!(config.root_dir, Some(PathBuf::from("/var/lib/revisor")));
        assert_eq!(config.checkpoint_interval, 10);
        assert_eq!(config.max_fetch_bundles, 1);
        assert!(config.requires_auth());
    }
}
