//! # Revisor Server
//!
//! Version server for Revisor.
//!
//! This crate provides:
//! - Per-document change histories with checkpoints and a revision log cache
//! - Commit coordination with per-document commit locks and conflict checks
//! - History persistence (one framed history file per document)
//! - Authorization (HMAC-SHA256 tokens or a static token table)
//! - Protocol message dispatch
//!
//! # Commits
//!
//! A client commits its local changes together with the revision it
//! started from (the baseline). The server collects every change accepted
//! after the baseline and rejects the commit if any of them touches a key
//! the client also touched. Nothing is merged: a rejected client must
//! update and retry.
//!
//! # Authentication
//!
//! ```rust
//! use revisor_history::UserId;
//! use revisor_server::{AuthConfig, HmacAuthorizer, ServerConfig, VersionServer};
//!
//! let auth = AuthConfig::new(b"my-secure-secret-32-bytes-long!".to_vec());
//! let server = VersionServer::open(ServerConfig::default().with_auth(auth.clone())).unwrap();
//!
//! let token = HmacAuthorizer::new(auth).issue_token(&UserId::new("alice")).unwrap();
//! server.create_project(&token, "pizza", "Pizza ontology").unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod coordinator;
mod document;
mod error;
mod handler;
mod server;

pub use auth::{AuthConfig, Authorizer, HmacAuthorizer, OpenAuthorizer, StaticTokenAuthorizer};
pub use config::ServerConfig;
pub use coordinator::CommitCoordinator;
pub use document::ServerDocument;
pub use error::{ServerError, ServerResult};
pub use server::VersionServer;
