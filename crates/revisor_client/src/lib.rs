//! # Revisor Client
//!
//! Client sync session for Revisor.
//!
//! This crate provides:
//! - `ClientSyncSession`: pull, checkout, update and commit of versioned documents
//! - Retry with exponential backoff for idempotent reads
//! - Transport abstraction, with a loopback transport for in-process servers
//!
//! ## Workflow
//!
//! 1. `checkout` a document at some revision
//! 2. Edit it with `apply_local_change`
//! 3. `commit` the edits; on a conflict, inspect the conflicting operations,
//!    `update` and edit again
//!
//! A session never merges: a commit either applies in full or is rejected
//! with the local state untouched.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod session;
mod transport;

pub use config::{ClientConfig, RetryConfig};
pub use error::{ClientError, ClientResult};
pub use session::{ClientSyncSession, VersionedDocument};
pub use transport::{LoopbackTransport, MockTransport, VersionTransport};
