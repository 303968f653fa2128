//! # Revisor Storage
//!
//! Storage backends and history files for Revisor.
//!
//! Backends are **opaque byte stores**; [`HistoryStore`] layers the
//! framed, checksummed record format for revision bundles on top of them.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and servers without a data directory
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use revisor_history::{ChangeMetadata, DocumentRevision, RevisionBundle, UserId};
//! use revisor_storage::HistoryStore;
//!
//! let store = HistoryStore::in_memory("example");
//! let bundle = RevisionBundle::new(
//!     DocumentRevision::START,
//!     ChangeMetadata::new(UserId::new("alice"), "first"),
//!     vec![],
//! );
//! store.append(&bundle).unwrap();
//! assert!(store.is_dirty());
//! assert_eq!(store.read_all().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod record;
mod store;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use record::{compute_crc32, HISTORY_MAGIC, HISTORY_VERSION};
pub use store::HistoryStore;
