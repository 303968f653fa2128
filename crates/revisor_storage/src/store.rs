//! Persistent, append-only revision history files.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use crate::record::{decode_record, encode_record, parse_header, CRC_SIZE, HEADER_SIZE};
use parking_lot::Mutex;
use revisor_history::{ChangeHistory, DocumentRevision, RevisionBundle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct StoreInner {
    backend: Box<dyn StorageBackend>,
    head: Option<DocumentRevision>,
    /// A failed append left bytes that could not be cut off again.
    broken: bool,
}

/// An append-only file of revision bundles.
///
/// Records must be appended in revision order. Appends mark the store
/// dirty until the next [`flush_if_dirty`](Self::flush_if_dirty), unless
/// the store syncs on every write.
///
/// Opening a store scans and validates every record; a torn tail, bad
/// checksum or revision gap is reported as
/// [`StorageError::InvalidHistoryFile`].
pub struct HistoryStore {
    name: String,
    inner: Mutex<StoreInner>,
    sync_on_write: bool,
    dirty: AtomicBool,
}

impl HistoryStore {
    /// Wraps a backend, validating what it already holds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidHistoryFile`] if the existing bytes
    /// are not a valid history.
    pub fn from_backend(
        name: impl Into<String>,
        backend: Box<dyn StorageBackend>,
        sync_on_write: bool,
    ) -> StorageResult<Self> {
        let name = name.into();
        let bundles = scan(&name, backend.as_ref())?;
        let head = bundles.last().map(|b| b.revision);

        Ok(Self {
            name,
            inner: Mutex::new(StoreInner {
                backend,
                head,
                broken: false,
            }),
            sync_on_write,
            dirty: AtomicBool::new(false),
        })
    }

    /// Creates an empty store held in memory.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(StoreInner {
                backend: Box::new(InMemoryBackend::new()),
                head: None,
                broken: false,
            }),
            sync_on_write: false,
            dirty: AtomicBool::new(false),
        }
    }

    /// Creates a new history file.
    ///
    /// # Errors
    ///
    /// Fails with an `AlreadyExists` I/O error if the file exists.
    pub fn create(path: &Path, sync_on_write: bool) -> StorageResult<Self> {
        let backend = FileBackend::create(path)?;
        Self::from_backend(path.display().to_string(), Box::new(backend), sync_on_write)
    }

    /// Opens an existing history file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist and
    /// [`StorageError::InvalidHistoryFile`] if it cannot be read back.
    pub fn open(path: &Path, sync_on_write: bool) -> StorageResult<Self> {
        let backend = FileBackend::open(path)?;
        Self::from_backend(path.display().to_string(), Box::new(backend), sync_on_write)
    }

    /// Opens the file if it exists, otherwise creates it.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open) and [`create`](Self::create).
    pub fn open_or_create(path: &Path, sync_on_write: bool) -> StorageResult<Self> {
        match Self::open(path, sync_on_write) {
            Err(e) if e.is_not_found() => Self::create(path, sync_on_write),
            other => other,
        }
    }

    /// Returns the store name (the file path for file stores).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the revision of the last stored record.
    pub fn head_revision(&self) -> Option<DocumentRevision> {
        self.inner.lock().head
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().head.is_none()
    }

    /// Returns true if appended records have not been flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Returns the size of the store in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn size(&self) -> StorageResult<u64> {
        self.inner.lock().backend.size()
    }

    /// Appends one bundle as a record.
    ///
    /// The first record may carry any revision; later ones must follow the
    /// previous record exactly. With sync-on-write the record counts as
    /// appended only once it is synced.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OutOfOrder`] for a revision gap, or an I/O
    /// error. On error the record is cut off again and the store's head is
    /// unchanged. If even that fails, every later append is refused with
    /// [`StorageError::InvalidHistoryFile`].
    pub fn append(&self, bundle: &RevisionBundle) -> StorageResult<u64> {
        let mut inner = self.inner.lock();
        if inner.broken {
            return Err(StorageError::invalid(
                &self.name,
                "a failed append could not be rolled back",
            ));
        }
        if let Some(head) = inner.head {
            let expected = head.next();
            if bundle.revision != expected {
                return Err(StorageError::OutOfOrder {
                    expected,
                    actual: bundle.revision,
                });
            }
        }

        let data = encode_record(bundle)?;
        let size_before = inner.backend.size()?;
        let offset = match write_record(inner.backend.as_mut(), &data, self.sync_on_write) {
            Ok(offset) => offset,
            Err(e) => {
                match inner.backend.truncate(size_before) {
                    Ok(()) => tracing::warn!(
                        store = %self.name,
                        revision = %bundle.revision,
                        error = %e,
                        "append failed, record discarded"
                    ),
                    Err(rollback) => {
                        inner.broken = true;
                        tracing::error!(
                            store = %self.name,
                            revision = %bundle.revision,
                            error = %rollback,
                            "append failed and could not be rolled back"
                        );
                    }
                }
                return Err(e);
            }
        };
        inner.head = Some(bundle.revision);
        if !self.sync_on_write {
            self.dirty.store(true, Ordering::Release);
        }

        tracing::debug!(
            store = %self.name,
            revision = %bundle.revision,
            offset,
            bytes = data.len(),
            "appended history record"
        );
        Ok(offset)
    }

    /// Flushes and syncs the store if it has unflushed records.
    ///
    /// Returns true if a flush happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails; the store stays dirty.
    pub fn flush_if_dirty(&self) -> StorageResult<bool> {
        let mut inner = self.inner.lock();
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(false);
        }
        inner.backend.flush()?;
        inner.backend.sync()?;
        self.dirty.store(false, Ordering::Release);
        tracing::debug!(store = %self.name, "flushed history store");
        Ok(true)
    }

    /// Reads every stored bundle in revision order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidHistoryFile`] if a record is damaged.
    pub fn read_all(&self) -> StorageResult<Vec<RevisionBundle>> {
        let inner = self.inner.lock();
        scan(&self.name, inner.backend.as_ref())
    }

    /// Reads the bundles with revision in `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidHistoryFile`] if a record is damaged.
    pub fn read_range(
        &self,
        from: DocumentRevision,
        to: DocumentRevision,
    ) -> StorageResult<Vec<RevisionBundle>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|b| b.revision >= from && b.revision < to)
            .collect())
    }

    /// Rebuilds the in-memory history from the stored records.
    ///
    /// An empty store yields an empty history starting at revision 1.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidHistoryFile`] if a record is damaged.
    pub fn load_history(&self) -> StorageResult<ChangeHistory> {
        let bundles = self.read_all()?;
        let start = bundles
            .first()
            .map_or(DocumentRevision::START, |b| b.revision);
        ChangeHistory::from_bundles(start, bundles.into_iter().map(Arc::new))
            .map_err(|e| StorageError::invalid(&self.name, e.to_string()))
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("name", &self.name)
            .field("sync_on_write", &self.sync_on_write)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

fn write_record(
    backend: &mut dyn StorageBackend,
    data: &[u8],
    sync: bool,
) -> StorageResult<u64> {
    let offset = backend.append(data)?;
    if sync {
        backend.flush()?;
        backend.sync()?;
    }
    Ok(offset)
}

/// Reads and validates every record in `backend`.
fn scan(name: &str, backend: &dyn StorageBackend) -> StorageResult<Vec<RevisionBundle>> {
    let size = backend.size()?;
    let mut offset = 0u64;
    let mut bundles: Vec<RevisionBundle> = Vec::new();

    while offset < size {
        let remaining = size - offset;
        if remaining < (HEADER_SIZE + CRC_SIZE) as u64 {
            return Err(StorageError::invalid(
                name,
                format!("torn record header at offset {offset}"),
            ));
        }

        let header = backend.read_at(offset, HEADER_SIZE)?;
        let payload_len = parse_header(name, offset, &header)?;
        let record_len = HEADER_SIZE + payload_len + CRC_SIZE;
        if record_len as u64 > remaining {
            return Err(StorageError::invalid(
                name,
                format!("torn record at offset {offset}"),
            ));
        }

        let record = backend.read_at(offset, record_len)?;
        let bundle = decode_record(name, offset, &record)?;

        if let Some(prev) = bundles.last() {
            if bundle.revision != prev.revision.next() {
                return Err(StorageError::invalid(
                    name,
                    format!(
                        "revision gap at offset {offset}: expected {}, found {}",
                        prev.revision.next(),
                        bundle.revision
                    ),
                ));
            }
        }

        bundles.push(bundle);
        offset += record_len as u64;
    }

    Ok(bundles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use revisor_history::{ChangeMetadata, ChangeOperation, Statement, UserId};
    use tempfile::tempdir;

    /// Memory backend whose next `sync_failures` syncs fail.
    struct FailingSync {
        bytes: InMemoryBackend,
        sync_failures: u32,
        truncate_fails: bool,
    }

    impl FailingSync {
        fn boxed(sync_failures: u32, truncate_fails: bool) -> Box<dyn StorageBackend> {
            Box::new(Self {
                bytes: InMemoryBackend::new(),
                sync_failures,
                truncate_fails,
            })
        }
    }

    impl StorageBackend for FailingSync {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.bytes.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.bytes.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn size(&self) -> StorageResult<u64> {
            self.bytes.size()
        }

        fn sync(&mut self) -> StorageResult<()> {
            if self.sync_failures > 0 {
                self.sync_failures -= 1;
                return Err(std::io::Error::other("disk full").into());
            }
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> StorageResult<()> {
            if self.truncate_fails {
                return Err(std::io::Error::other("read-only").into());
            }
            self.bytes.truncate(len)
        }
    }

    fn bundle(revision: u64) -> RevisionBundle {
        RevisionBundle::new(
            DocumentRevision::new(revision),
            ChangeMetadata::with_timestamp(UserId::new("alice"), revision, format!("r{revision}")),
            vec![ChangeOperation::AddStatement(Statement::new(format!("S{revision}")))],
        )
    }

    #[test]
    fn append_marks_dirty_until_flushed() {
        let store = HistoryStore::in_memory("mem");
        assert!(!store.is_dirty());

        store.append(&bundle(1)).unwrap();
        assert!(store.is_dirty());
        assert!(store.flush_if_dirty().unwrap());
        assert!(!store.is_dirty());
        assert!(!store.flush_if_dirty().unwrap());
    }

    #[test]
    fn rejects_out_of_order_append() {
        let store = HistoryStore::in_memory("mem");
        store.append(&bundle(1)).unwrap();
        let err = store.append(&bundle(3)).unwrap_err();
        assert!(matches!(err, StorageError::OutOfOrder { .. }));
        assert_eq!(store.head_revision(), Some(DocumentRevision::new(1)));
    }

    #[test]
    fn read_range_and_load_history() {
        let store = HistoryStore::in_memory("mem");
        for r in 1..=5 {
            store.append(&bundle(r)).unwrap();
        }

        let range = store
            .read_range(DocumentRevision::new(2), DocumentRevision::new(4))
            .unwrap();
        let revisions: Vec<_> = range.iter().map(|b| b.revision.as_u64()).collect();
        assert_eq!(revisions, vec![2, 3]);

        let history = store.load_history().unwrap();
        assert_eq!(history.head_revision(), DocumentRevision::new(5));
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn mirror_may_start_past_one() {
        let store = HistoryStore::in_memory("mirror");
        store.append(&bundle(4)).unwrap();
        store.append(&bundle(5)).unwrap();

        let history = store.load_history().unwrap();
        assert_eq!(history.start_revision(), DocumentRevision::new(4));
        assert_eq!(history.head_revision(), DocumentRevision::new(5));
    }

    #[test]
    fn file_store_round_trips_through_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pizza.history");

        {
            let store = HistoryStore::create(&path, false).unwrap();
            store.append(&bundle(1)).unwrap();
            store.append(&bundle(2)).unwrap();
            store.flush_if_dirty().unwrap();
        }

        let store = HistoryStore::open(&path, false).unwrap();
        assert_eq!(store.head_revision(), Some(DocumentRevision::new(2)));
        assert_eq!(store.read_all().unwrap(), vec![bundle(1), bundle(2)]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = HistoryStore::open(&dir.path().join("absent.history"), false).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.history");
        HistoryStore::create(&path, false).unwrap();
        assert!(HistoryStore::create(&path, false).is_err());
        assert!(HistoryStore::open_or_create(&path, false).is_ok());
    }

    #[test]
    fn torn_tail_is_invalid() {
        let mut bytes = Vec::new();
        bytes.extend(encode_record(&bundle(1)).unwrap());
        let second = encode_record(&bundle(2)).unwrap();
        bytes.extend(&second[..second.len() - 3]);

        let err = HistoryStore::from_backend("torn", Box::new(InMemoryBackend::with_data(bytes)), false)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidHistoryFile { .. }));
    }

    #[test]
    fn garbage_file_is_invalid_not_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.history");
        std::fs::write(&path, b"this is not a history file at all").unwrap();

        let err = HistoryStore::open(&path, false).unwrap_err();
        assert!(matches!(err, StorageError::InvalidHistoryFile { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn revision_gap_in_file_is_invalid() {
        let mut bytes = encode_record(&bundle(1)).unwrap();
        bytes.extend(encode_record(&bundle(3)).unwrap());

        let err = HistoryStore::from_backend("gap", Box::new(InMemoryBackend::with_data(bytes)), false)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidHistoryFile { .. }));
    }

    #[test]
    fn sync_on_write_never_dirty() {
        let store = HistoryStore::from_backend("sync", Box::new(InMemoryBackend::new()), true).unwrap();
        store.append(&bundle(1)).unwrap();
        assert!(!store.is_dirty());
    }

    #[test]
    fn failed_sync_discards_the_record() {
        let store = HistoryStore::from_backend("flaky", FailingSync::boxed(1, false), true).unwrap();
        store.append(&bundle(1)).unwrap();

        assert!(matches!(store.append(&bundle(2)), Err(StorageError::Io(_))));
        assert_eq!(store.head_revision(), Some(DocumentRevision::new(1)));
        assert_eq!(store.read_all().unwrap(), vec![bundle(1)]);

        store.append(&bundle(2)).unwrap();
        assert_eq!(store.read_all().unwrap(), vec![bundle(1), bundle(2)]);
    }

    #[test]
    fn failed_rollback_refuses_later_appends() {
        let store = HistoryStore::from_backend("stuck", FailingSync::boxed(1, true), true).unwrap();

        assert!(matches!(store.append(&bundle(1)), Err(StorageError::Io(_))));
        assert!(store.is_empty());
        assert!(matches!(
            store.append(&bundle(1)),
            Err(StorageError::InvalidHistoryFile { .. })
        ));
    }

    proptest! {
        #[test]
        fn truncated_file_is_valid_only_on_record_boundaries(cut in 0usize..512) {
            let records: Vec<Vec<u8>> = (1..=3).map(|r| encode_record(&bundle(r)).unwrap()).collect();
            let bytes = records.concat();
            let cut = cut.min(bytes.len());

            let mut boundaries = vec![0usize];
            for record in &records {
                boundaries.push(boundaries[boundaries.len() - 1] + record.len());
            }

            let result = HistoryStore::from_backend(
                "cut",
                Box::new(InMemoryBackend::with_data(bytes[..cut].to_vec())),
                false,
            );
            match boundaries.iter().position(|&b| b == cut) {
                Some(kept) => {
                    let store = result.unwrap();
                    prop_assert_eq!(store.read_all().unwrap().len(), kept);
                }
                None => {
                    let is_invalid = matches!(result, Err(StorageError::InvalidHistoryFile { .. }));
                    prop_assert!(is_invalid);
                }
            }
        }
    }
}
