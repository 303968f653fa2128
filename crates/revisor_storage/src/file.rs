//! History files on disk.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The open file together with the length already written to it.
#[derive(Debug)]
struct Handle {
    file: File,
    len: u64,
}

/// A storage backend over a single file.
///
/// The file handle and its length sit behind one lock so that a read's
/// seek can never interleave with an append. `flush()` pushes buffered
/// bytes to the OS and `sync()` waits until they reach the disk.
///
/// # Example
///
/// ```no_run
/// use revisor_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::create(Path::new("pizza.history")).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    handle: Mutex<Handle>,
}

impl FileBackend {
    /// Creates a new, empty file, along with any missing parent directories.
    ///
    /// # Errors
    ///
    /// Fails with an `AlreadyExists` I/O error if something is already at
    /// `path`.
    pub fn create(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(true)
            .open(path)?;
        Ok(Self::wrap(path, file, 0))
    }

    /// Opens an existing file for reading and appending.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing is at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = match OpenOptions::new().read(true).append(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        Ok(Self::wrap(path, file, len))
    }

    fn wrap(path: &Path, file: File, len: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            handle: Mutex::new(Handle { file, len }),
        }
    }

    /// Returns the path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut handle = self.handle.lock();
        let size = handle.len;
        match offset.checked_add(len as u64) {
            Some(end) if end <= size => {}
            _ => return Err(StorageError::ReadPastEnd { offset, len, size }),
        }

        let mut buf = vec![0u8; len];
        if len > 0 {
            handle.file.seek(SeekFrom::Start(offset))?;
            handle.file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let handle = self.handle.get_mut();
        let offset = handle.len;
        // Opened in append mode, so writes land at the end regardless of
        // where the last read left the cursor.
        handle.file.write_all(data)?;
        handle.len += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(self.handle.get_mut().file.flush()?)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.handle.lock().len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(self.handle.get_mut().file.sync_data()?)
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        let handle = self.handle.get_mut();
        if len > handle.len {
            return Err(StorageError::ReadPastEnd {
                offset: len,
                len: 0,
                size: handle.len,
            });
        }
        handle.file.set_len(len)?;
        handle.len = len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_follow_appends() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::create(&dir.path().join("doc.history")).unwrap();

        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert_eq!(backend.read_at(1, 2).unwrap(), b"bc");
        assert_eq!(backend.append(b"defg").unwrap(), 3);
        assert_eq!(backend.read_at(0, 7).unwrap(), b"abcdefg");
        assert!(backend.read_at(7, 0).unwrap().is_empty());
        assert!(matches!(
            backend.read_at(5, 3),
            Err(StorageError::ReadPastEnd { size: 7, .. })
        ));
    }

    #[test]
    fn reopen_sees_synced_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.history");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"persistent").unwrap();
        backend.sync().unwrap();
        drop(backend);

        let mut backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 10);
        assert_eq!(backend.append(b"!").unwrap(), 10);
        assert_eq!(backend.read_at(0, 11).unwrap(), b"persistent!");
    }

    #[test]
    fn truncate_discards_the_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.history");
        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"keep-drop").unwrap();

        backend.truncate(4).unwrap();
        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.append(b"!").unwrap(), 4);
        backend.sync().unwrap();
        drop(backend);

        assert_eq!(std::fs::read(&path).unwrap(), b"keep!");
    }

    #[test]
    fn create_and_open_are_distinct() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("projects").join("nested").join("doc.history");

        assert!(FileBackend::open(&path).unwrap_err().is_not_found());
        let backend = FileBackend::create(&path).unwrap();
        assert_eq!(backend.path(), path);

        let err = FileBackend::create(&path).unwrap_err();
        assert!(matches!(err, StorageError::Io(ref e) if e.kind() == io::ErrorKind::AlreadyExists));
    }
}
