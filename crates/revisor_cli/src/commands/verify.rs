//! Verify command implementation.

use revisor_history::{from_cbor, DocumentRevision, RevisionBundle};
use revisor_storage::{compute_crc32, FileBackend, StorageBackend, HISTORY_MAGIC, HISTORY_VERSION};
use std::path::Path;

const HEADER_SIZE: u64 = 10;
const CRC_SIZE: u64 = 4;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: usize,
    /// Number of valid records.
    pub valid_records: usize,
    /// Number of corrupt records.
    pub corrupt_records: usize,
    /// Revision of the last valid record.
    pub head: Option<DocumentRevision>,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.corrupt_records == 0 && self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying history file {:?}", path);
    println!();

    let backend = FileBackend::open(path)?;
    let result = verify_records(&backend)?;
    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ History verification passed");
        Ok(())
    } else {
        println!("✗ History verification failed");
        Err("Verification failed".into())
    }
}

/// Walks every record, stopping at the first one that cannot be framed.
fn verify_records(backend: &dyn StorageBackend) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    let size = backend.size()?;
    let mut offset = 0u64;

    while offset < size {
        result.records_checked += 1;

        if offset + HEADER_SIZE > size {
            result
                .errors
                .push(format!("Torn header at offset {}", offset));
            result.corrupt_records += 1;
            break;
        }
        let header = backend.read_at(offset, HEADER_SIZE as usize)?;

        if header[0..4] != HISTORY_MAGIC {
            result.errors.push(format!(
                "Invalid magic at offset {}: expected RVHS, got {:?}",
                offset,
                &header[0..4]
            ));
            result.corrupt_records += 1;
            break;
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != HISTORY_VERSION {
            result.errors.push(format!(
                "Unsupported version at offset {}: {}",
                offset, version
            ));
            result.corrupt_records += 1;
            break;
        }

        let len = u64::from(u32::from_le_bytes([header[6], header[7], header[8], header[9]]));
        let record_len = HEADER_SIZE + len + CRC_SIZE;
        if offset + record_len > size {
            result.errors.push(format!(
                "Torn record at offset {}: needs {} bytes, {} left",
                offset,
                record_len,
                size - offset
            ));
            result.corrupt_records += 1;
            break;
        }

        let record = backend.read_at(offset, record_len as usize)?;
        let body_len = record.len() - CRC_SIZE as usize;
        let (body, crc_bytes) = record.split_at(body_len);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if compute_crc32(body) != stored {
            result
                .errors
                .push(format!("Checksum mismatch at offset {}", offset));
            result.corrupt_records += 1;
            offset += record_len;
            continue;
        }

        match from_cbor::<RevisionBundle>(&body[HEADER_SIZE as usize..]) {
            Ok(bundle) => {
                if let Some(head) = result.head {
                    if bundle.revision != head.next() {
                        result.errors.push(format!(
                            "Revision gap at offset {}: expected {}, got {}",
                            offset,
                            head.next(),
                            bundle.revision
                        ));
                    }
                }
                result.head = Some(bundle.revision);
                result.valid_records += 1;
            }
            Err(e) => {
                result
                    .errors
                    .push(format!("Undecodable bundle at offset {}: {}", offset, e));
                result.corrupt_records += 1;
            }
        }

        offset += record_len;
    }

    Ok(result)
}

fn print_result(result: &VerifyResult) {
    println!(
        "  Records checked: {}, valid: {}, corrupt: {}",
        result.records_checked, result.valid_records, result.corrupt_records
    );
    if let Some(head) = result.head {
        println!("  Last valid revision: {}", head);
    }
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisor_history::{ChangeMetadata, ChangeOperation, Statement, UserId};
    use revisor_storage::HistoryStore;
    use tempfile::tempdir;

    fn write_history(path: &Path, revisions: u64) {
        let store = HistoryStore::create(path, true).unwrap();
        for r in 1..=revisions {
            store
                .append(&RevisionBundle::new(
                    DocumentRevision::new(r),
                    ChangeMetadata::with_timestamp(UserId::new("alice"), r, "c"),
                    vec![ChangeOperation::AddStatement(Statement::new(format!("S{r}")))],
                ))
                .unwrap();
        }
    }

    #[test]
    fn clean_file_verifies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.history");
        write_history(&path, 3);

        let result = verify_records(&FileBackend::open(&path).unwrap()).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.valid_records, 3);
        assert_eq!(result.head, Some(DocumentRevision::new(3)));
    }

    #[test]
    fn flipped_byte_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.history");
        write_history(&path, 2);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[12] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let result = verify_records(&FileBackend::open(&path).unwrap()).unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.corrupt_records, 1);
        assert_eq!(result.valid_records, 1);
    }

    #[test]
    fn torn_tail_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.history");
        write_history(&path, 2);

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let result = verify_records(&FileBackend::open(&path).unwrap()).unwrap();
        assert_eq!(result.valid_records, 1);
        assert!(result.errors[0].contains("Torn record"));
    }
}
