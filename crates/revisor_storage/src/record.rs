//! History record framing.
//!
//! Every revision bundle is stored as one self-delimiting record:
//!
//! ```text
//! | magic "RVHS" (4) | version u16 LE | length u32 LE | CBOR bundle | CRC32 LE |
//! ```
//!
//! The CRC covers everything before it.

use crate::error::{StorageError, StorageResult};
use revisor_history::{from_cbor, to_cbor, RevisionBundle};

/// Record magic.
pub const HISTORY_MAGIC: [u8; 4] = *b"RVHS";

/// Record format version.
pub const HISTORY_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
pub(crate) const HEADER_SIZE: usize = 10;

pub(crate) const CRC_SIZE: usize = 4;

/// Frames a bundle as a history record.
pub(crate) fn encode_record(bundle: &RevisionBundle) -> StorageResult<Vec<u8>> {
    let payload = to_cbor(bundle)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "history record payload too large",
        )
    })?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&HISTORY_MAGIC);
    data.extend_from_slice(&HISTORY_VERSION.to_le_bytes());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Validates a record header and returns the payload length.
pub(crate) fn parse_header(name: &str, offset: u64, header: &[u8]) -> StorageResult<usize> {
    if header.len() < HEADER_SIZE || header[0..4] != HISTORY_MAGIC {
        return Err(StorageError::invalid(
            name,
            format!("bad record magic at offset {offset}"),
        ));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != HISTORY_VERSION {
        return Err(StorageError::invalid(
            name,
            format!("unsupported record version {version} at offset {offset}"),
        ));
    }
    let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
    Ok(len as usize)
}

/// Checks the CRC of a full record and decodes its bundle.
pub(crate) fn decode_record(name: &str, offset: u64, record: &[u8]) -> StorageResult<RevisionBundle> {
    if record.len() < HEADER_SIZE + CRC_SIZE {
        return Err(StorageError::invalid(
            name,
            format!("short record at offset {offset}"),
        ));
    }
    let body_len = record.len() - CRC_SIZE;
    let (body, crc_bytes) = record.split_at(body_len);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

    if compute_crc32(body) != stored {
        return Err(StorageError::invalid(
            name,
            format!("checksum mismatch at offset {offset}"),
        ));
    }

    from_cbor(&body[HEADER_SIZE..]).map_err(|e| {
        StorageError::invalid(name, format!("undecodable record at offset {offset}: {e}"))
    })
}

/// Computes a CRC32 checksum (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
