//! On-disk record framing for the queue logs.
//!
//! ```text
//! magic "OBXL" (4) | version (2) | type (1) | length (4) | id (16) | CBOR body | crc32 (4)
//! ```
//!
//! `length` covers `id + body`. The CRC covers everything before it.
//! Integers are little-endian.

use crate::error::{StoreError, StoreResult};
use crate::id::OperationId;

/// Magic bytes opening every record.
pub const LOG_MAGIC: [u8; 4] = *b"OBXL";

/// Current record format version.
pub const LOG_VERSION: u16 = 1;

/// Header size: magic + version + type + length.
pub const HEADER_SIZE: usize = 11;

/// Size of the id prefix inside the record payload.
pub const ID_SIZE: usize = 16;

/// Size of the trailing checksum.
pub const CRC_SIZE: usize = 4;

/// Kind of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Upsert of the entry with the record's id.
    Put = 1,
    /// Removal of the entry with the record's id.
    Delete = 2,
}

impl RecordType {
    /// Parses a record type byte.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Decoded fixed-size record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record kind.
    pub record_type: RecordType,
    /// Length of `id + body`.
    pub payload_len: u32,
}

impl RecordHeader {
    /// Parses a header read from `offset`.
    pub fn parse(bytes: &[u8], offset: u64) -> StoreResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::corrupted(offset, "short header"));
        }
        if bytes[0..4] != LOG_MAGIC {
            return Err(StoreError::corrupted(offset, "bad magic"));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != LOG_VERSION {
            return Err(StoreError::corrupted(
                offset,
                format!("unsupported record version {version}"),
            ));
        }
        let record_type = RecordType::from_byte(bytes[6]).ok_or_else(|| {
            StoreError::corrupted(offset, format!("unknown record type {}", bytes[6]))
        })?;
        let payload_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
        if (payload_len as usize) < ID_SIZE {
            return Err(StoreError::corrupted(offset, "payload shorter than id"));
        }
        Ok(Self {
            record_type,
            payload_len,
        })
    }

    /// Total on-disk size of the record this header opens.
    #[must_use]
    pub fn record_len(&self) -> u64 {
        (HEADER_SIZE + self.payload_len as usize + CRC_SIZE) as u64
    }
}

/// Frames one record.
pub fn encode_record(record_type: RecordType, id: &OperationId, body: &[u8]) -> StoreResult<Vec<u8>> {
    let payload_len = u32::try_from(ID_SIZE + body.len())
        .map_err(|_| StoreError::Codec(format!("record body too large: {} bytes", body.len())))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload_len as usize + CRC_SIZE);
    buf.extend_from_slice(&LOG_MAGIC);
    buf.extend_from_slice(&LOG_VERSION.to_le_bytes());
    buf.push(record_type as u8);
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(id.as_bytes());
    buf.extend_from_slice(body);
    let crc = crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Splits `header + payload + crc` bytes, verifying the checksum.
///
/// Returns the id and the body, or `None` on checksum mismatch.
pub fn verify_record(bytes: &[u8]) -> Option<(OperationId, &[u8])> {
    if bytes.len() < HEADER_SIZE + ID_SIZE + CRC_SIZE {
        return None;
    }
    let (framed, crc_bytes) = bytes.split_at(bytes.len() - CRC_SIZE);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    if crc32(framed) != stored {
        return None;
    }
    let mut id = [0u8; ID_SIZE];
    id.copy_from_slice(&framed[HEADER_SIZE..HEADER_SIZE + ID_SIZE]);
    Some((OperationId::from_bytes(id), &framed[HEADER_SIZE + ID_SIZE..]))
}

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 == 1 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// CRC-32 (IEEE) of `data`.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(!0u32, |crc, &b| {
        CRC_TABLE[((crc ^ u32::from(b)) & 0xFF) as usize] ^ (crc >> 8)
    })
}
