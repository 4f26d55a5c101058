// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Log record framing.
//!
//! # Binary Format
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ RecordHeader (32 bytes)                                      │
//! │   0..7   magic "SANGITA"                                     │
//! │   7      version                                             │
//! │   8..12  record length (u32 LE, header + payload + checksum) │
//! │   12..16 reserved                                            │
//! │   16..24 lsn (u64 LE)                                        │
//! │   24     op type                                             │
//! │   25..32 reserved                                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │ payload (variable)                                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ CRC-32 IEEE of header + payload (u32 LE)                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use super::payload::{malformed, DeletePayload, InsertPayload};
use super::{CHECKSUM_SIZE, MAGIC, MIN_RECORD_SIZE, RECORD_HEADER_SIZE, WAL_VERSION};
use crate::error::{Result, SangitaError};

/// Kind of mutation a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpType {
    /// New vector.
    Insert = 1,
    /// Removed vector.
    Delete = 2,
    /// Replaced vector.
    Update = 3,
}

impl OpType {
    /// Maps a raw header byte back to an op type.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Insert),
            2 => Some(Self::Delete),
            3 => Some(Self::Update),
            _ => None,
        }
    }
}

/// Fixed-size prefix of every record.
///
/// The magic is written by [`to_bytes`](Self::to_bytes) and checked
/// separately with [`has_magic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Format version.
    pub version: u8,
    /// Total record size in bytes, including this header and the checksum.
    pub record_length: u32,
    /// Log sequence number.
    pub lsn: u64,
    /// Raw [`OpType`] code.
    pub op_type: u8,
}

impl RecordHeader {
    /// Serializes the header; reserved bytes are zero.
    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..7].copy_from_slice(MAGIC);
        buf[7] = self.version;
        buf[8..12].copy_from_slice(&self.record_length.to_le_bytes());
        buf[16..24].copy_from_slice(&self.lsn.to_le_bytes());
        buf[24] = self.op_type;
        buf
    }

    /// Reads the header fields. Magic and version are not validated.
    pub fn from_bytes(buf: &[u8; RECORD_HEADER_SIZE]) -> Self {
        let mut len = [0u8; 4];
        len.copy_from_slice(&buf[8..12]);
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&buf[16..24]);
        Self {
            version: buf[7],
            record_length: u32::from_le_bytes(len),
            lsn: u64::from_le_bytes(lsn),
            op_type: buf[24],
        }
    }
}

/// Returns `true` if `buf` starts with the WAL magic.
pub fn has_magic(buf: &[u8]) -> bool {
    buf.len() >= MAGIC.len() && &buf[..MAGIC.len()] == MAGIC
}

/// A logged mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Vector added under a fresh id pair.
    Insert(InsertPayload),
    /// Vector removed.
    Delete(DeletePayload),
    /// Vector replaced in place; same layout as an insert.
    Update(InsertPayload),
}

impl Operation {
    /// Header code for this operation.
    pub fn op_type(&self) -> OpType {
        match self {
            Operation::Insert(_) => OpType::Insert,
            Operation::Delete(_) => OpType::Delete,
            Operation::Update(_) => OpType::Update,
        }
    }

    /// External id the operation applies to.
    pub fn external_id(&self) -> &str {
        match self {
            Operation::Insert(p) | Operation::Update(p) => &p.external_id,
            Operation::Delete(p) => &p.external_id,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Operation::Insert(p) | Operation::Update(p) => p.encoded_len(),
            Operation::Delete(p) => p.encoded_len(),
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Operation::Insert(p) | Operation::Update(p) => p.encode_into(buf),
            Operation::Delete(p) => p.encode_into(buf),
        }
    }
}

/// A decoded record: sequence number plus operation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Log sequence number, strictly increasing across the log.
    pub lsn: u64,
    /// The logged mutation.
    pub operation: Operation,
}

impl LogRecord {
    /// Frames the record: header, payload, checksum.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_record(self.lsn, &self.operation)
    }

    /// Parses one complete record and verifies its checksum.
    ///
    /// # Errors
    ///
    /// * `SangitaError::ChecksumMismatch` - If the stored CRC does not match
    /// * `SangitaError::CorruptedRecord` - If framing or payload are malformed
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_RECORD_SIZE {
            return Err(malformed(format!(
                "record of {} bytes is shorter than the {MIN_RECORD_SIZE}-byte minimum",
                bytes.len()
            )));
        }
        if !has_magic(bytes) {
            return Err(malformed("bad record magic"));
        }
        let mut raw = [0u8; RECORD_HEADER_SIZE];
        raw.copy_from_slice(&bytes[..RECORD_HEADER_SIZE]);
        let header = RecordHeader::from_bytes(&raw);
        if header.version != WAL_VERSION {
            return Err(malformed(format!(
                "unsupported record version {}",
                header.version
            )));
        }
        if header.record_length as usize != bytes.len() {
            return Err(malformed(format!(
                "record length {} does not match {} available bytes",
                header.record_length,
                bytes.len()
            )));
        }

        let body_end = bytes.len() - CHECKSUM_SIZE;
        let tail = &bytes[body_end..];
        let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let computed = crc32fast::hash(&bytes[..body_end]);
        if stored != computed {
            return Err(SangitaError::ChecksumMismatch {
                lsn: header.lsn,
                stored,
                computed,
            });
        }

        let payload = &bytes[RECORD_HEADER_SIZE..body_end];
        let operation = match OpType::from_code(header.op_type) {
            Some(OpType::Insert) => Operation::Insert(InsertPayload::decode(payload)?),
            Some(OpType::Delete) => Operation::Delete(DeletePayload::decode(payload)?),
            Some(OpType::Update) => Operation::Update(InsertPayload::decode(payload)?),
            None => {
                return Err(malformed(format!("unknown op type {}", header.op_type)));
            }
        };
        Ok(Self {
            lsn: header.lsn,
            operation,
        })
    }
}

/// Frames `operation` under `lsn` without cloning it.
pub(crate) fn encode_record(lsn: u64, operation: &Operation) -> Result<Vec<u8>> {
    let total = RECORD_HEADER_SIZE + operation.encoded_len() + CHECKSUM_SIZE;
    let record_length = u32::try_from(total).map_err(|_| SangitaError::PayloadTooLarge(total))?;
    let header = RecordHeader {
        version: WAL_VERSION,
        record_length,
        lsn,
        op_type: operation.op_type() as u8,
    };

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&header.to_bytes());
    operation.encode_into(&mut buf)?;
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}
