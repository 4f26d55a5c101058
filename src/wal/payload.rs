// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Record payload encodings.
//!
//! # Binary Layout
//!
//! All integers are little-endian; strings are length-prefixed UTF-8 with no
//! terminator; floats are raw IEEE-754 bit patterns.
//!
//! ```text
//! Insert / Update
//!   u16  external_id_len
//!   [u8] external_id
//!   u64  internal_id
//!   u32  vector_len
//!   u32  × vector_len   (f32 bits)
//!   u32  metadata_len
//!   [u8] metadata
//!
//! Delete
//!   u16  external_id_len
//!   [u8] external_id
//!   u64  internal_id
//! ```

use crate::error::{Result, SangitaError};
use crate::types::InternalId;

/// Payload of an insert or update record.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPayload {
    /// Externally visible identifier.
    pub external_id: String,
    /// Index key assigned to the vector.
    pub internal_id: InternalId,
    /// Vector components.
    pub vector: Vec<f32>,
    /// Opaque payload bytes.
    pub metadata: Vec<u8>,
}

impl InsertPayload {
    /// Size of the encoded payload in bytes.
    pub fn encoded_len(&self) -> usize {
        2 + self.external_id.len() + 8 + 4 + 4 * self.vector.len() + 4 + self.metadata.len()
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        put_external_id(buf, &self.external_id)?;
        buf.extend_from_slice(&self.internal_id.to_le_bytes());
        put_len_u32(buf, self.vector.len())?;
        for value in &self.vector {
            buf.extend_from_slice(&value.to_bits().to_le_bytes());
        }
        put_len_u32(buf, self.metadata.len())?;
        buf.extend_from_slice(&self.metadata);
        Ok(())
    }

    /// Decodes a payload that must span exactly `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let external_id = cursor.external_id()?;
        let internal_id = cursor.u64()?;
        let vector_len = cursor.u32()? as usize;
        let raw = cursor.take(
            vector_len
                .checked_mul(4)
                .ok_or_else(|| malformed("vector length overflows"))?,
        )?;
        let vector = raw
            .chunks_exact(4)
            .map(|c| f32::from_bits(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect();
        let metadata_len = cursor.u32()? as usize;
        let metadata = cursor.take(metadata_len)?.to_vec();
        cursor.finish()?;
        Ok(Self {
            external_id,
            internal_id,
            vector,
            metadata,
        })
    }
}

/// Payload of a delete record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePayload {
    /// Externally visible identifier.
    pub external_id: String,
    /// Index key that was removed.
    pub internal_id: InternalId,
}

impl DeletePayload {
    /// Size of the encoded payload in bytes.
    pub fn encoded_len(&self) -> usize {
        2 + self.external_id.len() + 8
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        put_external_id(buf, &self.external_id)?;
        buf.extend_from_slice(&self.internal_id.to_le_bytes());
        Ok(())
    }

    /// Decodes a payload that must span exactly `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let external_id = cursor.external_id()?;
        let internal_id = cursor.u64()?;
        cursor.finish()?;
        Ok(Self {
            external_id,
            internal_id,
        })
    }
}

fn put_external_id(buf: &mut Vec<u8>, id: &str) -> Result<()> {
    let len = u16::try_from(id.len()).map_err(|_| SangitaError::ExternalIdTooLong(id.len()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(id.as_bytes());
    Ok(())
}

fn put_len_u32(buf: &mut Vec<u8>, len: usize) -> Result<()> {
    let len32 = u32::try_from(len).map_err(|_| SangitaError::PayloadTooLarge(len))?;
    buf.extend_from_slice(&len32.to_le_bytes());
    Ok(())
}

/// Location is filled in by the segment reader.
pub(crate) fn malformed(reason: impl Into<String>) -> SangitaError {
    SangitaError::CorruptedRecord {
        segment_id: 0,
        offset: 0,
        reason: reason.into(),
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                malformed(format!(
                    "payload truncated: need {} bytes at {}, have {}",
                    n,
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    fn external_id(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| malformed("external id is not valid UTF-8"))
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(malformed(format!(
                "{} trailing bytes after payload",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_insert() -> InsertPayload {
        InsertPayload {
            external_id: "doc-1".to_string(),
            internal_id: 100,
            vector: vec![1.5, -2.0, 3.14],
            metadata: br#"{"key":"value"}"#.to_vec(),
        }
    }

    #[test]
    fn test_insert_size_and_layout() {
        let p = sample_insert();
        let expected = 2 + 5 + 8 + 4 + 4 * 3 + 4 + 15;
        assert_eq!(p.encoded_len(), expected);

        let mut buf = Vec::new();
        p.encode_into(&mut buf).unwrap();
        assert_eq!(buf.len(), expected);

        assert_eq!(u16::from_le_bytes([buf[0], buf[1]]), 5);
        assert_eq!(&buf[2..7], b"doc-1");
        let mut id = [0u8; 8];
        id.copy_from_slice(&buf[7..15]);
        assert_eq!(u64::from_le_bytes(id), 100);
        assert_eq!(u32::from_le_bytes([buf[15], buf[16], buf[17], buf[18]]), 3);
        let first = f32::from_bits(u32::from_le_bytes([buf[19], buf[20], buf[21], buf[22]]));
        assert_eq!(first, 1.5);
    }

    #[test]
    fn test_delete_size_and_layout() {
        let p = DeletePayload {
            external_id: "doc-1".to_string(),
            internal_id: 100,
        };
        let mut buf = Vec::new();
        p.encode_into(&mut buf).unwrap();
        assert_eq!(buf.len(), p.encoded_len());
        assert_eq!(buf.len(), 2 + 5 + 8);
        assert_eq!(DeletePayload::decode(&buf).unwrap(), p);
    }

    #[test]
    fn test_insert_decode_preserves_float_bits() {
        let mut p = sample_insert();
        p.vector = vec![-0.0, f32::MIN_POSITIVE, f32::MAX];
        let mut buf = Vec::new();
        p.encode_into(&mut buf).unwrap();
        let back = InsertPayload::decode(&buf).unwrap();
        let bits: Vec<u32> = back.vector.iter().map(|v| v.to_bits()).collect();
        let want: Vec<u32> = p.vector.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, want);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut buf = Vec::new();
        sample_insert().encode_into(&mut buf).unwrap();
        buf.pop();
        assert!(matches!(
            InsertPayload::decode(&buf),
            Err(SangitaError::CorruptedRecord { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let p = DeletePayload {
            external_id: "x".to_string(),
            internal_id: 1,
        };
        let mut buf = Vec::new();
        p.encode_into(&mut buf).unwrap();
        buf.push(0);
        assert!(DeletePayload::decode(&buf).is_err());
    }

    #[test]
    fn test_external_id_too_long() {
        let p = DeletePayload {
            external_id: "a".repeat(70_000),
            internal_id: 1,
        };
        let mut buf = Vec::new();
        assert!(matches!(
            p.encode_into(&mut buf),
            Err(SangitaError::ExternalIdTooLong(70_000))
        ));
    }
}
