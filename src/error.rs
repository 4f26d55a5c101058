//! Error types for Sangita storage operations.
//!
//! This module provides:
//! - [`SangitaError`] - The main error enum
//! - [`Result<T>`] - A type alias for `std::result::Result<T, SangitaError>`
//!
//! Errors fall into five groups: validation (rejected before any mutation),
//! not-found, collision, corruption, and I/O. Corruption errors are never
//! downgraded to an empty result.

use std::path::PathBuf;

use crate::types::{IndexKind, InternalId};

/// Result type alias for Sangita operations.
///
/// This is equivalent to `std::result::Result<T, SangitaError>`.
pub type Result<T> = std::result::Result<T, SangitaError>;

/// Comprehensive error types for Sangita operations.
///
/// # Examples
///
/// ```rust
/// use sangita::{SangitaError, Vector};
///
/// match Vector::new(&[0.0, 0.0], 2) {
///     Err(SangitaError::ZeroMagnitude) => println!("zero vector rejected"),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SangitaError {
    /// I/O error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with the operation and path that caused it.
    #[error("IO error during {operation} on {}: {source}", .path.display())]
    PathIo {
        /// What was being attempted (e.g. "create segment").
        operation: &'static str,
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization error for payload data.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// The WAL directory does not exist.
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The WAL path exists but is not a directory.
    #[error("Path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A vector must have at least one component.
    #[error("Vector must have at least one dimension")]
    EmptyVector,

    /// Dimension must be positive.
    #[error("Invalid dimension: {0} (must be > 0)")]
    InvalidDimension(usize),

    /// Vector or query length does not match the configured dimension.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected number of dimensions
        expected: usize,
        /// Actual number of dimensions provided
        got: usize,
    },

    /// A component is NaN or infinite.
    #[error("Vector contains non-finite value {value} at index {index}")]
    NonFiniteValue {
        /// Position of the offending component
        index: usize,
        /// The offending value
        value: f32,
    },

    /// The vector's magnitude is too close to zero to normalize.
    #[error("Zero-magnitude vector cannot be normalized")]
    ZeroMagnitude,

    /// Collection name is empty.
    #[error("Invalid collection name: must be non-empty")]
    InvalidCollectionName,

    /// Raw metric code is outside the known enumeration.
    #[error("Invalid similarity metric: {0}")]
    InvalidMetric(i32),

    /// Raw index kind code is outside the known enumeration.
    #[error("Invalid index kind: {0}")]
    InvalidIndexKind(i32),

    /// Raw data type code is outside the known enumeration.
    #[error("Invalid data type: {0}")]
    InvalidDataType(i32),

    /// Model name is empty.
    #[error("Invalid model name: must be non-empty")]
    InvalidModelName,

    /// Raw sync policy code is outside the known enumeration.
    #[error("Invalid sync policy: {0}")]
    InvalidSyncPolicy(u8),

    /// The index kind is valid but no implementation is available.
    #[error("Unsupported index kind: {0}")]
    UnsupportedIndexKind(IndexKind),

    /// Search was called with `k == 0`.
    #[error("Invalid result count k = {0} (must be > 0)")]
    InvalidK(usize),

    /// External id is not present in the collection.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal id is not present in the index.
    #[error("Internal id {0} not found in index")]
    InternalIdNotFound(InternalId),

    /// The index already held the freshly assigned internal id.
    #[error("Internal id collision: {0}")]
    InternalIdCollision(InternalId),

    /// The index returned an internal id with no external mapping.
    #[error("Internal corruption: no external id mapped to internal id {0}")]
    MissingReverseMapping(InternalId),

    /// External id does not fit the u16 length prefix (65535 bytes).
    #[error("External id too long: {0} bytes (max 65535)")]
    ExternalIdTooLong(usize),

    /// A length-prefixed field does not fit its u32 prefix.
    #[error("Payload field too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Segment file header is missing or does not match.
    #[error("Invalid segment header in {}: {reason}", .path.display())]
    InvalidSegmentHeader {
        /// Segment file
        path: PathBuf,
        /// What was wrong
        reason: String,
    },

    /// A WAL record is structurally invalid.
    #[error("Corrupted record in segment {segment_id} at offset {offset}: {reason}")]
    CorruptedRecord {
        /// Segment holding the record (0 when decoding detached bytes)
        segment_id: u64,
        /// Byte offset of the record within the segment
        offset: u64,
        /// What was wrong
        reason: String,
    },

    /// A WAL record's CRC-32 does not match its contents.
    #[error("Checksum mismatch for record lsn {lsn}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// LSN declared in the record header
        lsn: u64,
        /// Checksum stored in the record
        stored: u32,
        /// Checksum computed over header and payload
        computed: u32,
    },
}

impl SangitaError {
    /// Wraps an I/O error with the operation and path it happened on.
    pub(crate) fn path_io(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| SangitaError::PathIo {
            operation,
            path,
            source,
        }
    }
}
