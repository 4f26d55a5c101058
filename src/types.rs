// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Core enumerations shared across Sangita.
//!
//! This module defines the configuration vocabulary used by collections and
//! indexes:
//! - [`IndexKind`] - Which index structure backs a collection
//! - [`DataType`] - The media type the embeddings were produced from
//! - [`InternalId`] - The compact integer key used inside an index
//!
//! The similarity metric lives in [`crate::distance`] next to the functions
//! that implement it.
//!
//! Every enum can be built from its raw integer code with `TryFrom`, which is
//! how values arriving from configuration files or foreign callers are
//! validated. Codes outside the enumeration are rejected with the matching
//! `Invalid*` error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SangitaError;

/// Compact, monotonically assigned identifier used as the index storage key.
///
/// Internal ids are never reused within a collection, even after deletion.
pub type InternalId = u64;

/// Index structure used to answer similarity queries.
///
/// Only [`IndexKind::Linear`] has an implementation; the other kinds are
/// accepted by configuration validation and rejected by the
/// [`DefaultIndexFactory`](crate::index::DefaultIndexFactory) with
/// [`SangitaError::UnsupportedIndexKind`].
///
/// # Raw Codes
///
/// | Code | Kind |
/// |------|------|
/// | 0 | Linear |
/// | 1 | Hnsw |
/// | 2 | Ivf |
/// | 3 | Pq |
///
/// # Examples
///
/// ```rust
/// use sangita::IndexKind;
///
/// assert_eq!(IndexKind::try_from(0).unwrap(), IndexKind::Linear);
/// assert!(IndexKind::try_from(99).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// Exhaustive scan over every stored vector.
    Linear,
    /// Hierarchical navigable small world graph.
    Hnsw,
    /// Inverted file index.
    Ivf,
    /// Product quantization.
    Pq,
}

impl Default for IndexKind {
    fn default() -> Self {
        IndexKind::Linear
    }
}

impl TryFrom<i32> for IndexKind {
    type Error = SangitaError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(IndexKind::Linear),
            1 => Ok(IndexKind::Hnsw),
            2 => Ok(IndexKind::Ivf),
            3 => Ok(IndexKind::Pq),
            other => Err(SangitaError::InvalidIndexKind(other)),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::Linear => "linear",
            IndexKind::Hnsw => "hnsw",
            IndexKind::Ivf => "ivf",
            IndexKind::Pq => "pq",
        };
        f.write_str(name)
    }
}

/// Media type the stored embeddings describe.
///
/// Raw codes start at 1: Text = 1, Image = 2, Audio = 3, Video = 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Text embeddings.
    Text,
    /// Image embeddings.
    Image,
    /// Audio embeddings.
    Audio,
    /// Video embeddings.
    Video,
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Text
    }
}

impl TryFrom<i32> for DataType {
    type Error = SangitaError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(DataType::Text),
            2 => Ok(DataType::Image),
            3 => Ok(DataType::Audio),
            4 => Ok(DataType::Video),
            other => Err(SangitaError::InvalidDataType(other)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Text => "text",
            DataType::Image => "image",
            DataType::Audio => "audio",
            DataType::Video => "video",
        };
        f.write_str(name)
    }
}
