// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Pluggable similarity-search indexes.
//!
//! An index maps [`InternalId`]s to [`Vector`]s and answers top-k queries
//! under the metric fixed in its [`IndexConfig`]. Every implementation
//! provides the [`VectorIndex`] capability set and does its own internal
//! locking, so all methods take `&self`.
//!
//! Indexes are built through an [`IndexFactory`]. The
//! [`DefaultIndexFactory`] knows one backend:
//!
//! | Kind | Implementation |
//! |------|----------------|
//! | [`IndexKind::Linear`] | [`LinearIndex`] |
//! | [`IndexKind::Hnsw`], [`IndexKind::Ivf`], [`IndexKind::Pq`] | [`SangitaError::UnsupportedIndexKind`] |
//!
//! New backends are added as new factory arms; the collection layer only
//! sees `Box<dyn VectorIndex>`.
//!
//! # Example
//!
//! ```rust
//! use sangita::index::{DefaultIndexFactory, IndexConfig, IndexFactory};
//! use sangita::{IndexKind, SimilarityMetric, Vector};
//!
//! let config = IndexConfig::new(IndexKind::Linear, SimilarityMetric::Cosine, 2).unwrap();
//! let index = DefaultIndexFactory.create_index(config).unwrap();
//!
//! index.add(1, Vector::new(&[1.0, 0.0], 2).unwrap()).unwrap();
//! let hits = index.search(&Vector::new(&[1.0, 0.0], 2).unwrap(), 5).unwrap();
//! assert_eq!(hits[0].internal_id, 1);
//! ```

mod linear;
mod registry;

pub use linear::LinearIndex;
pub use registry::IndexRegistry;

use serde::{Deserialize, Serialize};

use crate::distance::SimilarityMetric;
use crate::error::{Result, SangitaError};
use crate::types::{IndexKind, InternalId};
use crate::vector::Vector;

/// Immutable description of an index: its kind, metric and dimension.
///
/// Doubles as the [`IndexRegistry`] lookup key, hence `Eq + Hash`.
/// Deserialization goes through [`IndexConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIndexConfig")]
pub struct IndexConfig {
    kind: IndexKind,
    metric: SimilarityMetric,
    dimension: usize,
}

#[derive(Deserialize)]
struct RawIndexConfig {
    kind: IndexKind,
    metric: SimilarityMetric,
    dimension: usize,
}

impl TryFrom<RawIndexConfig> for IndexConfig {
    type Error = SangitaError;

    fn try_from(raw: RawIndexConfig) -> Result<Self> {
        Self::new(raw.kind, raw.metric, raw.dimension)
    }
}

impl IndexConfig {
    /// Creates a validated index configuration.
    ///
    /// # Errors
    ///
    /// * `SangitaError::InvalidDimension` - If `dimension` is 0
    pub fn new(kind: IndexKind, metric: SimilarityMetric, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(SangitaError::InvalidDimension(dimension));
        }
        Ok(Self {
            kind,
            metric,
            dimension,
        })
    }

    /// Index structure.
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Scoring metric.
    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Fixed vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// One scored hit from an index search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Internal id of the matching vector.
    pub internal_id: InternalId,
    /// Similarity score (higher = more similar).
    pub score: f64,
}

/// Capability set every index backend provides.
///
/// All operations are individually atomic.
pub trait VectorIndex: Send + Sync {
    /// Stores `vector` under `id`.
    ///
    /// Returns `Ok(true)` without modifying anything if `id` is already
    /// present; the caller decides whether that is a collision.
    ///
    /// # Errors
    ///
    /// * `SangitaError::DimensionMismatch` - If the vector does not match the index dimension
    fn add(&self, id: InternalId, vector: Vector) -> Result<bool>;

    /// Removes `id`.
    ///
    /// # Errors
    ///
    /// * `SangitaError::InternalIdNotFound` - If `id` is absent
    fn delete(&self, id: InternalId) -> Result<()>;

    /// Returns a copy of the vector stored under `id`.
    fn get(&self, id: InternalId) -> Option<Vector>;

    /// Returns the `min(k, len)` highest-scoring vectors, best first.
    ///
    /// An empty index yields an empty result, not an error.
    ///
    /// # Errors
    ///
    /// * `SangitaError::DimensionMismatch` - If the query does not match the index dimension
    /// * `SangitaError::InvalidK` - If `k` is 0
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configuration the index was built with.
    fn config(&self) -> &IndexConfig;
}

/// Builds index instances from configuration.
pub trait IndexFactory: Send + Sync {
    /// Creates an empty index for `config`.
    ///
    /// # Errors
    ///
    /// * `SangitaError::UnsupportedIndexKind` - If the factory has no backend for `config.kind()`
    fn create_index(&self, config: IndexConfig) -> Result<Box<dyn VectorIndex>>;
}

/// Factory for the backends shipped with this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultIndexFactory;

impl IndexFactory for DefaultIndexFactory {
    fn create_index(&self, config: IndexConfig) -> Result<Box<dyn VectorIndex>> {
        match config.kind() {
            IndexKind::Linear => Ok(Box::new(LinearIndex::new(config))),
            kind @ (IndexKind::Hnsw | IndexKind::Ivf | IndexKind::Pq) => {
                Err(SangitaError::UnsupportedIndexKind(kind))
            }
        }
    }
}
