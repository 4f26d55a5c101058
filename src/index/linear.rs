// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Exhaustive-scan index.
//!
//! [`LinearIndex`] scores the query against every stored vector and sorts.
//! Search is O(N·d); there is no build step and results are exact.
//!
//! # Ordering
//!
//! Results are ordered by score descending. Equal scores are ordered by
//! internal id ascending, so repeated searches over the same contents return
//! the same sequence.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{IndexConfig, SearchResult, VectorIndex};
use crate::error::{Result, SangitaError};
use crate::types::InternalId;
use crate::vector::Vector;

/// Brute-force index over an in-memory vector map.
///
/// The configuration is fixed at construction; the vector store is guarded
/// by its own read/write lock.
pub struct LinearIndex {
    config: IndexConfig,
    vectors: RwLock<BTreeMap<InternalId, Vector>>,
}

impl LinearIndex {
    /// Creates an empty index for `config`.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            vectors: RwLock::new(BTreeMap::new()),
        }
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        if vector.dimension() != self.config.dimension() {
            return Err(SangitaError::DimensionMismatch {
                expected: self.config.dimension(),
                got: vector.dimension(),
            });
        }
        Ok(())
    }
}

/// Score descending, then internal id ascending.
fn rank(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.internal_id.cmp(&b.internal_id))
}

impl VectorIndex for LinearIndex {
    fn add(&self, id: InternalId, vector: Vector) -> Result<bool> {
        self.check_dimension(&vector)?;
        let mut vectors = self.vectors.write();
        if vectors.contains_key(&id) {
            return Ok(true);
        }
        vectors.insert(id, vector);
        Ok(false)
    }

    fn delete(&self, id: InternalId) -> Result<()> {
        self.vectors
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(SangitaError::InternalIdNotFound(id))
    }

    fn get(&self, id: InternalId) -> Option<Vector> {
        self.vectors.read().get(&id).cloned()
    }

    fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        self.check_dimension(query)?;
        if k == 0 {
            return Err(SangitaError::InvalidK(k));
        }

        let vectors = self.vectors.read();
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let metric = self.config.metric();
        let mut results = Vec::with_capacity(vectors.len());
        for (&internal_id, stored) in vectors.iter() {
            let score = metric.score(stored.as_slice(), query.as_slice())?;
            results.push(SearchResult { internal_id, score });
        }

        results.sort_by(rank);
        results.truncate(k);
        Ok(results)
    }

    fn len(&self) -> usize {
        self.vectors.read().len()
    }

    fn config(&self) -> &IndexConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::SimilarityMetric;
    use crate::types::IndexKind;

    fn index(metric: SimilarityMetric, dimension: usize) -> LinearIndex {
        LinearIndex::new(IndexConfig::new(IndexKind::Linear, metric, dimension).unwrap())
    }

    fn vec2(x: f32, y: f32) -> Vector {
        Vector::new(&[x, y], 2).unwrap()
    }

    #[test]
    fn test_add_get_delete() {
        let idx = index(SimilarityMetric::Cosine, 2);
        assert!(!idx.add(7, vec2(1.0, 0.0)).unwrap());
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get(7), Some(vec2(1.0, 0.0)));

        idx.delete(7).unwrap();
        assert!(idx.is_empty());
        assert!(idx.get(7).is_none());
    }

    #[test]
    fn test_add_existing_id_reports_without_overwriting() {
        let idx = index(SimilarityMetric::Cosine, 2);
        idx.add(1, vec2(1.0, 0.0)).unwrap();
        assert!(idx.add(1, vec2(0.0, 1.0)).unwrap());
        assert_eq!(idx.get(1), Some(vec2(1.0, 0.0)));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_add_dimension_mismatch() {
        let idx = index(SimilarityMetric::Cosine, 3);
        assert!(matches!(
            idx.add(1, vec2(1.0, 0.0)),
            Err(SangitaError::DimensionMismatch {
                expected: 3,
                got: 2
            })
        ));
        assert!(idx.is_empty());
    }

    #[test]
    fn test_delete_missing() {
        let idx = index(SimilarityMetric::Dot, 2);
        assert!(matches!(
            idx.delete(9),
            Err(SangitaError::InternalIdNotFound(9))
        ));
    }

    #[test]
    fn test_search_cosine_ranking() {
        let idx = index(SimilarityMetric::Cosine, 2);
        idx.add(1, vec2(1.0, 0.0)).unwrap(); // A
        idx.add(2, vec2(0.0, 1.0)).unwrap(); // B
        idx.add(3, vec2(0.707, 0.707)).unwrap(); // C

        let results = idx.search(&vec2(1.0, 0.0), 3).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.internal_id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 0.70710678).abs() < 1e-4);
        assert!(results[2].score.abs() < 1e-6);
    }

    #[test]
    fn test_search_euclidean_prefers_nearest() {
        let idx = index(SimilarityMetric::Euclidean, 2);
        idx.add(1, vec2(0.0, 1.0)).unwrap();
        idx.add(2, vec2(1.0, 0.1)).unwrap();

        let results = idx.search(&vec2(1.0, 0.0), 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].internal_id, 2);
        assert!(results[0].score <= 0.0);
    }

    #[test]
    fn test_search_k_larger_than_size() {
        let idx = index(SimilarityMetric::Dot, 2);
        idx.add(1, vec2(1.0, 0.0)).unwrap();
        idx.add(2, vec2(0.0, 1.0)).unwrap();
        let results = idx.search(&vec2(1.0, 1.0), 50).unwrap();
        assert_eq!(results.len(), idx.len());
    }

    #[test]
    fn test_search_empty_index() {
        let idx = index(SimilarityMetric::Cosine, 2);
        assert!(idx.search(&vec2(1.0, 0.0), 3).unwrap().is_empty());
    }

    #[test]
    fn test_search_validates_before_empty_check() {
        let idx = index(SimilarityMetric::Cosine, 3);
        assert!(matches!(
            idx.search(&vec2(1.0, 0.0), 1),
            Err(SangitaError::DimensionMismatch { .. })
        ));
        let query = Vector::new(&[1.0, 0.0, 0.0], 3).unwrap();
        assert!(matches!(idx.search(&query, 0), Err(SangitaError::InvalidK(0))));
    }

    #[test]
    fn test_ties_break_by_internal_id() {
        let idx = index(SimilarityMetric::Cosine, 2);
        for id in [30, 10, 20] {
            idx.add(id, vec2(1.0, 0.0)).unwrap();
        }
        let ids: Vec<_> = idx
            .search(&vec2(1.0, 0.0), 3)
            .unwrap()
            .into_iter()
            .map(|r| r.internal_id)
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }
}
