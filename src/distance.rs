// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Similarity metrics for vector search.
//!
//! This module provides the scoring primitives used by every index. All
//! metrics are oriented so that **higher scores indicate more similar
//! vectors**, which lets search rank every metric with one descending sort.
//!
//! # Supported Metrics
//!
//! | Metric | Score | Range for unit vectors |
//! |--------|-------|------------------------|
//! | Cosine | `Σ aᵢ·bᵢ` | [-1, 1] |
//! | Dot | `Σ aᵢ·bᵢ` | [-1, 1] |
//! | Euclidean | `-Σ(aᵢ - bᵢ)²` | [-4, 0] |
//!
//! Cosine is computed as a plain dot product: every stored and query vector
//! is normalized when its [`Vector`](crate::Vector) is constructed, so the
//! denominator is always 1 and is not recomputed.
//!
//! Accumulation is done in `f64` and all functions reject inputs of
//! different lengths with [`SangitaError::DimensionMismatch`].
//!
//! # Examples
//!
//! ```rust
//! use sangita::distance::{dot, euclidean, SimilarityMetric};
//!
//! let a = [1.0f32, 0.0];
//! let b = [0.0f32, 1.0];
//!
//! assert_eq!(dot(&a, &b).unwrap(), 0.0);
//! assert_eq!(euclidean(&a, &b).unwrap(), -2.0);
//! assert_eq!(SimilarityMetric::Cosine.score(&a, &a).unwrap(), 1.0);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SangitaError};

/// Similarity metric for search.
///
/// # Raw Codes
///
/// | Code | Metric |
/// |------|--------|
/// | 0 | Cosine |
/// | 1 | Dot |
/// | 2 | Euclidean |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimilarityMetric {
    /// Cosine similarity of unit vectors, computed as a dot product.
    Cosine,

    /// Raw dot product.
    Dot,

    /// Negative squared Euclidean distance.
    ///
    /// Negated so that nearer vectors score higher.
    Euclidean,
}

impl SimilarityMetric {
    /// Scores `a` against `b` with this metric. Higher is more similar.
    ///
    /// # Errors
    ///
    /// * `SangitaError::DimensionMismatch` - If the slices differ in length
    pub fn score(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        match self {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Dot => dot(a, b),
            SimilarityMetric::Euclidean => euclidean(a, b),
        }
    }
}

impl Default for SimilarityMetric {
    fn default() -> Self {
        SimilarityMetric::Cosine
    }
}

impl TryFrom<i32> for SimilarityMetric {
    type Error = SangitaError;

    fn try_from(code: i32) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(SimilarityMetric::Cosine),
            1 => Ok(SimilarityMetric::Dot),
            2 => Ok(SimilarityMetric::Euclidean),
            other => Err(SangitaError::InvalidMetric(other)),
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Dot => "dot",
            SimilarityMetric::Euclidean => "euclidean",
        };
        f.write_str(name)
    }
}

fn check_lengths(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(SangitaError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(())
}

/// Dot product: `Σ aᵢ·bᵢ`.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f64> {
    check_lengths(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum())
}

/// Cosine similarity of two **unit** vectors.
///
/// Identical to [`dot`]; the inputs are not re-normalized.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64> {
    dot(a, b)
}

/// Negative squared Euclidean distance: `-Σ(aᵢ - bᵢ)²`.
///
/// Empty inputs are valid and score 0.
pub fn euclidean(a: &[f32], b: &[f32]) -> Result<f64> {
    check_lengths(a, b)?;
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = f64::from(*x) - f64::from(*y);
            diff * diff
        })
        .sum();
    Ok(-sum)
}
