// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Immutable, normalized embedding vectors.
//!
//! A [`Vector`] is the unit every index stores and every query is made of.
//! Construction validates and normalizes once; afterwards the vector is
//! read-only and its dimension is fixed for its lifetime.
//!
//! # Construction Rules
//!
//! | Input | Result |
//! |-------|--------|
//! | empty slice | [`SangitaError::EmptyVector`] |
//! | length ≠ dimension | [`SangitaError::DimensionMismatch`] |
//! | NaN or ±∞ component | [`SangitaError::NonFiniteValue`] |
//! | magnitude < 1e-6 | [`SangitaError::ZeroMagnitude`] |
//! | otherwise | L2-normalized copy (magnitude 1 ± 1e-6) |
//!
//! # Examples
//!
//! ```rust
//! use sangita::Vector;
//!
//! let v = Vector::new(&[3.0, 4.0], 2).unwrap();
//! assert_eq!(v.dimension(), 2);
//! assert!((v.values()[0] - 0.6).abs() < 1e-6);
//!
//! // Normalized vectors have self-similarity 1.
//! assert!((v.similarity(&v).unwrap() - 1.0).abs() < 1e-6);
//! ```

use crate::distance;
use crate::error::{Result, SangitaError};

/// Magnitudes below this are treated as zero.
pub const EPSILON: f64 = 1e-6;

/// An immutable, L2-normalized, fixed-dimension float vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    values: Box<[f32]>,
}

impl Vector {
    /// Validates `values` against `dimension` and stores a normalized copy.
    ///
    /// # Errors
    ///
    /// * `SangitaError::EmptyVector` - If `values` is empty
    /// * `SangitaError::DimensionMismatch` - If `values.len() != dimension`
    /// * `SangitaError::NonFiniteValue` - If any component is NaN or infinite
    /// * `SangitaError::ZeroMagnitude` - If the input has (near) zero length
    pub fn new(values: &[f32], dimension: usize) -> Result<Self> {
        if values.is_empty() {
            return Err(SangitaError::EmptyVector);
        }
        if values.len() != dimension {
            return Err(SangitaError::DimensionMismatch {
                expected: dimension,
                got: values.len(),
            });
        }
        validate_values(values)?;
        let normalized = normalize(values)?;
        Ok(Self {
            values: normalized.into_boxed_slice(),
        })
    }

    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Returns a copy of the normalized components.
    pub fn values(&self) -> Vec<f32> {
        self.values.to_vec()
    }

    /// Borrowed view of the normalized components.
    pub(crate) fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Cosine similarity with `other`.
    ///
    /// Both operands are unit vectors, so this is a plain dot product.
    ///
    /// # Errors
    ///
    /// * `SangitaError::DimensionMismatch` - If the dimensions differ
    pub fn similarity(&self, other: &Vector) -> Result<f64> {
        if self.dimension() != other.dimension() {
            return Err(SangitaError::DimensionMismatch {
                expected: self.dimension(),
                got: other.dimension(),
            });
        }
        distance::cosine(&self.values, &other.values)
    }
}

/// Euclidean length of `values`, accumulated in `f64`.
pub fn magnitude(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|v| {
            let v = f64::from(*v);
            v * v
        })
        .sum::<f64>()
        .sqrt()
}

/// Returns `values` scaled to unit length.
///
/// # Errors
///
/// * `SangitaError::ZeroMagnitude` - If the magnitude is below [`EPSILON`]
pub fn normalize(values: &[f32]) -> Result<Vec<f32>> {
    let mag = magnitude(values);
    if mag < EPSILON {
        return Err(SangitaError::ZeroMagnitude);
    }
    Ok(values
        .iter()
        .map(|v| (f64::from(*v) / mag) as f32)
        .collect())
}

fn validate_values(values: &[f32]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(SangitaError::NonFiniteValue {
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(Vector::new(&[], 0), Err(SangitaError::EmptyVector)));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        assert!(matches!(
            Vector::new(&[1.0, 2.0, 3.0], 2),
            Err(SangitaError::DimensionMismatch {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_rejects_nan_and_inf() {
        assert!(matches!(
            Vector::new(&[1.0, f32::NAN], 2),
            Err(SangitaError::NonFiniteValue { index: 1, .. })
        ));
        assert!(matches!(
            Vector::new(&[f32::NEG_INFINITY, 1.0], 2),
            Err(SangitaError::NonFiniteValue { index: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_zero_vector() {
        assert!(matches!(
            Vector::new(&[0.0, 0.0, 0.0], 3),
            Err(SangitaError::ZeroMagnitude)
        ));
    }

    #[test]
    fn test_values_is_a_copy() {
        let v = Vector::new(&[1.0, 0.0], 2).unwrap();
        let mut copy = v.values();
        copy[0] = 42.0;
        assert_eq!(v.values(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_orthogonal_similarity_is_zero() {
        let a = Vector::new(&[1.0, 0.0], 2).unwrap();
        let b = Vector::new(&[0.0, 5.0], 2).unwrap();
        assert!(a.similarity(&b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_similarity_dimension_mismatch() {
        let a = Vector::new(&[1.0, 0.0], 2).unwrap();
        let b = Vector::new(&[1.0, 0.0, 0.0], 3).unwrap();
        assert!(matches!(
            a.similarity(&b),
            Err(SangitaError::DimensionMismatch { .. })
        ));
    }

    /// Components bounded away from the all-zero input.
    fn arb_values() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1000.0f32..1000.0, 1..64)
            .prop_filter("non-zero magnitude", |v| magnitude(v) > 1e-3)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_constructed_vectors_are_unit_length(values in arb_values()) {
            let v = Vector::new(&values, values.len()).unwrap();
            prop_assert!((magnitude(v.as_slice()) - 1.0).abs() < 1e-6);
        }

        #[test]
        fn prop_self_similarity_is_one(values in arb_values()) {
            let v = Vector::new(&values, values.len()).unwrap();
            prop_assert!((v.similarity(&v).unwrap() - 1.0).abs() < 1e-6);
        }
    }
}
