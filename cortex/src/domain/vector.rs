// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedding vectors admitted to the index.
//!
//! Every vector entering the engine is checked at the boundary: it must have
//! exactly the configured dimension, contain only finite components and be
//! L2-normalized within a tolerance. Nothing is reshaped, truncated or
//! re-normalized on the caller's behalf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::storage::StorageError;

/// Identifier of a stored vector.
///
/// Assigned monotonically by the store, so ordering by id is insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VectorId(pub u64);

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vec-{}", self.0)
    }
}

/// A stored vector together with its insertion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: VectorId,
    pub vector: Vec<f32>,
    pub inserted_at: DateTime<Utc>,
}

/// One search result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: VectorId,
    pub similarity: f32,
}

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Checks dimension, finiteness and unit norm.
pub fn validate_vector(vector: &[f32], dimension: usize, norm_tolerance: f32) -> Result<(), VectorError> {
    if vector.len() != dimension {
        return Err(VectorError::Dimension {
            expected: dimension,
            actual: vector.len(),
        });
    }

    if let Some(pos) = vector.iter().position(|x| !x.is_finite()) {
        return Err(VectorError::InvalidVector {
            reason: format!("component {} is not finite ({})", pos, vector[pos]),
        });
    }

    let norm = l2_norm(vector);
    if (norm - 1.0).abs() > norm_tolerance {
        return Err(VectorError::InvalidVector {
            reason: format!("norm {:.6} is outside 1.0 +/- {}", norm, norm_tolerance),
        });
    }

    Ok(())
}

pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity. Returns 0.0 when either side has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Scales a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_unit_vector() {
        let v = vec![0.6, 0.8, 0.0];
        assert!(validate_vector(&v, 3, 1e-3).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_dimension() {
        let v = vec![1.0, 0.0];
        match validate_vector(&v, 3, 1e-3) {
            Err(VectorError::Dimension { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected dimension error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_nan_and_unnormalized() {
        let nan = vec![f32::NAN, 0.0, 0.0];
        assert!(matches!(
            validate_vector(&nan, 3, 1e-3),
            Err(VectorError::InvalidVector { .. })
        ));

        let long = vec![1.0, 1.0, 0.0];
        assert!(matches!(
            validate_vector(&long, 3, 1e-3),
            Err(VectorError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_cosine_of_opposites() {
        let a = vec![0.6, 0.8];
        let b = vec![-0.6, -0.8];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }
}
