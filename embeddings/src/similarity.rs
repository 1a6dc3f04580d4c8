//! Vector math for embeddings.

use crate::error::{EmbeddingError, Result};

/// Euclidean norm of a vector.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Whether every component is exactly zero.
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Normalize a vector to unit length in place.
///
/// A zero vector is left untouched rather than divided by zero.
pub fn normalize(v: &mut [f32]) {
    let magnitude = norm(v);
    if magnitude > 0.0 {
        for x in v.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Dot product of two vectors of equal length.
///
/// For unit vectors this is their cosine similarity.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::ShapeMismatch(format!(
            "dimension mismatch: expected {}, got {}",
            a.len(),
            b.len()
        )));
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_stays_zero() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert!(v.iter().all(|x| !x.is_nan()));
        assert!(is_zero(&v));
    }

    #[test]
    fn test_dot_product_of_unit_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((dot_product(&a, &a).unwrap() - 1.0).abs() < 1e-6);
        assert!((dot_product(&a, &b).unwrap() + 1.0).abs() < 1e-6);
        assert!(dot_product(&a, &c).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(matches!(
            dot_product(&a, &b),
            Err(EmbeddingError::ShapeMismatch(_))
        ));
    }
}
