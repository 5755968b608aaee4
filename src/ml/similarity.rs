/// Cosine similarity between two vectors of equal length.
///
/// Callers must check lengths first. An all-zero vector yields NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "embedding dimension mismatch");

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_of_vector_with_itself_is_one() {
        let v = vec![0.3, -1.2, 4.0, 0.01];

        let sim = cosine_similarity(&v, &v);

        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_of_opposite_vectors_is_minus_one() {
        let v = vec![1.5, 2.0, -0.5];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();

        let sim = cosine_similarity(&v, &neg);

        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_of_orthogonal_unit_vectors_is_zero() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];

        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_ignores_magnitude() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![10.0, 20.0, 30.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_with_zero_vector_is_nan() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];

        assert!(cosine_similarity(&a, &b).is_nan());
    }
}
