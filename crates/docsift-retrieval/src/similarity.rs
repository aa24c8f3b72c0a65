//! Vector similarity helpers.

use docsift_core::DocsiftError;

/// Added to the norm product so all-zero vectors score 0 instead of NaN.
pub const SIMILARITY_EPSILON: f64 = 1e-10;

/// Cosine similarity `dot(a, b) / (|a| * |b| + ε)`, accumulated in `f64`.
///
/// # Errors
///
/// Returns [`DocsiftError::DimensionMismatch`] if the vectors differ in length.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::similarity::cosine_similarity;
///
/// let same = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
/// assert!((same - 1.0).abs() < 1e-6);
///
/// assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, DocsiftError> {
    if a.len() != b.len() {
        return Err(DocsiftError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let ai = f64::from(x);
        let bi = f64::from(y);
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt() + SIMILARITY_EPSILON))
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::similarity::l2_normalize;
///
/// let mut v = vec![3.0, 4.0];
/// l2_normalize(&mut v);
/// assert!((v[0] - 0.6).abs() < 1e-6);
/// assert!((v[1] - 0.8).abs() < 1e-6);
/// ```
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 {
        return;
    }
    for v in vector.iter_mut() {
        *v = (f64::from(*v) / norm) as f32;
    }
}
