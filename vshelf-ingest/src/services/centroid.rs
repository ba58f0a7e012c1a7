//! Centroid aggregation and vector math
//!
//! Video vectors are the duration-weighted mean of their segment vectors;
//! collection centroids are the plain mean of member video vectors.
//! Accumulation is done in f64.

/// Vector plus its weight in an aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedVector {
    pub vector: Vec<f32>,
    pub weight: f64,
}

/// Segment weight: its duration, floored at `min_weight_secs`
pub fn segment_weight(start_secs: f64, end_secs: f64, min_weight_secs: f64) -> f64 {
    (end_secs - start_secs).max(min_weight_secs)
}

/// Weighted mean: output[i] = Σ(vᵢ·w) / Σw
///
/// `None` for empty input. Vectors whose length differs from the first one
/// are skipped, as are non-positive or non-finite weights.
pub fn aggregate(vectors: &[WeightedVector]) -> Option<Vec<f32>> {
    let dimension = vectors.first()?.vector.len();
    if dimension == 0 {
        return None;
    }

    let mut sums = vec![0.0f64; dimension];
    let mut total_weight = 0.0f64;

    for (index, item) in vectors.iter().enumerate() {
        if item.vector.len() != dimension {
            tracing::warn!(
                index,
                expected = dimension,
                actual = item.vector.len(),
                "Skipping vector with mismatched dimension"
            );
            continue;
        }
        if !(item.weight.is_finite() && item.weight > 0.0) {
            tracing::warn!(index, weight = item.weight, "Skipping vector with unusable weight");
            continue;
        }

        for (sum, value) in sums.iter_mut().zip(&item.vector) {
            *sum += f64::from(*value) * item.weight;
        }
        total_weight += item.weight;
    }

    if total_weight == 0.0 {
        return None;
    }

    Some(sums.into_iter().map(|s| (s / total_weight) as f32).collect())
}

/// Unweighted mean
pub fn mean(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let weighted: Vec<WeightedVector> = vectors
        .iter()
        .map(|v| WeightedVector {
            vector: v.clone(),
            weight: 1.0,
        })
        .collect();
    aggregate(&weighted)
}

/// Cosine similarity in [-1, 1]; `None` on length mismatch or a zero vector
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32)
}

/// Cosine distance = 1 − similarity, in [0, 2]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    cosine_similarity(a, b).map(|s| 1.0 - s)
}
