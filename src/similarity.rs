//! Semantic similarity calculations for embeddings
//!
//! Cosine similarity plus the threshold policy that decides when two
//! fingerprints are near-duplicates.

/// Above this similarity two nodes are considered the same concept.
pub const SIMILARITY_THRESHOLD: f32 = 0.95;

/// Cosine similarity between two embedding vectors
/// Returns a value between -1.0 and 1.0 (1.0 = identical, 0.0 = orthogonal).
/// Empty, zero-magnitude or mismatched-length inputs give 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Strictly greater: a similarity equal to the threshold is not a duplicate.
pub fn exceeds_threshold(similarity: f32) -> bool {
    similarity > SIMILARITY_THRESHOLD
}

/// Whether two fingerprints are too similar to coexist under the same label.
/// Missing fingerprints never conflict.
pub fn is_conflict(a: &[f32], b: &[f32]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    exceeds_threshold(cosine_similarity(a, b))
}
