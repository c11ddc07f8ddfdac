/// Cosine similarity between two vectors.
///
/// Returns `None` when the vectors differ in length or either one has zero
/// magnitude, since no meaningful angle exists in those cases.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    let sim = dot / (na * nb);
    sim.is_finite().then_some(sim)
}

/// Returns `true` when every component is zero (or the vector is empty).
pub fn is_degenerate(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
