//! Min-max normalization and weighted fusion of the two ranker outputs.

use anyhow::{ensure, Result};

use passagedb_core::{PassageId, ScoreVector};

/// Ranges narrower than this are treated as flat.
pub const NORMALIZE_EPS: f32 = 1e-12;

/// `(x - min) / (max - min)` over the finite entries. A flat vector maps to
/// all zeros; non-finite entries map to 0.
pub fn min_max_normalize(scores: &[f32]) -> ScoreVector {
    let (min, max) = scores
        .iter()
        .filter(|x| x.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
    let range = max - min;
    if !range.is_finite() || range < NORMALIZE_EPS {
        return vec![0.0; scores.len()];
    }
    scores
        .iter()
        .map(|&x| if x.is_finite() { ((x - min) / range).clamp(0.0, 1.0) } else { 0.0 })
        .collect()
}

/// `alpha * norm(dense) + (1 - alpha) * norm(lexical)`, element-wise.
pub fn fuse(dense: &[f32], lexical: &[f32], alpha: f32) -> Result<ScoreVector> {
    ensure!(dense.len() == lexical.len(), "dense has {} scores, lexical has {}", dense.len(), lexical.len());
    ensure!((0.0..=1.0).contains(&alpha), "alpha must be within [0, 1], got {}", alpha);
    let d = min_max_normalize(dense);
    let l = min_max_normalize(lexical);
    Ok(d.iter().zip(&l).map(|(d, l)| alpha * d + (1.0 - alpha) * l).collect())
}

/// Passage ids ordered by score descending; equal scores keep the lower id first.
pub fn rank(scores: &[f32]) -> Vec<PassageId> {
    let mut ids: Vec<PassageId> = (0..scores.len()).collect();
    // adding 0.0 folds -0.0 into 0.0 so signed zeros tie
    ids.sort_by(|&a, &b| (scores[b] + 0.0).total_cmp(&(scores[a] + 0.0)).then(a.cmp(&b)));
    ids
}
