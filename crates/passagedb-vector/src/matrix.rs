use anyhow::{Result, ensure};

use passagedb_core::{DenseMatrix, ScoreVector};

const NORM_EPS: f32 = 1e-8;

/// Cosine similarity between `query` and every matrix row.
///
/// Both sides are normalized with an epsilon in the denominator, so zero
/// vectors score 0 instead of NaN.
pub fn cosine_scores(query: &[f32], matrix: &DenseMatrix) -> Result<ScoreVector> {
    ensure!(
        query.len() == matrix.dim,
        "query has dimension {}, matrix '{}' has {}",
        query.len(),
        matrix.encoder_id,
        matrix.dim
    );
    let q_norm = l2_norm(query) + NORM_EPS;
    Ok(matrix
        .iter_rows()
        .map(|row| {
            let dot: f32 = row.iter().zip(query).map(|(a, b)| a * b).sum();
            dot / (q_norm * (l2_norm(row) + NORM_EPS))
        })
        .collect())
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
