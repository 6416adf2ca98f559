//! Domain types shared by the lexical, dense and fusion layers.

use serde::{Deserialize, Serialize};

/// Positional passage identifier. Contiguous and zero-based.
pub type PassageId = usize;

/// One raw score per passage, indexed by `PassageId`.
pub type ScoreVector = Vec<f32>;

/// An indexed unit of corpus text.
///
/// - `id`: ordinal position in the corpus, assigned at load time
/// - `text`: the passage payload
/// - `source`: provenance label (e.g. the originating document name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub text: String,
    pub source: String,
}

/// The output unit of a retrieval call.
///
/// `score` is the fused ranking signal. `score_dense` and `score_bm25` are the
/// raw, un-normalized ranker outputs kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: PassageId,
    pub text: String,
    pub source: String,
    pub score_dense: f32,
    pub score_bm25: f32,
    pub score: f32,
}

/// Row-major N x D matrix of passage vectors produced by one encoder.
///
/// Row `i` belongs to passage `i`. `corpus_fingerprint` records which corpus
/// the rows were aligned against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    pub encoder_id: String,
    pub corpus_fingerprint: String,
    pub rows: usize,
    pub dim: usize,
    pub data: Vec<f32>,
}

impl DenseMatrix {
    /// Assemble a matrix from per-passage vectors. Every vector must have
    /// length `dim`.
    pub fn from_rows(
        encoder_id: impl Into<String>,
        corpus_fingerprint: impl Into<String>,
        dim: usize,
        vectors: Vec<Vec<f32>>,
    ) -> anyhow::Result<Self> {
        let rows = vectors.len();
        let mut data = Vec::with_capacity(rows * dim);
        for (i, v) in vectors.into_iter().enumerate() {
            if v.len() != dim {
                anyhow::bail!("row {} has dimension {}, expected {}", i, v.len(), dim);
            }
            data.extend(v);
        }
        Ok(Self { encoder_id: encoder_id.into(), corpus_fingerprint: corpus_fingerprint.into(), rows, dim, data })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks(0) panics; a zero-dim matrix has empty data anyway
        self.data.chunks(self.dim.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_come_back_in_passage_order() {
        let m = DenseMatrix::from_rows("e", "fp", 2, vec![vec![1.0, 2.0], vec![3.0, 4.0]]).expect("matrix");
        let rows: Vec<&[f32]> = m.iter_rows().collect();
        assert_eq!(rows, vec![&[1.0, 2.0][..], &[3.0, 4.0][..]]);
        assert!(DenseMatrix::from_rows("e", "fp", 3, vec![vec![1.0]]).is_err());
    }
}
