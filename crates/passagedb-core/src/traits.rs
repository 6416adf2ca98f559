use crate::types::DenseMatrix;

/// Maps text to a fixed-length vector.
///
/// `id` must change whenever the vector space changes (different model,
/// different dimension), because cached matrices are keyed by it.
pub trait Encoder: Send + Sync {
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// Key-value store for encoded corpus matrices, keyed by encoder identity.
///
/// `get` must return `None` for an entry whose corpus fingerprint differs from
/// the requested one; implementations drop such stale entries.
pub trait MatrixCache: Send + Sync {
    fn get(&self, encoder_id: &str, corpus_fingerprint: &str) -> anyhow::Result<Option<DenseMatrix>>;
    fn put(&self, matrix: &DenseMatrix) -> anyhow::Result<()>;
    fn invalidate(&self, encoder_id: &str) -> anyhow::Result<()>;
}

/// Supplies the persisted corpus snapshot (ordinal -> `{text, source}` JSON).
pub trait SnapshotSource: Send + Sync {
    fn describe(&self) -> String;
    fn read_snapshot(&self) -> crate::error::Result<String>;
}
