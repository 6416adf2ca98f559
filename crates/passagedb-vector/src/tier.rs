use anyhow::{Result, ensure};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use passagedb_core::{Corpus, DenseMatrix, Encoder, MatrixCache};

/// Which link of the dense fallback chain produced a score vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenseTier {
    Primary,
    Secondary,
    /// No encoder was usable; every passage scores 0.
    Null,
}

impl fmt::Display for DenseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self { DenseTier::Primary => "primary", DenseTier::Secondary => "secondary", DenseTier::Null => "null" };
        f.write_str(s)
    }
}

pub type EncoderLoader = Box<dyn Fn() -> Result<Arc<dyn Encoder>> + Send + Sync>;

/// One encoder tier: a lazily instantiated encoder plus its memoized corpus matrix.
///
/// Instantiation runs once; a failure leaves the tier permanently absent for
/// this process. Matrix builds run under a lock so one build serves every
/// concurrent first caller, and a failed build is retried on the next call.
pub struct EncoderSlot {
    tier: DenseTier,
    loader: EncoderLoader,
    encoder: OnceLock<Option<Arc<dyn Encoder>>>,
    matrix: Mutex<Option<Arc<DenseMatrix>>>,
    build_on_miss: bool,
}

impl EncoderSlot {
    pub fn new(tier: DenseTier, loader: EncoderLoader, build_on_miss: bool) -> Self {
        Self { tier, loader, encoder: OnceLock::new(), matrix: Mutex::new(None), build_on_miss }
    }

    /// Slot around an encoder that is already instantiated.
    pub fn ready(tier: DenseTier, encoder: Arc<dyn Encoder>, build_on_miss: bool) -> Self {
        let slot = Self::new(tier, Box::new(|| -> Result<Arc<dyn Encoder>> { Err(anyhow::anyhow!("encoder already set")) }), build_on_miss);
        let _ = slot.encoder.set(Some(encoder));
        slot
    }

    pub fn tier(&self) -> DenseTier {
        self.tier
    }

    pub fn builds_on_miss(&self) -> bool {
        self.build_on_miss
    }

    pub fn encoder(&self) -> Option<Arc<dyn Encoder>> {
        self.encoder
            .get_or_init(|| match (self.loader)() {
                Ok(encoder) => {
                    info!(tier = %self.tier, encoder = encoder.id(), dim = encoder.dim(), "encoder ready");
                    Some(encoder)
                }
                Err(e) => {
                    warn!(tier = %self.tier, error = %e, "encoder unavailable");
                    None
                }
            })
            .clone()
    }

    /// The corpus matrix for this tier: memo, then cache, then (if allowed) a
    /// fresh encode written through to the cache. `None` means no matrix is
    /// obtainable without building and building is disabled.
    pub fn matrix(
        &self,
        encoder: &dyn Encoder,
        corpus: &Corpus,
        cache: &dyn MatrixCache,
        batch_size: usize,
    ) -> Result<Option<Arc<DenseMatrix>>> {
        let mut guard = self.matrix.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(m) = guard.as_ref() {
            if m.corpus_fingerprint == corpus.fingerprint() && m.encoder_id == encoder.id() {
                return Ok(Some(Arc::clone(m)));
            }
        }
        let cached = match cache.get(encoder.id(), corpus.fingerprint()) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(tier = %self.tier, encoder = encoder.id(), error = %e, "unreadable cached matrix, ignoring");
                None
            }
        };
        let matrix = match cached {
            Some(m) if m.rows == corpus.len() && m.dim == encoder.dim() => m,
            Some(m) => {
                warn!(tier = %self.tier, rows = m.rows, dim = m.dim, "cached matrix has the wrong shape, ignoring");
                if !self.build_on_miss { return Ok(None); }
                self.build_and_store(encoder, corpus, cache, batch_size)?
            }
            None if self.build_on_miss => self.build_and_store(encoder, corpus, cache, batch_size)?,
            None => {
                info!(tier = %self.tier, encoder = encoder.id(), "no cached matrix and building is disabled");
                return Ok(None);
            }
        };
        let matrix = Arc::new(matrix);
        *guard = Some(Arc::clone(&matrix));
        Ok(Some(matrix))
    }

    fn build_and_store(&self, encoder: &dyn Encoder, corpus: &Corpus, cache: &dyn MatrixCache, batch_size: usize) -> Result<DenseMatrix> {
        let matrix = encode_corpus(encoder, corpus, batch_size)?;
        if let Err(e) = cache.put(&matrix) {
            warn!(tier = %self.tier, encoder = encoder.id(), error = %e, "failed to persist matrix; keeping it in memory");
        }
        Ok(matrix)
    }

    pub fn clear(&self) {
        let mut guard = self.matrix.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}

/// Encode every passage in batches. The result is rejected unless it has
/// exactly one `dim`-wide row per passage.
pub fn encode_corpus(encoder: &dyn Encoder, corpus: &Corpus, batch_size: usize) -> Result<DenseMatrix> {
    let n = corpus.len();
    ensure!(encoder.dim() > 0, "encoder '{}' reports dimension 0", encoder.id());
    info!(encoder = encoder.id(), passages = n, "encoding corpus");
    let pb = ProgressBar::new(n as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(encoder.id().to_string());
    let mut rows = Vec::with_capacity(n);
    for batch in corpus.texts().chunks(batch_size.max(1)) {
        let vectors = encoder.encode_batch(batch)?;
        ensure!(vectors.len() == batch.len(), "encoder returned {} vectors for {} texts", vectors.len(), batch.len());
        rows.extend(vectors);
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    let matrix = DenseMatrix::from_rows(encoder.id(), corpus.fingerprint(), encoder.dim(), rows)?;
    ensure!(matrix.rows == n, "encoded {} rows for {} passages", matrix.rows, n);
    Ok(matrix)
}
