use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use passagedb_core::{Corpus, CorpusStore, Error, FusedResult, Result, ScoreVector};
use passagedb_text::LexicalRanker;
use passagedb_vector::{DenseRanker, DenseTier, TierStatus};

use crate::fusion::{fuse, rank};

/// Results of one retrieval call plus which dense tier served it.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    pub results: Vec<FusedResult>,
    pub dense_tier: DenseTier,
    pub encoder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmReport {
    pub passages: usize,
    pub lexical_ready: bool,
    pub lexical_error: Option<String>,
    pub tiers: Vec<TierStatus>,
}

/// Hybrid retriever over one corpus: BM25 and dense cosine scores, min-max
/// normalized and blended by `alpha`.
///
/// Every expensive piece (corpus, lexical index, encoders, dense matrices) is
/// built on first use and shared by later calls. The only error a retrieval
/// call returns is a corpus that cannot be loaded; ranker failures degrade to
/// zero score vectors.
pub struct RetrievalService {
    corpus: CorpusStore,
    lexical: LexicalRanker,
    dense: DenseRanker,
    alpha: f32,
    default_top_k: usize,
}

impl RetrievalService {
    pub(crate) fn from_parts(corpus: CorpusStore, dense: DenseRanker, alpha: f32, default_top_k: usize) -> Self {
        Self { corpus, lexical: LexicalRanker::new(), dense, alpha, default_top_k }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn corpus(&self) -> Result<Arc<Corpus>> {
        self.corpus.load()
    }

    /// Top `top_k` passages for `query`; `None` uses the configured default.
    pub fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<FusedResult>> {
        Ok(self.retrieve_detailed(query, top_k)?.results)
    }

    /// Same as `retrieve` with a per-call fusion weight. 1.0 ranks by dense
    /// similarity alone, 0.0 by BM25 alone.
    pub fn retrieve_with_alpha(&self, query: &str, top_k: Option<usize>, alpha: f32) -> Result<Vec<FusedResult>> {
        Ok(self.retrieve_detailed_with_alpha(query, top_k, alpha)?.results)
    }

    pub fn retrieve_detailed(&self, query: &str, top_k: Option<usize>) -> Result<RetrievalOutcome> {
        self.retrieve_detailed_with_alpha(query, top_k, self.alpha)
    }

    pub fn retrieve_detailed_with_alpha(&self, query: &str, top_k: Option<usize>, alpha: f32) -> Result<RetrievalOutcome> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidConfig(format!("alpha must be within [0, 1], got {}", alpha)));
        }
        let k = top_k.unwrap_or(self.default_top_k);
        let corpus = self.corpus.load()?;
        if k == 0 || corpus.is_empty() {
            return Ok(RetrievalOutcome { results: Vec::new(), dense_tier: DenseTier::Null, encoder_id: None });
        }

        let started = Instant::now();
        let (dense, lexical) = rayon::join(|| self.dense.score(&corpus, query), || self.lexical_scores(&corpus, query));
        let fused = fuse(&dense.scores, &lexical, alpha).map_err(|e| Error::Operation(e.to_string()))?;

        let results: Vec<FusedResult> = rank(&fused)
            .into_iter()
            .take(k)
            .filter_map(|id| {
                let passage = corpus.get(id)?;
                Some(FusedResult {
                    id,
                    text: passage.text.clone(),
                    source: passage.source.clone(),
                    score_dense: dense.scores[id],
                    score_bm25: lexical[id],
                    score: fused[id],
                })
            })
            .collect();
        debug!(
            k,
            returned = results.len(),
            tier = %dense.tier,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieval done"
        );
        Ok(RetrievalOutcome { results, dense_tier: dense.tier, encoder_id: dense.encoder_id })
    }

    fn lexical_scores(&self, corpus: &Corpus, query: &str) -> ScoreVector {
        let n = corpus.len();
        match self.lexical.score(corpus, query) {
            Ok(scores) if scores.len() == n => scores,
            Ok(scores) => {
                warn!(expected = n, got = scores.len(), "lexical score vector has the wrong length, using zeros");
                vec![0.0; n]
            }
            Err(e) => {
                warn!(error = %e, "lexical scoring failed, using zeros");
                vec![0.0; n]
            }
        }
    }

    /// Load the corpus and build every index up front instead of on the first query.
    pub fn warm(&self) -> Result<WarmReport> {
        let corpus = self.corpus.load()?;
        let (lexical_ready, lexical_error) = match self.lexical.index(&corpus) {
            Ok(_) => (true, None),
            Err(e) => {
                warn!(error = %e, "lexical index build failed");
                (false, Some(e.to_string()))
            }
        };
        let tiers = self.dense.warm(&corpus);
        info!(
            passages = corpus.len(),
            lexical_ready,
            dense_ready = tiers.iter().filter(|t| t.ready).count(),
            "retrieval service warmed"
        );
        Ok(WarmReport { passages: corpus.len(), lexical_ready, lexical_error, tiers })
    }

    /// Remove every tier's cached dense matrix. Returns the affected encoder ids.
    pub fn invalidate_dense_cache(&self) -> Result<Vec<String>> {
        self.dense.invalidate().map_err(|e| Error::Cache(e.to_string()))
    }
}
