use anyhow::{ensure, Result};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use passagedb_core::{Corpus, MatrixCache, ScoreVector};

use crate::matrix::cosine_scores;
use crate::tier::{DenseTier, EncoderSlot};

pub const DEFAULT_BATCH_SIZE: usize = 24;

/// A dense score vector and the tier that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct DenseScores {
    pub scores: ScoreVector,
    pub tier: DenseTier,
    pub encoder_id: Option<String>,
}

impl DenseScores {
    pub fn null(n: usize) -> Self {
        Self { scores: vec![0.0; n], tier: DenseTier::Null, encoder_id: None }
    }
}

/// Readiness of one tier after `DenseRanker::warm`.
#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub tier: DenseTier,
    pub encoder_id: Option<String>,
    pub ready: bool,
    pub error: Option<String>,
}

/// Walks the encoder tiers in order; the first tier that yields a full score
/// vector wins, otherwise every passage scores 0.
///
/// A tier that errors is skipped for the current call only. The next call
/// starts again at the first tier.
pub struct DenseRanker {
    slots: Vec<EncoderSlot>,
    cache: Arc<dyn MatrixCache>,
    batch_size: usize,
}

impl DenseRanker {
    pub fn new(cache: Arc<dyn MatrixCache>) -> Self {
        Self { slots: Vec::new(), cache, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_slot(mut self, slot: EncoderSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn tiers(&self) -> Vec<DenseTier> {
        self.slots.iter().map(|s| s.tier()).collect()
    }

    /// Never fails: the worst case is a zero vector of corpus length.
    pub fn score(&self, corpus: &Corpus, query: &str) -> DenseScores {
        let n = corpus.len();
        if n == 0 {
            return DenseScores::null(0);
        }
        for slot in &self.slots {
            match self.try_slot(slot, corpus, query) {
                Ok(Some(scores)) => return scores,
                Ok(None) => debug!(tier = %slot.tier(), "dense tier not usable, trying next"),
                Err(e) => warn!(tier = %slot.tier(), error = %e, "dense tier failed, trying next"),
            }
        }
        debug!("no dense tier usable, using null scores");
        DenseScores::null(n)
    }

    fn try_slot(&self, slot: &EncoderSlot, corpus: &Corpus, query: &str) -> Result<Option<DenseScores>> {
        let Some(encoder) = slot.encoder() else { return Ok(None) };
        let Some(matrix) = slot.matrix(encoder.as_ref(), corpus, self.cache.as_ref(), self.batch_size)? else {
            return Ok(None);
        };
        let q = encoder.encode(query)?;
        let scores = cosine_scores(&q, &matrix)?;
        ensure!(scores.len() == corpus.len(), "{} dense scores for {} passages", scores.len(), corpus.len());
        Ok(Some(DenseScores { scores, tier: slot.tier(), encoder_id: Some(encoder.id().to_string()) }))
    }

    /// Instantiate every encoder and load or build every matrix up front.
    pub fn warm(&self, corpus: &Corpus) -> Vec<TierStatus> {
        self.slots
            .iter()
            .map(|slot| {
                let Some(encoder) = slot.encoder() else {
                    return TierStatus { tier: slot.tier(), encoder_id: None, ready: false, error: Some("encoder unavailable".to_string()) };
                };
                let encoder_id = Some(encoder.id().to_string());
                if corpus.is_empty() {
                    return TierStatus { tier: slot.tier(), encoder_id, ready: true, error: None };
                }
                match slot.matrix(encoder.as_ref(), corpus, self.cache.as_ref(), self.batch_size) {
                    Ok(Some(_)) => TierStatus { tier: slot.tier(), encoder_id, ready: true, error: None },
                    Ok(None) => TierStatus { tier: slot.tier(), encoder_id, ready: false, error: Some("no cached matrix".to_string()) },
                    Err(e) => TierStatus { tier: slot.tier(), encoder_id, ready: false, error: Some(e.to_string()) },
                }
            })
            .collect()
    }

    /// Drop cached artifacts and in-memory matrices for every instantiable tier.
    /// Returns the invalidated encoder ids.
    pub fn invalidate(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for slot in &self.slots {
            slot.clear();
            if let Some(encoder) = slot.encoder() {
                self.cache.invalidate(encoder.id())?;
                ids.push(encoder.id().to_string());
            }
        }
        Ok(ids)
    }
}
