use std::sync::Arc;

use tracing::info;

use passagedb_core::config::{Config, EncoderSpec, Settings, DEFAULT_ALPHA, DEFAULT_TOP_K};
use passagedb_core::{Corpus, CorpusStore, Encoder, Error, FileSnapshot, MatrixCache, Result, SnapshotSource};
use passagedb_vector::{DenseRanker, DenseTier, EncoderLoader, EncoderSlot, FileMatrixCache, MemoryMatrixCache, DEFAULT_BATCH_SIZE};

use crate::service::RetrievalService;

/// Assembles a `RetrievalService`. Tiers are tried in the order they are added.
pub struct RetrievalServiceBuilder {
    snapshot: Option<Box<dyn SnapshotSource>>,
    corpus: Option<Corpus>,
    cache: Option<Arc<dyn MatrixCache>>,
    slots: Vec<EncoderSlot>,
    alpha: f32,
    top_k: usize,
    batch_size: usize,
}

impl Default for RetrievalServiceBuilder {
    fn default() -> Self {
        Self {
            snapshot: None,
            corpus: None,
            cache: None,
            slots: Vec::new(),
            alpha: DEFAULT_ALPHA,
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RetrievalServiceBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn snapshot(mut self, source: impl SnapshotSource + 'static) -> Self {
        self.snapshot = Some(Box::new(source));
        self
    }

    /// Use an already parsed corpus instead of a snapshot source.
    pub fn corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn MatrixCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn slot(mut self, slot: EncoderSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn encoder(self, tier: DenseTier, encoder: Arc<dyn Encoder>, build_on_miss: bool) -> Self {
        self.slot(EncoderSlot::ready(tier, encoder, build_on_miss))
    }

    pub fn lazy_encoder(self, tier: DenseTier, loader: EncoderLoader, build_on_miss: bool) -> Self {
        self.slot(EncoderSlot::new(tier, loader, build_on_miss))
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn build(self) -> Result<RetrievalService> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!("alpha must be within [0, 1], got {}", self.alpha)));
        }
        let store = match (self.corpus, self.snapshot) {
            (Some(corpus), _) => CorpusStore::preloaded(corpus),
            (None, Some(source)) => CorpusStore::new(source),
            (None, None) => return Err(Error::InvalidConfig("no corpus or snapshot source configured".to_string())),
        };
        let cache = self.cache.unwrap_or_else(|| Arc::new(MemoryMatrixCache::new()));
        let dense = self
            .slots
            .into_iter()
            .fold(DenseRanker::new(cache).with_batch_size(self.batch_size), DenseRanker::with_slot);
        Ok(RetrievalService::from_parts(store, dense, self.alpha, self.top_k))
    }
}

fn model_loader(spec: EncoderSpec) -> EncoderLoader {
    Box::new(move || passagedb_embed::load_encoder(&spec))
}

impl RetrievalService {
    pub fn builder() -> RetrievalServiceBuilder {
        RetrievalServiceBuilder::new()
    }

    /// Wire a service from typed settings: file snapshot, on-disk matrix
    /// cache and lazily loaded model encoders. Nothing is read until first use.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let mut builder = RetrievalServiceBuilder::new()
            .snapshot(FileSnapshot::new(settings.snapshot_path()))
            .cache(Arc::new(FileMatrixCache::new(settings.cache_dir())))
            .alpha(settings.retrieval.alpha)
            .top_k(settings.retrieval.top_k)
            .batch_size(settings.cache.batch_size);
        for (tier, spec) in [(DenseTier::Primary, &settings.encoders.primary), (DenseTier::Secondary, &settings.encoders.secondary)] {
            if let Some(spec) = spec {
                info!(tier = %tier, kind = ?spec.kind, build_on_miss = spec.build_on_miss, "dense tier configured");
                builder = builder.lazy_encoder(tier, model_loader(spec.clone()), spec.build_on_miss);
            }
        }
        builder.build()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_settings(&config.settings()?)
    }
}
