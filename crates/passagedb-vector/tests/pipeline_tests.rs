use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use passagedb_core::{Corpus, Encoder, MatrixCache};
use passagedb_embed::HashEncoder;
use passagedb_vector::{DenseRanker, DenseTier, EncoderSlot, FileMatrixCache, MemoryMatrixCache};

/// HashEncoder that counts corpus encodes and can be told to fail.
struct CountingEncoder {
    inner: HashEncoder,
    batches: AtomicUsize,
    queries: AtomicUsize,
    fail_queries: AtomicBool,
}

impl CountingEncoder {
    fn new(dim: usize) -> Arc<Self> {
        Arc::new(Self { inner: HashEncoder::new(dim), batches: AtomicUsize::new(0), queries: AtomicUsize::new(0), fail_queries: AtomicBool::new(false) })
    }
}

impl Encoder for CountingEncoder {
    fn id(&self) -> &str { self.inner.id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) { anyhow::bail!("model crashed"); }
        self.inner.encode(text)
    }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.inner.encode(t)).collect()
    }
}

/// Claims zero width and returns empty vectors.
struct ZeroWidth;

impl Encoder for ZeroWidth {
    fn id(&self) -> &str { "zero:d0" }
    fn dim(&self) -> usize { 0 }
    fn encode(&self, _text: &str) -> anyhow::Result<Vec<f32>> { Ok(Vec::new()) }
}

fn corpus() -> Corpus {
    Corpus::from_pairs([
        ("solar panels charge the battery bank", "power.txt"),
        ("rain barrels collect roof runoff", "water.txt"),
        ("the battery bank powers the radio", "power.txt"),
    ])
}

fn unavailable() -> passagedb_vector::EncoderLoader {
    Box::new(|| -> anyhow::Result<Arc<dyn Encoder>> { anyhow::bail!("model files missing") })
}

#[test]
fn primary_tier_serves_when_healthy() {
    let primary = CountingEncoder::new(64);
    let ranker = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, primary.clone(), true))
        .with_slot(EncoderSlot::ready(DenseTier::Secondary, CountingEncoder::new(32), true));
    let out = ranker.score(&corpus(), "battery bank");
    assert_eq!(out.tier, DenseTier::Primary);
    assert_eq!(out.scores.len(), 3);
    assert!(out.scores[0] > out.scores[1]);
    ranker.score(&corpus(), "rain");
    assert_eq!(primary.batches.load(Ordering::SeqCst), 1, "corpus encoded once");
}

#[test]
fn unavailable_primary_falls_back_to_secondary() {
    let ranker = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::new(DenseTier::Primary, unavailable(), true))
        .with_slot(EncoderSlot::ready(DenseTier::Secondary, CountingEncoder::new(32), true));
    let out = ranker.score(&corpus(), "rain");
    assert_eq!(out.tier, DenseTier::Secondary);
    assert_eq!(out.encoder_id.as_deref(), Some("hash:xxh64:d32"));
}

#[test]
fn query_failure_degrades_only_the_current_call() {
    let primary = CountingEncoder::new(64);
    let ranker = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, primary.clone(), true))
        .with_slot(EncoderSlot::ready(DenseTier::Secondary, CountingEncoder::new(32), true));

    primary.fail_queries.store(true, Ordering::SeqCst);
    assert_eq!(ranker.score(&corpus(), "rain").tier, DenseTier::Secondary);

    primary.fail_queries.store(false, Ordering::SeqCst);
    assert_eq!(ranker.score(&corpus(), "rain").tier, DenseTier::Primary);
    assert_eq!(primary.queries.load(Ordering::SeqCst), 2, "primary retried on the second call");
}

#[test]
fn no_usable_encoder_yields_zero_vector() {
    let ranker = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::new(DenseTier::Primary, unavailable(), true))
        .with_slot(EncoderSlot::new(DenseTier::Secondary, unavailable(), true));
    let out = ranker.score(&corpus(), "anything");
    assert_eq!(out.tier, DenseTier::Null);
    assert_eq!(out.scores, vec![0.0; 3]);

    let bare = DenseRanker::new(Arc::new(MemoryMatrixCache::new()));
    assert_eq!(bare.score(&corpus(), "x").scores, vec![0.0; 3]);
}

#[test]
fn secondary_without_cache_and_no_build_is_skipped() {
    let ranker = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::ready(DenseTier::Secondary, CountingEncoder::new(32), false));
    assert_eq!(ranker.score(&corpus(), "rain").tier, DenseTier::Null);
}

#[test]
fn prebuilt_secondary_cache_is_used_without_building() {
    let cache = Arc::new(MemoryMatrixCache::new());
    let c = corpus();
    let seeded = passagedb_vector::encode_corpus(&HashEncoder::new(32), &c, 2).expect("encode");
    cache.put(&seeded).expect("seed");

    let secondary = CountingEncoder::new(32);
    let ranker = DenseRanker::new(cache)
        .with_slot(EncoderSlot::ready(DenseTier::Secondary, secondary.clone(), false));
    assert_eq!(ranker.score(&c, "rain").tier, DenseTier::Secondary);
    assert_eq!(secondary.batches.load(Ordering::SeqCst), 0);
}

#[test]
fn file_cache_survives_restart_without_reencoding() {
    let tmp = tempfile::tempdir().expect("tmp");
    let c = corpus();

    let first_encoder = CountingEncoder::new(48);
    let first = DenseRanker::new(Arc::new(FileMatrixCache::new(tmp.path())))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, first_encoder.clone(), true));
    let before = first.score(&c, "battery radio");
    assert_eq!(first_encoder.batches.load(Ordering::SeqCst), 1);

    // a fresh ranker stands in for a new process
    let second_encoder = CountingEncoder::new(48);
    let second = DenseRanker::new(Arc::new(FileMatrixCache::new(tmp.path())))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, second_encoder.clone(), true));
    let after = second.score(&c, "battery radio");
    assert_eq!(second_encoder.batches.load(Ordering::SeqCst), 0, "cache hit");
    assert_eq!(before.scores, after.scores);
}

#[test]
fn changed_corpus_rebuilds_cached_matrix() {
    let tmp = tempfile::tempdir().expect("tmp");
    let encoder = CountingEncoder::new(16);
    let first = DenseRanker::new(Arc::new(FileMatrixCache::new(tmp.path())))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, encoder.clone(), true));
    first.score(&corpus(), "rain");

    let grown = Corpus::from_pairs([("rain barrels collect roof runoff", "water.txt"), ("seed saving", "garden.txt")]);
    let second = DenseRanker::new(Arc::new(FileMatrixCache::new(tmp.path())))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, encoder.clone(), true));
    let out = second.score(&grown, "rain");
    assert_eq!(out.scores.len(), 2);
    assert_eq!(encoder.batches.load(Ordering::SeqCst), 2, "stale matrix was rebuilt");
}

#[test]
fn concurrent_first_calls_build_once() {
    let encoder = CountingEncoder::new(32);
    let ranker = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, encoder.clone(), true));
    let c = corpus();
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| assert_eq!(ranker.score(&c, "solar").tier, DenseTier::Primary));
        }
    });
    assert_eq!(encoder.batches.load(Ordering::SeqCst), 1);
}

#[test]
fn invalidate_forces_a_rebuild() {
    let tmp = tempfile::tempdir().expect("tmp");
    let encoder = CountingEncoder::new(16);
    let ranker = DenseRanker::new(Arc::new(FileMatrixCache::new(tmp.path())))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, encoder.clone(), true));
    let status = ranker.warm(&corpus());
    assert!(status[0].ready);
    let ids = ranker.invalidate().expect("invalidate");
    assert_eq!(ids, vec!["hash:xxh64:d16".to_string()]);
    ranker.score(&corpus(), "rain");
    assert_eq!(encoder.batches.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_width_encoder_falls_through_with_full_length_scores() {
    let c = corpus();
    assert!(passagedb_vector::encode_corpus(&ZeroWidth, &c, 4).is_err());

    let ranker = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, Arc::new(ZeroWidth), true))
        .with_slot(EncoderSlot::ready(DenseTier::Secondary, CountingEncoder::new(32), true));
    let out = ranker.score(&c, "rain");
    assert_eq!(out.tier, DenseTier::Secondary);
    assert_eq!(out.scores.len(), c.len());

    let alone = DenseRanker::new(Arc::new(MemoryMatrixCache::new()))
        .with_slot(EncoderSlot::ready(DenseTier::Primary, Arc::new(ZeroWidth), true));
    let out = alone.score(&c, "rain");
    assert_eq!(out.tier, DenseTier::Null);
    assert_eq!(out.scores, vec![0.0; c.len()]);
}

#[test]
fn short_cached_matrix_is_never_scored() {
    let cache = Arc::new(MemoryMatrixCache::new());
    let c = corpus();
    let short = passagedb_core::DenseMatrix::from_rows("hash:xxh64:d8", c.fingerprint(), 8, vec![vec![0.5; 8]]).expect("matrix");
    cache.put(&short).expect("seed");
    let ranker = DenseRanker::new(cache)
        .with_slot(EncoderSlot::ready(DenseTier::Primary, CountingEncoder::new(8), false));
    let out = ranker.score(&c, "rain");
    assert_eq!(out.tier, DenseTier::Null);
    assert_eq!(out.scores.len(), 3);
}
