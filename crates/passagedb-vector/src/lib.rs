//! passagedb-vector
//!
//! Dense ranking: cosine similarity against an encoded corpus matrix, with a
//! tiered encoder fallback chain and matrix caches keyed by encoder identity.

pub mod cache;
pub mod matrix;
pub mod ranker;
pub mod tier;

pub use cache::{CacheMeta, FileMatrixCache, MemoryMatrixCache};
pub use matrix::cosine_scores;
pub use ranker::{DenseRanker, DenseScores, TierStatus, DEFAULT_BATCH_SIZE};
pub use tier::{encode_corpus, DenseTier, EncoderLoader, EncoderSlot};
