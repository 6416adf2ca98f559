//! passagedb-embed
//!
//! Text encoders behind `passagedb_core::Encoder`: BGE-M3 and MiniLM run on
//! candle; `HashEncoder` is a model-free stand-in. `APP_USE_FAKE_EMBEDDINGS=1`
//! swaps every configured encoder for a `HashEncoder` of the same width.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use passagedb_core::config::{EncoderKind, EncoderSpec};
use passagedb_core::Encoder;

pub mod bge;
pub mod device;
pub mod hash;
pub mod minilm;
pub mod pool;
pub mod tokenize;
pub mod weights;

pub use bge::BgeM3Encoder;
pub use hash::HashEncoder;
pub use minilm::MiniLmEncoder;
pub use pool::{cls_l2, masked_mean_l2};

pub const DEFAULT_HASH_DIM: usize = 1024;
const DEFAULT_BGE_MAX_LEN: usize = 512;
const DEFAULT_MINILM_MAX_LEN: usize = 256;

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Instantiate the encoder described by `spec`. Loads model weights, so
/// callers should do this once and share the result.
pub fn load_encoder(spec: &EncoderSpec) -> Result<Arc<dyn Encoder>> {
    if use_fake_embeddings() {
        let dim = match spec.kind {
            EncoderKind::BgeM3 => bge::BGE_M3_DIM,
            EncoderKind::Minilm => minilm::MINILM_DIM,
            EncoderKind::Hash => spec.dim.unwrap_or(DEFAULT_HASH_DIM),
        };
        info!(kind = ?spec.kind, dim, "using HashEncoder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Arc::new(HashEncoder::new(dim)));
    }
    let configured = spec.model_dir.as_deref().map(Path::new);
    match spec.kind {
        EncoderKind::BgeM3 => {
            let dir = weights::resolve_model_dir(configured, bge::BGE_M3_DIR_NAME)?;
            Ok(Arc::new(BgeM3Encoder::load(&dir, spec.max_len.unwrap_or(DEFAULT_BGE_MAX_LEN))?))
        }
        EncoderKind::Minilm => {
            let dir = weights::resolve_model_dir(configured, minilm::MINILM_DIR_NAME)?;
            Ok(Arc::new(MiniLmEncoder::load(&dir, spec.max_len.unwrap_or(DEFAULT_MINILM_MAX_LEN))?))
        }
        EncoderKind::Hash => Ok(Arc::new(HashEncoder::new(spec.dim.unwrap_or(DEFAULT_HASH_DIM)))),
    }
}
