use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use passagedb_core::Encoder;

/// Feature-hashing encoder: each whitespace token lands in one bucket.
/// Deterministic across runs and platforms; needs no model files.
pub struct HashEncoder { dim: usize, id: String }

impl HashEncoder {
    pub fn new(dim: usize) -> Self { let dim = dim.max(1); Self { dim, id: format!("hash:xxh64:d{}", dim) } }
}

impl Encoder for HashEncoder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }
}
