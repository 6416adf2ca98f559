use anyhow::{Result, anyhow};
use std::path::Path;

use candle_core::Device;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::info;

use passagedb_core::Encoder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;
use crate::weights::{hidden_size, load_config, load_tokenizer, load_var_builder};

pub const MINILM_DIR_NAME: &str = "all-MiniLM-L6-v2";
pub const MINILM_DIM: usize = 384;

/// Sentence-transformers MiniLM: BERT, attention-masked mean pooling.
pub struct MiniLmEncoder { model: BertModel, tokenizer: Tokenizer, device: Device, max_len: usize, dim: usize, id: String }

impl MiniLmEncoder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading MiniLM");
        let tokenizer = load_tokenizer(model_dir)?;
        let (config, raw): (BertConfig, _) = load_config(model_dir)?;
        let dim = hidden_size(&raw)?;
        let vb = load_var_builder(model_dir, DTYPE, &device)?;
        let model = BertModel::load(vb, &config)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| MINILM_DIR_NAME.to_string());
        let id = format!("minilm:{}:mean:d{}:len{}", name, dim, max_len);
        info!(encoder = %id, "MiniLM loaded");
        Ok(Self { model, tokenizer, device, max_len, dim, id })
    }
}

impl Encoder for MiniLmEncoder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != self.dim { return Err(anyhow!("MiniLM produced {} dims, expected {}", emb.len(), self.dim)); }
        Ok(emb)
    }
}
