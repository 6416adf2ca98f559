use anyhow::{Result, anyhow};
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use passagedb_core::Encoder;

use crate::device::select_device;
use crate::pool::cls_l2;
use crate::tokenize::tokenize_on_device;
use crate::weights::{hidden_size, load_config, load_tokenizer, load_var_builder};

pub const BGE_M3_DIR_NAME: &str = "bge-m3";
pub const BGE_M3_DIM: usize = 1024;

/// BGE-M3 dense encoder: XLM-RoBERTa, [CLS] pooled, L2 normalized.
pub struct BgeM3Encoder { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, max_len: usize, dim: usize, id: String }

impl BgeM3Encoder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3");
        let tokenizer = load_tokenizer(model_dir)?;
        let (config, raw): (XLMRobertaConfig, _) = load_config(model_dir)?;
        let dim = hidden_size(&raw)?;
        let vb = load_var_builder(model_dir, DType::F32, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        let id = format!("bge-m3:cls:d{}:len{}", dim, max_len);
        info!(encoder = %id, "BGE-M3 loaded");
        Ok(Self { model, tokenizer, device, max_len, dim, id })
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let (b, t) = input_ids.dims2()?;
        let token_type_ids = Tensor::zeros((b, t), DType::I64, &self.device)?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = cls_l2(&hidden_states)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != self.dim { return Err(anyhow!("BGE-M3 produced {} dims, expected {}", emb.len(), self.dim)); }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 { debug!(elapsed_ms = elapsed as u64, tokens = t, "slow embedding"); }
        Ok(emb)
    }
}

impl Encoder for BgeM3Encoder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn encode(&self, text: &str) -> Result<Vec<f32>> { self.embed_text(text) }
}
