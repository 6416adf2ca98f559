use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use tokenizers::Tokenizer;
use tracing::info;

/// Locate a model directory: explicit path, then `APP_MODEL_DIR`, `MODEL_DIR`,
/// then `../models/<name>` and `models/<name>` relative to the working directory.
pub fn resolve_model_dir(configured: Option<&Path>, default_name: &str) -> Result<PathBuf> {
    if let Some(p) = configured {
        if p.exists() { info!(dir = %p.display(), "using configured model dir"); return Ok(p.to_path_buf()); }
        return Err(anyhow!("configured model dir {} does not exist", p.display()));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { info!(dir = %p.display(), var, "using model dir from env"); return Ok(p); }
        }
    }
    for root in ["../models", "models"] {
        let p = Path::new(root).join(default_name);
        if p.exists() { info!(dir = %p.display(), "using model dir"); return Ok(p); }
    }
    Err(anyhow!("Could not locate {} model directory", default_name))
}

pub fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
}

/// Read `config.json` both as the model's typed config and as raw JSON (for
/// fields such as `hidden_size` the typed config keeps private).
pub fn load_config<C: serde::de::DeserializeOwned>(model_dir: &Path) -> Result<(C, serde_json::Value)> {
    let config_path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path)
        .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
    Ok((serde_json::from_str(&raw)?, serde_json::from_str(&raw)?))
}

pub fn hidden_size(raw_config: &serde_json::Value) -> Result<usize> {
    raw_config
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("config.json has no hidden_size"))
}

/// Prefer `model.safetensors`, fall back to `pytorch_model.bin`.
pub fn load_var_builder(model_dir: &Path, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors_path = model_dir.join("model.safetensors");
    let weights: HashMap<String, Tensor> = if safetensors_path.exists() {
        info!(path = %safetensors_path.display(), "loading safetensors weights");
        candle_core::safetensors::load(&safetensors_path, device)?
    } else {
        let weights_path = model_dir.join("pytorch_model.bin");
        info!(path = %weights_path.display(), "loading pickle weights");
        candle_core::pickle::read_all(&weights_path)?.into_iter().collect()
    };
    Ok(VarBuilder::from_tensors(weights, dtype, device))
}
