//! Encoded-corpus caches keyed by encoder identity.
//!
//! `FileMatrixCache` stores one artifact pair per encoder: a safetensors file
//! holding the N x D `embeddings` tensor and a JSON sidecar recording the
//! encoder id, corpus fingerprint, shape and creation time. The sidecar is
//! written last, so a matrix without a sidecar is never served. An artifact
//! whose fingerprint differs from the live corpus is deleted on lookup.
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use candle_core::{Device, Tensor};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use passagedb_core::{DenseMatrix, MatrixCache};

const TENSOR_NAME: &str = "embeddings";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheMeta {
    pub encoder_id: String,
    pub corpus_fingerprint: String,
    pub rows: usize,
    pub dim: usize,
    pub created_at_ms: i64,
}

pub struct FileMatrixCache {
    dir: PathBuf,
}

impl FileMatrixCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem for an encoder: readable slug plus a short hash of the full id,
    /// so ids differing only in punctuation never share files.
    fn stem(encoder_id: &str) -> String {
        let slug: String = encoder_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(64)
            .collect();
        let digest = blake3::hash(encoder_id.as_bytes()).to_hex();
        format!("{}-{}", slug, &digest.as_str()[..12])
    }

    pub fn tensor_path(&self, encoder_id: &str) -> PathBuf {
        self.dir.join(format!("{}.safetensors", Self::stem(encoder_id)))
    }

    pub fn meta_path(&self, encoder_id: &str) -> PathBuf {
        self.dir.join(format!("{}.meta.json", Self::stem(encoder_id)))
    }

    pub fn meta(&self, encoder_id: &str) -> Result<Option<CacheMeta>> {
        let path = self.meta_path(encoder_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let meta = serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(meta))
    }

    fn remove_if_exists(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("remove {}: {}", path.display(), e)),
        }
    }
}

impl MatrixCache for FileMatrixCache {
    fn get(&self, encoder_id: &str, corpus_fingerprint: &str) -> Result<Option<DenseMatrix>> {
        let Some(meta) = self.meta(encoder_id)? else {
            debug!(encoder = encoder_id, "no cached matrix");
            return Ok(None);
        };
        if meta.encoder_id != encoder_id || meta.corpus_fingerprint != corpus_fingerprint {
            info!(
                encoder = encoder_id,
                cached = %meta.corpus_fingerprint,
                current = corpus_fingerprint,
                "cached matrix is stale, invalidating"
            );
            self.invalidate(encoder_id)?;
            return Ok(None);
        }
        let tensor_path = self.tensor_path(encoder_id);
        if !tensor_path.exists() {
            self.invalidate(encoder_id)?;
            return Ok(None);
        }
        let tensors = candle_core::safetensors::load(&tensor_path, &Device::Cpu)?;
        let tensor = tensors
            .get(TENSOR_NAME)
            .ok_or_else(|| anyhow!("{} has no '{}' tensor", tensor_path.display(), TENSOR_NAME))?;
        let (rows, dim) = tensor.dims2()?;
        if rows != meta.rows || dim != meta.dim {
            return Err(anyhow!(
                "{} holds {}x{}, sidecar says {}x{}",
                tensor_path.display(),
                rows,
                dim,
                meta.rows,
                meta.dim
            ));
        }
        let data = tensor.flatten_all()?.to_vec1::<f32>()?;
        info!(encoder = encoder_id, rows, dim, "loaded cached matrix");
        Ok(Some(DenseMatrix { encoder_id: meta.encoder_id, corpus_fingerprint: meta.corpus_fingerprint, rows, dim, data }))
    }

    fn put(&self, matrix: &DenseMatrix) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        // drop the old sidecar first so a crash mid-write leaves a miss, not a mismatch
        Self::remove_if_exists(&self.meta_path(&matrix.encoder_id))?;

        let tensor = Tensor::from_vec(matrix.data.clone(), (matrix.rows, matrix.dim), &Device::Cpu)?;
        let tensors = HashMap::from([(TENSOR_NAME.to_string(), tensor)]);
        let tmp_tensor = tempfile::Builder::new().prefix(".tmp-").suffix(".safetensors").tempfile_in(&self.dir)?;
        candle_core::safetensors::save(&tensors, tmp_tensor.path())?;
        tmp_tensor.persist(self.tensor_path(&matrix.encoder_id))?;

        let meta = CacheMeta {
            encoder_id: matrix.encoder_id.clone(),
            corpus_fingerprint: matrix.corpus_fingerprint.clone(),
            rows: matrix.rows,
            dim: matrix.dim,
            created_at_ms: Utc::now().timestamp_millis(),
        };
        let mut tmp_meta = tempfile::Builder::new().prefix(".tmp-").suffix(".json").tempfile_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp_meta, &meta)?;
        tmp_meta.flush()?;
        tmp_meta.persist(self.meta_path(&matrix.encoder_id))?;
        info!(encoder = %matrix.encoder_id, rows = matrix.rows, dim = matrix.dim, dir = %self.dir.display(), "cached matrix written");
        Ok(())
    }

    fn invalidate(&self, encoder_id: &str) -> Result<()> {
        Self::remove_if_exists(&self.meta_path(encoder_id))?;
        Self::remove_if_exists(&self.tensor_path(encoder_id))
    }
}

/// Process-local cache, for tests and callers without a writable disk.
#[derive(Default)]
pub struct MemoryMatrixCache {
    entries: Mutex<HashMap<String, DenseMatrix>>,
}

impl MemoryMatrixCache {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MatrixCache for MemoryMatrixCache {
    fn get(&self, encoder_id: &str, corpus_fingerprint: &str) -> Result<Option<DenseMatrix>> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("matrix cache lock poisoned"))?;
        match entries.get(encoder_id) {
            Some(m) if m.corpus_fingerprint == corpus_fingerprint => Ok(Some(m.clone())),
            Some(_) => {
                entries.remove(encoder_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, matrix: &DenseMatrix) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("matrix cache lock poisoned"))?;
        entries.insert(matrix.encoder_id.clone(), matrix.clone());
        Ok(())
    }

    fn invalidate(&self, encoder_id: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("matrix cache lock poisoned"))?;
        entries.remove(encoder_id);
        Ok(())
    }
}
