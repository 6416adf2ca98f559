//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_RETRIEVAL__ALPHA=0.5`). `Settings`
//! is the typed view the retrieval service is built from.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_ALPHA: f32 = 0.65;
pub const DEFAULT_TOP_K: usize = 8;
pub const DEFAULT_BATCH_SIZE: usize = 24;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: dir.to_path_buf() })
    }

    /// Config from an in-memory TOML document; relative paths resolve against `base_dir`.
    pub fn from_toml_str(toml: &str, base_dir: &Path) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)), base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings. Paths come back resolved.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        settings.resolve_paths(&self.base_dir);
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub corpus: CorpusSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub encoders: EncoderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSettings {
    pub snapshot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA, top_k: DEFAULT_TOP_K }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { dir: default_cache_dir(), batch_size: DEFAULT_BATCH_SIZE }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub primary: Option<EncoderSpec>,
    pub secondary: Option<EncoderSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderKind {
    /// XLM-RoBERTa BGE-M3, CLS pooled, 1024 dims.
    BgeM3,
    /// BERT MiniLM sentence encoder, mean pooled.
    #[serde(alias = "mini-lm")]
    Minilm,
    /// Deterministic feature-hashing encoder; no model files.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSpec {
    pub kind: EncoderKind,
    pub model_dir: Option<String>,
    /// Only used by `hash`.
    pub dim: Option<usize>,
    pub max_len: Option<usize>,
    /// Encode the corpus when no cached matrix exists. When false the tier is
    /// only usable with a pre-built cache artifact.
    #[serde(default = "default_true")]
    pub build_on_miss: bool,
}

fn default_alpha() -> f32 { DEFAULT_ALPHA }
fn default_top_k() -> usize { DEFAULT_TOP_K }
fn default_batch_size() -> usize { DEFAULT_BATCH_SIZE }
fn default_cache_dir() -> String { "storage/dense".to_string() }
fn default_true() -> bool { true }

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.retrieval.alpha) {
            return Err(Error::InvalidConfig(format!(
                "retrieval.alpha must be within [0, 1], got {}",
                self.retrieval.alpha
            )));
        }
        if self.corpus.snapshot.trim().is_empty() {
            return Err(Error::InvalidConfig("corpus.snapshot must not be empty".to_string()));
        }
        if self.cache.batch_size == 0 {
            return Err(Error::InvalidConfig("cache.batch_size must be positive".to_string()));
        }
        for spec in [&self.encoders.primary, &self.encoders.secondary].into_iter().flatten() {
            if spec.kind == EncoderKind::Hash && spec.dim == Some(0) {
                return Err(Error::InvalidConfig("hash encoder dim must be positive".to_string()));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.corpus.snapshot = resolve_with_base(base, &self.corpus.snapshot).to_string_lossy().to_string();
        self.cache.dir = resolve_with_base(base, &self.cache.dir).to_string_lossy().to_string();
        for spec in [&mut self.encoders.primary, &mut self.encoders.secondary].into_iter().flatten() {
            if let Some(dir) = spec.model_dir.as_mut() {
                *dir = resolve_with_base(base, dir.as_str()).to_string_lossy().to_string();
            }
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.corpus.snapshot)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache.dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
