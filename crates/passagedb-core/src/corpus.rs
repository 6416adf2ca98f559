//! Corpus snapshot parsing and the memoized corpus store.
//!
//! A snapshot is a JSON object mapping stringified ordinals `"0".."N-1"` to
//! `{"text": .., "source": ..}`. Loading is all-or-nothing: any gap, stray key
//! or malformed entry rejects the whole snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::traits::SnapshotSource;
use crate::types::{Passage, PassageId};

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    text: String,
    source: String,
}

/// The immutable, ordered passage set plus its index-aligned projections.
#[derive(Debug, Clone)]
pub struct Corpus {
    passages: Vec<Passage>,
    texts: Vec<String>,
    sources: Vec<String>,
    fingerprint: String,
}

impl Corpus {
    /// Build a corpus from `(text, source)` pairs; ids follow iteration order.
    pub fn from_pairs<I, T, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: Into<String>,
    {
        let passages: Vec<Passage> = pairs
            .into_iter()
            .enumerate()
            .map(|(id, (text, source))| Passage { id, text: text.into(), source: source.into() })
            .collect();
        let texts = passages.iter().map(|p| p.text.clone()).collect();
        let sources = passages.iter().map(|p| p.source.clone()).collect();
        let fingerprint = fingerprint(&passages);
        Self { passages, texts, sources, fingerprint }
    }

    /// Parse snapshot JSON. Errors are always `Error::InvalidConfig`.
    pub fn from_snapshot_json(raw: &str) -> Result<Self> {
        let entries: BTreeMap<String, SnapshotEntry> = serde_json::from_str(raw)
            .map_err(|e| Error::InvalidConfig(format!("malformed corpus snapshot: {}", e)))?;
        let n = entries.len();
        let mut slots: Vec<Option<SnapshotEntry>> = (0..n).map(|_| None).collect();
        for (key, entry) in entries {
            let id: PassageId = key
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("snapshot key '{}' is not an ordinal", key)))?;
            // canonical form only: "01" and "1" must not both map to passage 1
            if id.to_string() != key {
                return Err(Error::InvalidConfig(format!("snapshot key '{}' is not canonical", key)));
            }
            let slot = slots
                .get_mut(id)
                .ok_or_else(|| Error::InvalidConfig(format!("snapshot key '{}' is outside 0..{}", key, n)))?;
            *slot = Some(entry);
        }
        let mut pairs = Vec::with_capacity(n);
        for (id, slot) in slots.into_iter().enumerate() {
            let entry = slot.ok_or_else(|| Error::InvalidConfig(format!("snapshot is missing ordinal {}", id)))?;
            pairs.push((entry.text, entry.source));
        }
        Ok(Self::from_pairs(pairs))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn get(&self, id: PassageId) -> Option<&Passage> {
        self.passages.get(id)
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Content hash over every `(text, source)` in order. Cached dense
    /// matrices store it to detect row misalignment after a corpus change.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(passages: &[Passage]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(passages.len() as u64).to_le_bytes());
    for p in passages {
        for field in [&p.text, &p.source] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Snapshot stored as a JSON file on disk.
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for FileSnapshot {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_snapshot(&self) -> Result<String> {
        if !self.path.exists() {
            return Err(Error::InvalidConfig(format!(
                "corpus snapshot not found at {}; run ingestion first",
                self.path.display()
            )));
        }
        std::fs::read_to_string(&self.path)
            .map_err(|e| Error::InvalidConfig(format!("failed to read {}: {}", self.path.display(), e)))
    }
}

/// Snapshot held in memory, mostly for tests and embedding callers.
pub struct InlineSnapshot(pub String);

impl SnapshotSource for InlineSnapshot {
    fn describe(&self) -> String {
        "<inline>".to_string()
    }

    fn read_snapshot(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Lazily loads the corpus once and hands out the same `Arc` afterwards.
///
/// A failed load is not memoized; the next call reads the snapshot again.
pub struct CorpusStore {
    source: Box<dyn SnapshotSource>,
    cell: Mutex<Option<Arc<Corpus>>>,
}

impl CorpusStore {
    pub fn new(source: Box<dyn SnapshotSource>) -> Self {
        Self { source, cell: Mutex::new(None) }
    }

    /// Store that is already populated.
    pub fn preloaded(corpus: Corpus) -> Self {
        Self { source: Box::new(InlineSnapshot(String::new())), cell: Mutex::new(Some(Arc::new(corpus))) }
    }

    pub fn load(&self) -> Result<Arc<Corpus>> {
        let mut guard = self.cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(corpus) = guard.as_ref() {
            return Ok(Arc::clone(corpus));
        }
        let raw = self.source.read_snapshot()?;
        let corpus = Arc::new(Corpus::from_snapshot_json(&raw)?);
        info!(source = %self.source.describe(), passages = corpus.len(), "corpus loaded");
        *guard = Some(Arc::clone(&corpus));
        Ok(corpus)
    }
}
