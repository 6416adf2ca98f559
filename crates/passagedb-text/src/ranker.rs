use std::sync::{Arc, Mutex};

use anyhow::Result;

use passagedb_core::{Corpus, ScoreVector};

use crate::index::LexicalIndex;

/// Builds the lexical index on first use and reuses it for every later query.
///
/// The build runs under a lock so concurrent first callers wait for one build
/// instead of racing. A failed build is retried on the next call.
#[derive(Default)]
pub struct LexicalRanker {
	index: Mutex<Option<Arc<LexicalIndex>>>,
}

impl LexicalRanker {
	pub fn new() -> Self { Self::default() }

	pub fn index(&self, corpus: &Corpus) -> Result<Arc<LexicalIndex>> {
		let mut guard = self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		if let Some(idx) = guard.as_ref() {
			return Ok(Arc::clone(idx));
		}
		let idx = Arc::new(LexicalIndex::build(corpus)?);
		*guard = Some(Arc::clone(&idx));
		Ok(idx)
	}

	pub fn score(&self, corpus: &Corpus, query: &str) -> Result<ScoreVector> {
		self.index(corpus)?.score(query)
	}

	pub fn is_built(&self) -> bool {
		self.index.lock().map(|g| g.is_some()).unwrap_or(false)
	}
}
