use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use passagedb_core::{Corpus, ScoreVector};

use crate::tantivy_utils::{build_schema, passage_analyzer, register_tokenizer, tokenize};

/// In-RAM BM25 index over every passage of one corpus.
///
/// Tantivy's scorer is Okapi BM25 (k1 = 1.2, b = 0.75) with the always
/// positive idf `ln(1 + (N - n + 0.5) / (n + 0.5))`, so a passage matching more
/// and rarer terms never scores below one matching fewer, commoner terms.
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	pid_field: Field,
	text_field: Field,
	analyzer: TextAnalyzer,
	token_counts: Vec<usize>,
}

impl LexicalIndex {
	pub fn build(corpus: &Corpus) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let pid_field = schema.get_field("pid")?;
		let text_field = schema.get_field("text")?;
		let mut analyzer = passage_analyzer();

		let mut token_counts = Vec::with_capacity(corpus.len());
		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000)?;
		for passage in corpus.passages() {
			token_counts.push(tokenize(&mut analyzer, &passage.text).len());
			index_writer.add_document(doc!(
				pid_field => passage.id as u64,
				text_field => passage.text.clone(),
			))?;
		}
		index_writer.commit().context("commit lexical index")?;

		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		info!(passages = corpus.len(), "lexical index built");
		Ok(Self { index, reader, pid_field, text_field, analyzer, token_counts })
	}

	/// Number of indexed passages; equals the corpus length.
	pub fn len(&self) -> usize {
		self.token_counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.token_counts.is_empty()
	}

	pub fn token_count(&self, id: usize) -> Option<usize> {
		self.token_counts.get(id).copied()
	}

	/// Query tokens under the same policy used at index time.
	pub fn query_tokens(&self, query: &str) -> Vec<String> {
		let mut analyzer = self.analyzer.clone();
		tokenize(&mut analyzer, query)
	}

	/// BM25 score for every passage; non-matching passages score 0.
	/// Repeated query tokens count once per occurrence.
	pub fn score(&self, query: &str) -> Result<ScoreVector> {
		let n = self.len();
		let mut scores = vec![0f32; n];
		let tokens = self.query_tokens(query);
		if n == 0 || tokens.is_empty() {
			return Ok(scores);
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.text_field, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let query = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(n))?;
		for (score, addr) in &top_docs {
			let doc: TantivyDocument = searcher.doc(*addr)?;
			let pid = doc
				.get_first(self.pid_field)
				.and_then(|v| v.as_u64())
				.context("indexed passage without pid")? as usize;
			if let Some(slot) = scores.get_mut(pid) {
				*slot = *score;
			}
		}
		debug!(tokens = tokens.len(), matched = top_docs.len(), "lexical scores computed");
		Ok(scores)
	}

	pub fn index(&self) -> &Index {
		&self.index
	}
}
