use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use std::str::CharIndices;

use tantivy::tokenizer::{LowerCaser, TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::Index;

/// Name the passage analyzer is registered under.
pub const PASSAGE_TOKENIZER: &str = "whitespace_lower";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _pid_field = schema_builder.add_u64_field("pid", STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(PASSAGE_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

/// Splits on every Unicode whitespace char (NBSP, ideographic space, ...).
/// tantivy's `WhitespaceTokenizer` only knows ASCII whitespace.
#[derive(Clone, Default)]
pub struct UnicodeWhitespaceTokenizer {
	token: Token,
}

pub struct UnicodeWhitespaceTokenStream<'a> {
	text: &'a str,
	chars: CharIndices<'a>,
	token: &'a mut Token,
}

impl Tokenizer for UnicodeWhitespaceTokenizer {
	type TokenStream<'a> = UnicodeWhitespaceTokenStream<'a>;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> UnicodeWhitespaceTokenStream<'a> {
		self.token.reset();
		UnicodeWhitespaceTokenStream { text, chars: text.char_indices(), token: &mut self.token }
	}
}

impl UnicodeWhitespaceTokenStream<'_> {
	fn token_end(&mut self) -> usize {
		(&mut self.chars)
			.find(|(_, c)| c.is_whitespace())
			.map(|(offset, _)| offset)
			.unwrap_or(self.text.len())
	}
}

impl TokenStream for UnicodeWhitespaceTokenStream<'_> {
	fn advance(&mut self) -> bool {
		self.token.text.clear();
		self.token.position = self.token.position.wrapping_add(1);
		while let Some((offset_from, c)) = self.chars.next() {
			if !c.is_whitespace() {
				let offset_to = self.token_end();
				self.token.offset_from = offset_from;
				self.token.offset_to = offset_to;
				self.token.text.push_str(&self.text[offset_from..offset_to]);
				return true;
			}
		}
		false
	}

	fn token(&self) -> &Token {
		self.token
	}

	fn token_mut(&mut self) -> &mut Token {
		self.token
	}
}

/// Lowercase + whitespace split. No stemming, no stopwords: every literal token counts.
pub fn passage_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(UnicodeWhitespaceTokenizer::default())
		.filter(LowerCaser)
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(PASSAGE_TOKENIZER, passage_analyzer());
}

/// Tokens exactly as the index sees them.
pub fn tokenize(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut stream = analyzer.token_stream(text);
	stream.process(&mut |token| tokens.push(token.text.clone()));
	tokens
}
