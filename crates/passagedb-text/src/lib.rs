//! passagedb-text
//!
//! Tantivy-backed lexical ranking. `LexicalIndex` holds an in-RAM BM25 index
//! over the corpus; `LexicalRanker` memoizes it for the process lifetime.

pub mod index;
pub mod ranker;
pub mod tantivy_utils;

pub use index::LexicalIndex;
pub use ranker::LexicalRanker;
