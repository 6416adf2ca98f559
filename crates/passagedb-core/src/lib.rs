pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use corpus::{Corpus, CorpusStore, FileSnapshot, InlineSnapshot};
pub use error::{Error, Result};
pub use traits::{Encoder, MatrixCache, SnapshotSource};
pub use types::{DenseMatrix, FusedResult, Passage, PassageId, ScoreVector};
