//! passagedb-hybrid
//!
//! Fuses lexical (BM25) and dense (cosine) scores into one ranking and exposes
//! the `RetrievalService` entry point.

pub mod builder;
pub mod fusion;
pub mod service;

pub use builder::RetrievalServiceBuilder;
pub use fusion::{fuse, min_max_normalize, rank, NORMALIZE_EPS};
pub use service::{RetrievalOutcome, RetrievalService, WarmReport};
