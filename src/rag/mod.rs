//! Semantic retrieval over stored policy documents.
//!
//! - `RetrievalEngine`: soft-failing facade used by the pipeline
//! - `RetrievalBackend`: managed index service or local SQLite index
//! - `Embedder`: text-to-vector encoders for the local index

pub mod backend;
pub mod document;
pub mod embedder;
pub mod engine;
pub mod managed;
pub mod sqlite;

pub use backend::{BackendMode, RetrievalBackend};
pub use document::{Document, MetadataFilter, RetrievalResult, ScoredDocument};
pub use engine::{BatchCounts, RetrievalEngine, RetrievalStats};
