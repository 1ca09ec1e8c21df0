//! Storage seam shared by the managed index service and the local index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::document::{Document, MetadataFilter, ScoredDocument};
use crate::core::errors::NavigatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendMode {
    /// Managed indexing service.
    Primary,
    /// Local index plus in-process embedding model.
    Fallback,
}

/// Both variants rank by cosine similarity over 384-dimensional embeddings.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    fn index_name(&self) -> &str;

    /// Prove the backend is usable. Called once at construction.
    async fn initialize(&self) -> Result<(), NavigatorError>;

    /// Up to `top_k` hits, best first.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>, NavigatorError>;

    /// Insert or overwrite by id.
    async fn upsert(&self, document: &Document) -> Result<(), NavigatorError>;

    async fn delete(&self, id: &str) -> Result<bool, NavigatorError>;

    async fn get(&self, id: &str) -> Result<Option<Document>, NavigatorError>;

    async fn search_by_metadata(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<Document>, NavigatorError>;

    async fn count(&self) -> Result<usize, NavigatorError>;
}
