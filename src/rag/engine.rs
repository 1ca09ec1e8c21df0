//! Retrieval engine.
//!
//! Picks a backend once at construction (managed service if it comes up,
//! else the local index) and turns every backend failure into a soft
//! outcome: empty results, `false`, or zero counts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::{BackendMode, RetrievalBackend};
use super::document::{Document, MetadataFilter, RetrievalResult};
use super::embedder::{Embedder, HashingEmbedder, ProviderEmbedder};
use super::managed::ManagedIndexBackend;
use super::sqlite::LocalIndexBackend;
use crate::core::config::{AppPaths, EmbedderKind, RetrievalConfig, EMBEDDING_DIMENSION};
use crate::core::errors::NavigatorError;
use crate::llm::LlmService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub total_documents: usize,
    pub backend_mode: BackendMode,
    pub embedding_dimension: usize,
    pub index_name: String,
}

pub struct RetrievalEngine {
    backend: Arc<dyn RetrievalBackend>,
    default_top_k: usize,
    embedding_dimension: usize,
}

impl RetrievalEngine {
    /// Wrap an already-initialized backend.
    pub fn with_backend(backend: Arc<dyn RetrievalBackend>, default_top_k: usize) -> Self {
        Self {
            backend,
            default_top_k: default_top_k.max(1),
            embedding_dimension: EMBEDDING_DIMENSION,
        }
    }

    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    pub async fn connect(
        config: &RetrievalConfig,
        paths: &AppPaths,
        llm: Option<&LlmService>,
    ) -> Result<Self, NavigatorError> {
        let primary = if config.managed.is_configured() {
            match ManagedIndexBackend::from_config(&config.managed) {
                Ok(backend) => Some(backend.with_embedding_dimension(config.embedding_dimension)),
                Err(err) => {
                    tracing::warn!("Managed index misconfigured, using local index: {}", err);
                    None
                }
            }
        } else {
            tracing::info!("Managed index not configured, using local index");
            None
        };

        let local = Self::build_local(config, paths, llm).await?;
        let engine = match primary {
            Some(primary) => Self::select(Arc::new(primary), local, config.top_k).await?,
            None => {
                local.initialize().await?;
                Self::with_backend(local, config.top_k)
            }
        };

        tracing::info!(
            "Retrieval backend: {:?} index '{}'",
            engine.mode(),
            engine.backend.index_name()
        );
        Ok(engine.with_embedding_dimension(config.embedding_dimension))
    }

    /// Try `primary`; if it fails to initialize, use `fallback` for the
    /// lifetime of the engine.
    pub async fn select(
        primary: Arc<dyn RetrievalBackend>,
        fallback: Arc<dyn RetrievalBackend>,
        default_top_k: usize,
    ) -> Result<Self, NavigatorError> {
        match primary.initialize().await {
            Ok(()) => Ok(Self::with_backend(primary, default_top_k)),
            Err(err) => {
                tracing::warn!(
                    "Primary retrieval backend failed to initialize, switching to fallback: {}",
                    err
                );
                fallback.initialize().await?;
                Ok(Self::with_backend(fallback, default_top_k))
            }
        }
    }

    /// Open the local index without initializing it.
    async fn build_local(
        config: &RetrievalConfig,
        paths: &AppPaths,
        llm: Option<&LlmService>,
    ) -> Result<Arc<dyn RetrievalBackend>, NavigatorError> {
        let dimension = config.embedding_dimension;
        let embedder: Arc<dyn Embedder> = match (config.embedder, llm) {
            (EmbedderKind::Provider, Some(llm)) => Arc::new(ProviderEmbedder::new(
                llm.clone(),
                config.embedding_model.clone(),
                dimension,
            )),
            (EmbedderKind::Provider, None) => {
                tracing::warn!("Provider embedder requested without an LLM endpoint, using hashing embedder");
                Arc::new(HashingEmbedder::new(dimension))
            }
            (EmbedderKind::Hashing, _) => Arc::new(HashingEmbedder::new(dimension)),
        };

        let db_path = config
            .local_index_path
            .clone()
            .unwrap_or_else(|| paths.index_path.clone());
        let backend =
            LocalIndexBackend::with_path(db_path, config.managed.index_name.clone(), embedder)
                .await?;
        tracing::debug!("Opened local index at {}", backend.db_path().display());
        Ok(Arc::new(backend))
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> RetrievalResult {
        if top_k == 0 || query.trim().is_empty() {
            return RetrievalResult::empty();
        }
        match self.backend.search(query, top_k, filter).await {
            Ok(hits) => {
                let result = RetrievalResult::from_hits(hits, top_k);
                tracing::debug!("Retrieved {} documents", result.len());
                result
            }
            Err(err) => {
                tracing::warn!("Search failed, returning no documents: {}", err);
                RetrievalResult::empty()
            }
        }
    }

    pub async fn add_document(&self, document: &Document) -> bool {
        if document.id.trim().is_empty() || document.content.trim().is_empty() {
            tracing::warn!("Refusing to index a document without id or content");
            return false;
        }
        match self.backend.upsert(document).await {
            Ok(()) => {
                tracing::debug!("Indexed document {}", document.id);
                true
            }
            Err(err) => {
                tracing::warn!("Failed to index document {}: {}", document.id, err);
                false
            }
        }
    }

    pub async fn add_documents_batch(&self, documents: &[Document]) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for document in documents {
            if self.add_document(document).await {
                counts.succeeded += 1;
            } else {
                counts.failed += 1;
            }
        }
        tracing::info!(
            "Batch indexed {} documents ({} failed)",
            counts.succeeded,
            counts.failed
        );
        counts
    }

    pub async fn delete_document(&self, id: &str) -> bool {
        match self.backend.delete(id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!("Failed to delete document {}: {}", id, err);
                false
            }
        }
    }

    pub async fn get_document(&self, id: &str) -> Option<Document> {
        match self.backend.get(id).await {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!("Failed to fetch document {}: {}", id, err);
                None
            }
        }
    }

    pub async fn search_by_metadata(&self, filter: &MetadataFilter, limit: usize) -> Vec<Document> {
        if limit == 0 {
            return Vec::new();
        }
        match self.backend.search_by_metadata(filter, limit).await {
            Ok(documents) => documents,
            Err(err) => {
                tracing::warn!("Metadata search failed: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn get_stats(&self) -> RetrievalStats {
        let total_documents = match self.backend.count().await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!("Failed to count documents: {}", err);
                0
            }
        };
        RetrievalStats {
            total_documents,
            backend_mode: self.backend.mode(),
            embedding_dimension: self.embedding_dimension,
            index_name: self.backend.index_name().to_string(),
        }
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::*;
    use super::*;
    use crate::llm::service::testing::scripted_service;
    use crate::testing::StubServer;

    #[tokio::test]
    async fn failed_primary_switches_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalIndexBackend::with_path(
            dir.path().join("index.db"),
            "policy_documents",
            Arc::new(HashingEmbedder::new(EMBEDDING_DIMENSION)),
        )
        .await
        .unwrap();

        let engine = RetrievalEngine::select(Arc::new(BrokenBackend), Arc::new(local), 5)
            .await
            .unwrap();

        assert_eq!(engine.mode(), BackendMode::Fallback);
        assert!(engine.add_document(&Document::new("d1", "carbon emissions rule")).await);
        assert_eq!(engine.get_stats().await.total_documents, 1);
    }

    #[tokio::test]
    async fn backend_errors_become_soft_failures() {
        let engine = RetrievalEngine::with_backend(Arc::new(BrokenBackend), 5);

        assert!(engine.search("anything", 5, None).await.is_empty());
        assert!(!engine.add_document(&Document::new("d1", "text")).await);
        assert!(!engine.delete_document("d1").await);
        assert!(engine.get_document("d1").await.is_none());
        assert!(engine
            .search_by_metadata(&MetadataFilter::new(), 5)
            .await
            .is_empty());

        let stats = engine.get_stats().await;
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.backend_mode, BackendMode::Primary);
    }

    #[tokio::test]
    async fn batch_reports_partial_success() {
        let dir = tempfile::tempdir().unwrap();
        let engine = local_engine(&dir).await;

        let counts = engine
            .add_documents_batch(&[
                Document::new("a", "clean water act"),
                Document::new("", "missing id"),
                Document::new("b", "   "),
                Document::new("c", "endangered species act"),
            ])
            .await;

        assert_eq!(counts, BatchCounts { succeeded: 2, failed: 2 });
        assert_eq!(engine.get_stats().await.total_documents, 2);
    }

    #[tokio::test]
    async fn search_is_sorted_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let engine = local_engine(&dir).await;
        for (id, text) in [
            ("a", "carbon emissions rule for power plants"),
            ("b", "carbon pricing study"),
            ("c", "emissions reporting"),
            ("d", "school lunch nutrition standards"),
        ] {
            assert!(engine.add_document(&Document::new(id, text)).await);
        }

        for top_k in 1..=5 {
            let result = engine.search("carbon emissions", top_k, None).await;
            assert!(result.len() <= top_k);
            assert!(result
                .hits()
                .windows(2)
                .all(|pair| pair[0].score >= pair[1].score));
            assert!(result.iter().all(|hit| (0.0..=1.0).contains(&hit.score)));
        }
        assert!(engine.search("carbon", 0, None).await.is_empty());
    }

    #[tokio::test]
    async fn connect_without_managed_config_uses_local_index() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(dir.path().to_path_buf(), dir.path().join("data"));

        let engine = RetrievalEngine::connect(&RetrievalConfig::default(), &paths, None)
            .await
            .unwrap();

        assert_eq!(engine.mode(), BackendMode::Fallback);
        assert!(paths.index_path.exists());
    }

    #[tokio::test]
    async fn connect_with_unreachable_service_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(dir.path().to_path_buf(), dir.path().join("data"));
        let mut config = RetrievalConfig::default();
        config.managed.base_url = Some("http://127.0.0.1:9".to_string());
        config.managed.api_key = Some("key".to_string());
        config.managed.timeout_secs = 1;

        let engine = RetrievalEngine::connect(&config, &paths, None).await.unwrap();
        assert_eq!(engine.mode(), BackendMode::Fallback);
        assert_eq!(engine.get_stats().await.index_name, "policy_documents");
    }

    #[tokio::test]
    async fn connect_with_reachable_service_uses_managed_index() {
        let server = StubServer::builder()
            .route("GET", "/indexes/policy_documents", 200, json!({ "name": "policy_documents" }))
            .route("GET", "/indexes/policy_documents/stats", 200, json!({ "count": 3 }))
            .spawn()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(dir.path().to_path_buf(), dir.path().join("data"));
        let mut config = RetrievalConfig::default();
        config.managed.base_url = Some(server.base_url().to_string());
        config.managed.api_key = Some("key".to_string());
        config.managed.timeout_secs = 5;

        let engine = RetrievalEngine::connect(&config, &paths, None).await.unwrap();

        assert_eq!(engine.mode(), BackendMode::Primary);
        let stats = engine.get_stats().await;
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.embedding_dimension, config.embedding_dimension);
    }

    #[tokio::test]
    async fn connect_survives_an_unreachable_embeddings_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(dir.path().to_path_buf(), dir.path().join("data"));
        {
            let engine = RetrievalEngine::connect(&RetrievalConfig::default(), &paths, None)
                .await
                .unwrap();
            assert!(engine.add_document(&Document::new("d1", "gdpr erasure")).await);
        }

        let config = RetrievalConfig {
            embedder: EmbedderKind::Provider,
            ..RetrievalConfig::default()
        };
        let llm = scripted_service(Vec::new());
        let engine = RetrievalEngine::connect(&config, &paths, Some(&llm)).await.unwrap();

        assert_eq!(engine.mode(), BackendMode::Fallback);
        assert!(engine.search("gdpr erasure", 5, None).await.is_empty());
        assert_eq!(engine.get_document("d1").await.unwrap().content, "gdpr erasure");
        assert_eq!(engine.get_stats().await.total_documents, 1);
    }
}
