//! Local fallback index.
//!
//! Documents and their embeddings live in SQLite; search is a brute-force
//! cosine scan over every stored vector, which is plenty for the few
//! thousand policy documents a single installation holds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::backend::{BackendMode, RetrievalBackend};
use super::document::{Document, MetadataFilter, ScoredDocument};
use super::embedder::Embedder;
use crate::core::errors::NavigatorError;
use crate::vector_math::rank_descending_by_cosine;

pub struct LocalIndexBackend {
    pool: SqlitePool,
    db_path: PathBuf,
    index_name: String,
    embedder: Arc<dyn Embedder>,
}

impl LocalIndexBackend {
    pub async fn with_path(
        db_path: PathBuf,
        index_name: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, NavigatorError> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(NavigatorError::internal)?;

        let backend = Self {
            pool,
            db_path,
            index_name: index_name.into(),
            embedder,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), NavigatorError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(NavigatorError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(NavigatorError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, NavigatorError> {
        let metadata_str: String = row.try_get("metadata").map_err(NavigatorError::internal)?;
        let metadata = serde_json::from_str(&metadata_str).unwrap_or_default();

        Ok(Document {
            id: row.try_get("id").map_err(NavigatorError::internal)?,
            content: row.try_get("content").map_err(NavigatorError::internal)?,
            metadata,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, NavigatorError> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| NavigatorError::Internal("embedder returned no vector".to_string()))?;
        if vector.len() != self.embedder.dimension() {
            return Err(NavigatorError::Internal(format!(
                "embedding has {} dimensions, expected {}",
                vector.len(),
                self.embedder.dimension()
            )));
        }
        Ok(vector)
    }

    async fn stored_embedder(&self) -> Result<Option<String>, NavigatorError> {
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'embedder'")
            .fetch_optional(&self.pool)
            .await
            .map_err(NavigatorError::internal)
    }

    async fn record_embedder(&self) -> Result<(), NavigatorError> {
        let signature = self.embedder_signature();
        sqlx::query(
            "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
             VALUES ('embedder', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(&signature)
        .execute(&self.pool)
        .await
        .map_err(NavigatorError::internal)?;
        Ok(())
    }

    fn embedder_signature(&self) -> String {
        format!("{}:{}", self.embedder.name(), self.embedder.dimension())
    }

    /// Re-embed every stored document with the current embedder.
    pub async fn reindex(&self) -> Result<usize, NavigatorError> {
        let rows = sqlx::query("SELECT id, content, metadata FROM documents")
            .fetch_all(&self.pool)
            .await
            .map_err(NavigatorError::internal)?;

        let mut tx = self.pool.begin().await.map_err(NavigatorError::internal)?;
        let mut updated = 0;
        for row in &rows {
            let document = Self::row_to_document(row)?;
            let embedding = self.embed_one(&document.content).await?;
            sqlx::query("UPDATE documents SET embedding = ?1 WHERE id = ?2")
                .bind(Self::serialize_embedding(&embedding))
                .bind(&document.id)
                .execute(&mut *tx)
                .await
                .map_err(NavigatorError::internal)?;
            updated += 1;
        }
        tx.commit().await.map_err(NavigatorError::internal)?;

        self.record_embedder().await?;
        Ok(updated)
    }
}

#[async_trait]
impl RetrievalBackend for LocalIndexBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Fallback
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn initialize(&self) -> Result<(), NavigatorError> {
        let current = self.embedder_signature();
        match self.stored_embedder().await? {
            Some(stored) if stored == current => Ok(()),
            Some(stored) => {
                tracing::info!(
                    "Embedder changed ({} -> {}), re-embedding local index",
                    stored,
                    current
                );
                match self.reindex().await {
                    Ok(updated) => tracing::info!("Re-embedded {} documents", updated),
                    // stale rows stay; search skips vectors of the wrong length
                    Err(err) => tracing::warn!(
                        "Re-embedding failed, keeping previous vectors: {}",
                        err
                    ),
                }
                Ok(())
            }
            None => self.record_embedder().await,
        }
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>, NavigatorError> {
        let query_embedding = self.embed_one(query).await?;

        let rows = sqlx::query("SELECT id, content, metadata, embedding FROM documents")
            .fetch_all(&self.pool)
            .await
            .map_err(NavigatorError::internal)?;

        let mut documents = Vec::with_capacity(rows.len());
        let mut embeddings = Vec::with_capacity(rows.len());
        for row in &rows {
            let bytes: Option<Vec<u8>> =
                row.try_get("embedding").map_err(NavigatorError::internal)?;
            let Some(bytes) = bytes else {
                continue;
            };
            let embedding = Self::deserialize_embedding(&bytes);
            if embedding.len() != query_embedding.len() {
                continue;
            }
            let document = Self::row_to_document(row)?;
            if let Some(filter) = filter {
                if !document.matches(filter) {
                    continue;
                }
            }
            documents.push(document);
            embeddings.push(embedding);
        }

        let ranked = rank_descending_by_cosine(&query_embedding, &embeddings)?;
        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(idx, score)| ScoredDocument {
                document: documents[idx].clone(),
                score,
            })
            .collect())
    }

    async fn upsert(&self, document: &Document) -> Result<(), NavigatorError> {
        let embedding = self.embed_one(&document.content).await?;
        let metadata_str =
            serde_json::to_string(&document.metadata).map_err(NavigatorError::internal)?;

        sqlx::query(
            "INSERT OR REPLACE INTO documents (id, content, metadata, embedding, updated_at)
             VALUES (?1, ?2, ?3, ?4, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(&document.id)
        .bind(&document.content)
        .bind(&metadata_str)
        .bind(Self::serialize_embedding(&embedding))
        .execute(&self.pool)
        .await
        .map_err(NavigatorError::internal)?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, NavigatorError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(NavigatorError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, NavigatorError> {
        let row = sqlx::query("SELECT id, content, metadata FROM documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(NavigatorError::internal)?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn search_by_metadata(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<Document>, NavigatorError> {
        let rows = sqlx::query("SELECT id, content, metadata FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(NavigatorError::internal)?;

        let mut matches = Vec::new();
        for row in &rows {
            let document = Self::row_to_document(row)?;
            if document.matches(filter) {
                matches.push(document);
                if matches.len() >= limit {
                    break;
                }
            }
        }
        Ok(matches)
    }

    async fn count(&self) -> Result<usize, NavigatorError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(NavigatorError::internal)?;

        Ok(count as usize)
    }
}
