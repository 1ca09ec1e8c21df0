//! Client for the managed indexing service.
//!
//! The service embeds documents server-side (cosine) and exposes
//! create / search / add-records / get-by-id / delete over JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::{BackendMode, RetrievalBackend};
use super::document::{Document, MetadataFilter, ScoredDocument};
use crate::core::config::settings::ManagedIndexConfig;
use crate::core::config::EMBEDDING_DIMENSION;
use crate::core::errors::NavigatorError;

pub struct ManagedIndexBackend {
    base_url: String,
    api_key: String,
    index_name: String,
    embedding_dimension: usize,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RecordPayload {
    id: String,
    #[serde(default, alias = "value", alias = "data")]
    content: String,
    #[serde(default, alias = "attributes")]
    metadata: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    score: Option<f32>,
}

impl RecordPayload {
    fn into_document(self) -> Document {
        Document {
            id: self.id,
            content: self.content,
            metadata: self
                .metadata
                .map(|map| map.into_iter().collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default, alias = "details", alias = "records")]
    results: Vec<RecordPayload>,
}

impl ManagedIndexBackend {
    pub fn from_config(config: &ManagedIndexConfig) -> Result<Self, NavigatorError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                NavigatorError::Config("managed index service URL is not set".to_string())
            })?;
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                NavigatorError::Config("managed index service API key is not set".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(NavigatorError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            index_name: config.index_name.clone(),
            embedding_dimension: EMBEDDING_DIMENSION,
            client,
        })
    }

    /// Dimension requested when the index has to be created.
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    fn index_url(&self) -> String {
        format!(
            "{}/indexes/{}",
            self.base_url,
            urlencoding::encode(&self.index_name)
        )
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/records/{}", self.index_url(), urlencoding::encode(id))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("x-api-key", &self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, NavigatorError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(NavigatorError::upstream)?;
        Ok(response)
    }

    async fn expect_success(
        response: reqwest::Response,
        action: &str,
    ) -> Result<reqwest::Response, NavigatorError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(NavigatorError::Upstream(format!(
            "index service {} failed ({}): {}",
            action, status, text
        )))
    }

    async fn create_index(&self) -> Result<(), NavigatorError> {
        let body = json!({
            "name": self.index_name,
            "embedding_dimension": self.embedding_dimension,
            "metric": "cosine",
        });
        let url = format!("{}/indexes", self.base_url);
        let response = self.send(self.client.post(&url).json(&body)).await?;
        Self::expect_success(response, "create").await?;
        tracing::info!("Created managed index '{}'", self.index_name);
        Ok(())
    }
}

#[async_trait]
impl RetrievalBackend for ManagedIndexBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Primary
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn initialize(&self) -> Result<(), NavigatorError> {
        let response = self.send(self.client.get(self.index_url())).await?;
        match response.status() {
            StatusCode::NOT_FOUND => self.create_index().await,
            _ => Self::expect_success(response, "lookup").await.map(|_| ()),
        }
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>, NavigatorError> {
        let mut body = json!({ "query": query, "top_k": top_k });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filters"] = json!(filter);
        }
        let url = format!("{}/search", self.index_url());
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let response = Self::expect_success(response, "search").await?;
        let payload: RecordsResponse = response.json().await.map_err(NavigatorError::upstream)?;

        let mut hits: Vec<ScoredDocument> = payload
            .results
            .into_iter()
            .map(|record| {
                let score = record.score.unwrap_or(0.0);
                ScoredDocument {
                    document: record.into_document(),
                    score,
                }
            })
            .filter(|hit| filter.map_or(true, |f| hit.document.matches(f)))
            .collect();

        // server ordering is not guaranteed
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn upsert(&self, document: &Document) -> Result<(), NavigatorError> {
        let body = json!({
            "records": [{
                "id": document.id,
                "value": document.content,
                "attributes": document.metadata,
            }],
            "upsert": true,
        });
        let url = format!("{}/records", self.index_url());
        let response = self.send(self.client.post(&url).json(&body)).await?;
        Self::expect_success(response, "add").await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, NavigatorError> {
        let response = self.send(self.client.delete(self.record_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response, "delete").await?;
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, NavigatorError> {
        let response = self.send(self.client.get(self.record_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success(response, "get").await?;
        let record: RecordPayload = response.json().await.map_err(NavigatorError::upstream)?;
        Ok(Some(record.into_document()))
    }

    async fn search_by_metadata(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<Document>, NavigatorError> {
        let body = json!({ "filters": filter, "limit": limit });
        let url = format!("{}/records/query", self.index_url());
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let response = Self::expect_success(response, "query").await?;
        let payload: RecordsResponse = response.json().await.map_err(NavigatorError::upstream)?;

        Ok(payload
            .results
            .into_iter()
            .map(RecordPayload::into_document)
            .filter(|doc| doc.matches(filter))
            .take(limit)
            .collect())
    }

    async fn count(&self) -> Result<usize, NavigatorError> {
        let url = format!("{}/stats", self.index_url());
        let response = self.send(self.client.get(&url)).await?;
        let response = Self::expect_success(response, "stats").await?;
        let payload: Value = response.json().await.map_err(NavigatorError::upstream)?;
        payload["document_count"]
            .as_u64()
            .or_else(|| payload["count"].as_u64())
            .map(|count| count as usize)
            .ok_or_else(|| NavigatorError::Upstream("stats response missing count".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubServer;

    fn stub_backend(server: &StubServer) -> ManagedIndexBackend {
        ManagedIndexBackend::from_config(&ManagedIndexConfig {
            base_url: Some(server.base_url().to_string()),
            api_key: Some("idx-key".to_string()),
            index_name: "policy_documents".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn config(url: Option<&str>, key: Option<&str>) -> ManagedIndexConfig {
        ManagedIndexConfig {
            base_url: url.map(str::to_string),
            api_key: key.map(str::to_string),
            index_name: "policy documents".to_string(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        assert!(matches!(
            ManagedIndexBackend::from_config(&config(None, Some("k"))),
            Err(NavigatorError::Config(_))
        ));
        assert!(matches!(
            ManagedIndexBackend::from_config(&config(Some("http://x"), Some(" "))),
            Err(NavigatorError::Config(_))
        ));
    }

    #[test]
    fn urls_escape_index_and_record_ids() {
        let backend =
            ManagedIndexBackend::from_config(&config(Some("https://idx.example/"), Some("k")))
                .unwrap();
        assert_eq!(backend.index_url(), "https://idx.example/indexes/policy%20documents");
        assert_eq!(
            backend.record_url("eo/14008"),
            "https://idx.example/indexes/policy%20documents/records/eo%2F14008"
        );
    }

    #[test]
    fn record_payload_accepts_service_field_names() {
        let payload: RecordsResponse = serde_json::from_value(json!({
            "details": [
                { "id": "a", "data": "text a", "score": 0.4 },
                { "id": "b", "value": "text b", "attributes": { "title": "B" }, "score": 0.9 }
            ]
        }))
        .unwrap();
        let docs: Vec<Document> = payload
            .results
            .into_iter()
            .map(RecordPayload::into_document)
            .collect();
        assert_eq!(docs[0].content, "text a");
        assert_eq!(docs[1].title(), "B");
    }

    #[tokio::test]
    async fn unreachable_service_fails_initialization() {
        let backend =
            ManagedIndexBackend::from_config(&config(Some("http://127.0.0.1:9"), Some("k")))
                .unwrap();
        assert!(matches!(
            backend.initialize().await,
            Err(NavigatorError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn missing_index_is_created_with_configured_dimension() {
        let server = StubServer::builder()
            .route("POST", "/indexes", 201, json!({ "name": "policy_documents" }))
            .spawn()
            .await;
        let backend = stub_backend(&server).with_embedding_dimension(384);

        backend.initialize().await.unwrap();

        let create = server.last_request("POST", "/indexes");
        assert_eq!(create.header("x-api-key"), Some("idx-key"));
        let body = create.json();
        assert_eq!(body["name"], "policy_documents");
        assert_eq!(body["embedding_dimension"], 384);
        assert_eq!(body["metric"], "cosine");
    }

    #[tokio::test]
    async fn search_reorders_and_rechecks_filters() {
        let server = StubServer::builder()
            .route(
                "POST",
                "/indexes/policy_documents/search",
                200,
                json!({
                    "results": [
                        { "id": "a", "data": "clean air permits", "attributes": { "agency": "EPA" }, "score": 0.2 },
                        { "id": "b", "value": "clean air standards", "attributes": { "agency": "EPA" }, "score": 0.9 },
                        { "id": "c", "content": "clean air transport", "metadata": { "agency": "DOT" }, "score": 0.95 }
                    ]
                }),
            )
            .spawn()
            .await;
        let backend = stub_backend(&server);

        let mut filter = MetadataFilter::new();
        filter.insert("agency".to_string(), json!("EPA"));
        let hits = backend.search("clean air", 5, Some(&filter)).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|hit| hit.document.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(hits[1].document.content, "clean air permits");

        let body = server
            .last_request("POST", "/indexes/policy_documents/search")
            .json();
        assert_eq!(body["query"], "clean air");
        assert_eq!(body["top_k"], 5);
        assert_eq!(body["filters"]["agency"], "EPA");

        let hits = backend.search("clean air", 2, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|hit| hit.document.id.as_str()).collect();
        assert_eq!(ids, ["c", "b"]);
    }

    #[tokio::test]
    async fn record_calls_map_service_responses() {
        let server = StubServer::builder()
            .route("POST", "/indexes/policy_documents/records", 200, json!({ "upserted": 1 }))
            .route(
                "GET",
                "/indexes/policy_documents/records/eo-14008",
                200,
                json!({
                    "id": "eo-14008",
                    "value": "Tackling the climate crisis",
                    "attributes": { "title": "EO 14008" }
                }),
            )
            .route("DELETE", "/indexes/policy_documents/records/eo-14008", 200, json!({}))
            .route(
                "POST",
                "/indexes/policy_documents/records/query",
                200,
                json!({
                    "records": [
                        { "id": "x", "value": "one", "attributes": { "agency": "EPA" } },
                        { "id": "y", "value": "two", "attributes": { "agency": "DOT" } }
                    ]
                }),
            )
            .route("GET", "/indexes/policy_documents/stats", 200, json!({ "document_count": 12 }))
            .spawn()
            .await;
        let backend = stub_backend(&server);

        backend
            .upsert(&Document::new("eo-14008", "Tackling the climate crisis").with_metadata("title", "EO 14008"))
            .await
            .unwrap();
        let body = server
            .last_request("POST", "/indexes/policy_documents/records")
            .json();
        assert_eq!(body["upsert"], true);
        assert_eq!(body["records"][0]["id"], "eo-14008");
        assert_eq!(body["records"][0]["value"], "Tackling the climate crisis");
        assert_eq!(body["records"][0]["attributes"]["title"], "EO 14008");

        let stored = backend.get("eo-14008").await.unwrap().unwrap();
        assert_eq!(stored.title(), "EO 14008");
        assert!(backend.get("missing").await.unwrap().is_none());

        assert!(backend.delete("eo-14008").await.unwrap());
        assert!(!backend.delete("missing").await.unwrap());

        let mut filter = MetadataFilter::new();
        filter.insert("agency".to_string(), json!("EPA"));
        let docs = backend.search_by_metadata(&filter, 10).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "x");

        assert_eq!(backend.count().await.unwrap(), 12);
        assert!(server
            .requests()
            .iter()
            .all(|req| req.header("x-api-key") == Some("idx-key")));
    }

    #[tokio::test]
    async fn service_errors_surface_as_upstream() {
        let server = StubServer::builder()
            .route("GET", "/indexes/policy_documents", 200, json!({ "name": "policy_documents" }))
            .route("GET", "/indexes/policy_documents/stats", 500, json!({ "error": "down" }))
            .spawn()
            .await;
        let backend = stub_backend(&server);

        backend.initialize().await.unwrap();
        assert!(matches!(backend.count().await, Err(NavigatorError::Upstream(_))));
        assert!(server
            .requests()
            .iter()
            .all(|req| req.path() != "/indexes"));
    }
}
