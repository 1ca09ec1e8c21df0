//! Direct per-source HTTP clients: Federal Register and CourtListener.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::backend::LookupBackend;
use super::types::{
    CaseRecord, LookupPayload, LookupRequest, PolicyStatus, Provenance, RegisterDocument,
    StatusKind,
};
use crate::core::config::LookupConfig;
use crate::core::errors::NavigatorError;

pub const FEDERAL_REGISTER_BASE: &str = "https://www.federalregister.gov/api/v1";
pub const COURTLISTENER_BASE: &str = "https://www.courtlistener.com/api/rest/v3";
const COURTLISTENER_SITE: &str = "https://www.courtlistener.com";
const FEDERAL_REGISTER_SOURCE: &str = "Federal Register API";
const COURTLISTENER_SOURCE: &str = "CourtListener API";

static EO_NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d{5})").ok());

/// Five-digit executive-order numbers are searched as `executive order NNNNN`.
pub fn policy_search_term(identifier: &str) -> String {
    EO_NUMBER
        .as_ref()
        .and_then(|re| re.captures(identifier))
        .and_then(|caps| caps.get(1))
        .map(|number| format!("executive order {}", number.as_str()))
        .unwrap_or_else(|| identifier.trim().to_string())
}

fn create_limiter(requests_per_minute: u32) -> Arc<DefaultDirectRateLimiter> {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    results: Vec<RegisterEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterEntry {
    title: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    document_number: Option<String>,
    publication_date: Option<String>,
    html_url: Option<String>,
    pdf_url: Option<String>,
}

impl RegisterEntry {
    fn into_document(self) -> RegisterDocument {
        RegisterDocument {
            title: non_empty(self.title).unwrap_or_else(|| "Untitled document".to_string()),
            doc_type: non_empty(self.doc_type),
            abstract_text: non_empty(self.abstract_text),
            publication_date: non_empty(self.publication_date),
            document_number: non_empty(self.document_number),
            html_url: non_empty(self.html_url),
        }
    }
}

pub struct FederalRegisterClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl FederalRegisterClient {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self, NavigatorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NavigatorError::internal)?;
        Ok(Self {
            base_url: non_empty(base_url)
                .unwrap_or_else(|| FEDERAL_REGISTER_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: non_empty(api_key),
            client,
            limiter: create_limiter(requests_per_minute),
        })
    }

    fn documents_url(&self, params: &[(&str, String)]) -> String {
        let mut query: Vec<String> = params
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect();
        if let Some(key) = &self.api_key {
            query.push(format!("api_key={}", urlencoding::encode(key)));
        }
        format!("{}/documents.json?{}", self.base_url, query.join("&"))
    }

    async fn fetch_documents(
        &self,
        params: &[(&str, String)],
    ) -> Result<Vec<RegisterEntry>, NavigatorError> {
        if self.limiter.check().is_err() {
            return Err(NavigatorError::Unavailable(
                "Federal Register request quota exhausted".to_string(),
            ));
        }

        let response = self
            .client
            .get(self.documents_url(params))
            .send()
            .await
            .map_err(NavigatorError::upstream)?;

        if !response.status().is_success() {
            return Err(NavigatorError::Upstream(format!(
                "Federal Register returned {}",
                response.status()
            )));
        }

        let payload: RegisterResponse = response.json().await.map_err(NavigatorError::upstream)?;
        Ok(payload.results)
    }

    pub async fn policy_status(&self, identifier: &str) -> Result<PolicyStatus, NavigatorError> {
        let term = policy_search_term(identifier);
        let results = self
            .fetch_documents(&[
                ("conditions[term]", term),
                ("per_page", "5".to_string()),
                ("order", "newest".to_string()),
            ])
            .await?;

        let Some(latest) = results.into_iter().next() else {
            let mut status =
                PolicyStatus::bare(identifier, StatusKind::NotFound, FEDERAL_REGISTER_SOURCE);
            status.message = Some(format!("No results found for {}", identifier));
            return Ok(status);
        };

        let mut status = PolicyStatus::bare(identifier, StatusKind::Active, FEDERAL_REGISTER_SOURCE);
        status.title = non_empty(latest.title);
        status.document_number = non_empty(latest.document_number);
        status.publication_date = non_empty(latest.publication_date);
        status.doc_type = non_empty(latest.doc_type);
        status.abstract_text = non_empty(latest.abstract_text);
        status.html_url = non_empty(latest.html_url);
        status.pdf_url = non_empty(latest.pdf_url);
        Ok(status)
    }

    pub async fn recent_documents(
        &self,
        doc_type: Option<&str>,
        window_days: u32,
    ) -> Result<Vec<RegisterDocument>, NavigatorError> {
        let since = Utc::now().date_naive() - chrono::Duration::days(i64::from(window_days));
        let mut params = vec![
            ("per_page", "20".to_string()),
            ("order", "newest".to_string()),
            (
                "conditions[publication_date][gte]",
                since.format("%Y-%m-%d").to_string(),
            ),
        ];
        if let Some(doc_type) = doc_type.map(str::trim).filter(|t| !t.is_empty()) {
            params.push(("conditions[type][]", doc_type.to_uppercase()));
        }

        let results = self.fetch_documents(&params).await?;
        Ok(results.into_iter().map(RegisterEntry::into_document).collect())
    }
}

#[derive(Debug, Default, Deserialize)]
struct CaseSearchResponse {
    #[serde(default)]
    results: Vec<CaseEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CaseEntry {
    #[serde(rename = "caseName")]
    case_name: Option<String>,
    court: Option<String>,
    #[serde(rename = "dateFiled")]
    date_filed: Option<String>,
    citation: Option<Value>,
    snippet: Option<String>,
    absolute_url: Option<String>,
}

impl CaseEntry {
    fn into_record(self) -> CaseRecord {
        let date_filed = non_empty(self.date_filed);
        let year = date_filed
            .as_deref()
            .and_then(|date| date.get(..4))
            .map(str::to_string);
        let citation = match self.citation {
            Some(Value::Array(items)) => items
                .into_iter()
                .find_map(|item| item.as_str().map(str::to_string)),
            Some(Value::String(text)) => Some(text),
            _ => None,
        };
        let url = non_empty(self.absolute_url).map(|path| {
            if path.starts_with("http") {
                path
            } else {
                format!("{}{}", COURTLISTENER_SITE, path)
            }
        });

        CaseRecord {
            name: non_empty(self.case_name).unwrap_or_else(|| "Unknown Case".to_string()),
            court: non_empty(self.court).unwrap_or_else(|| "Unknown court".to_string()),
            year,
            citation: non_empty(citation),
            summary: non_empty(self.snippet).unwrap_or_else(|| "No summary available".to_string()),
            url,
            date_filed,
            source: COURTLISTENER_SOURCE.to_string(),
        }
    }
}

pub struct CourtListenerClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl CourtListenerClient {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self, NavigatorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NavigatorError::internal)?;
        Ok(Self {
            base_url: non_empty(base_url)
                .unwrap_or_else(|| COURTLISTENER_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: non_empty(api_key),
            client,
            limiter: create_limiter(requests_per_minute),
        })
    }

    fn search_url(&self, term: &str, limit: usize) -> String {
        format!(
            "{}/search/?q={}&type=o&order_by={}&page_size={}",
            self.base_url,
            urlencoding::encode(term),
            urlencoding::encode("score desc"),
            limit
        )
    }

    pub async fn search_cases(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<CaseRecord>, NavigatorError> {
        if self.limiter.check().is_err() {
            return Err(NavigatorError::Unavailable(
                "CourtListener request quota exhausted".to_string(),
            ));
        }

        let mut request = self.client.get(self.search_url(term, limit));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Token {}", key));
        }

        let response = request.send().await.map_err(NavigatorError::upstream)?;
        if !response.status().is_success() {
            return Err(NavigatorError::Upstream(format!(
                "CourtListener returned {}",
                response.status()
            )));
        }

        let payload: CaseSearchResponse =
            response.json().await.map_err(NavigatorError::upstream)?;
        Ok(payload
            .results
            .into_iter()
            .take(limit)
            .map(CaseEntry::into_record)
            .collect())
    }
}

/// Tier 2: call each data source directly.
pub struct DirectLookup {
    federal_register: FederalRegisterClient,
    courtlistener: CourtListenerClient,
}

impl DirectLookup {
    pub fn new(federal_register: FederalRegisterClient, courtlistener: CourtListenerClient) -> Self {
        Self {
            federal_register,
            courtlistener,
        }
    }

    pub fn from_config(config: &LookupConfig) -> Result<Self, NavigatorError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self::new(
            FederalRegisterClient::new(
                config.federal_register.base_url.clone(),
                config.federal_register.api_key.clone(),
                timeout,
                config.requests_per_minute,
            )?,
            CourtListenerClient::new(
                config.courtlistener.base_url.clone(),
                config.courtlistener.api_key.clone(),
                timeout,
                config.requests_per_minute,
            )?,
        ))
    }
}

#[async_trait]
impl LookupBackend for DirectLookup {
    fn name(&self) -> &str {
        "direct"
    }

    fn provenance(&self) -> Provenance {
        Provenance::Direct
    }

    fn source_name(&self, request: &LookupRequest) -> String {
        match request {
            LookupRequest::Cases { .. } => COURTLISTENER_SOURCE.to_string(),
            _ => FEDERAL_REGISTER_SOURCE.to_string(),
        }
    }

    async fn fetch(&self, request: &LookupRequest) -> Result<LookupPayload, NavigatorError> {
        match request {
            LookupRequest::PolicyStatus { identifier } => self
                .federal_register
                .policy_status(identifier)
                .await
                .map(LookupPayload::PolicyStatus),
            LookupRequest::Cases { term, limit } => self
                .courtlistener
                .search_cases(term, *limit)
                .await
                .map(LookupPayload::Cases),
            LookupRequest::RecentDocuments {
                doc_type,
                window_days,
            } => self
                .federal_register
                .recent_documents(doc_type.as_deref(), *window_days)
                .await
                .map(LookupPayload::Documents),
        }
    }
}
