//! Tier 1: an agent that consults the data sources on our behalf and
//! answers in JSON.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::backend::LookupBackend;
use super::types::{
    CaseRecord, LookupPayload, LookupRequest, PolicyStatus, Provenance, RegisterDocument,
    StatusKind,
};
use crate::core::errors::NavigatorError;
use crate::llm::LlmService;

const AGENT_SOURCE: &str = "Policy Agent";

const AGENT_INSTRUCTIONS: &str = "You are a regulatory research agent with access to the \
Federal Register and CourtListener. Answer with a single JSON object and nothing else.";

/// `run(prompt) -> text` capability of an orchestrating agent.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<String, NavigatorError>;
}

/// Agent backed by the configured chat model.
pub struct LlmAgentRunner {
    llm: LlmService,
}

impl LlmAgentRunner {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AgentRunner for LlmAgentRunner {
    async fn run(&self, prompt: &str) -> Result<String, NavigatorError> {
        self.llm.generate(AGENT_INSTRUCTIONS, prompt).await
    }
}

#[derive(Debug, Deserialize)]
struct AgentStatus {
    status: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    document_number: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default, rename = "type")]
    doc_type: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentCase {
    name: String,
    #[serde(default)]
    court: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    citation: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date_filed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentCases {
    cases: Vec<AgentCase>,
}

#[derive(Debug, Deserialize)]
struct AgentDocument {
    title: String,
    #[serde(default, rename = "type")]
    doc_type: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    document_number: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentDocuments {
    documents: Vec<AgentDocument>,
}

pub struct AgentLookup {
    runner: Arc<dyn AgentRunner>,
}

impl AgentLookup {
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self { runner }
    }

    fn prompt(request: &LookupRequest) -> String {
        match request {
            LookupRequest::PolicyStatus { identifier } => format!(
                "Find the current status of the policy \"{}\" in the Federal Register. \
                 Reply as {{\"status\": \"ACTIVE\" | \"NOT_FOUND\", \"title\", \"document_number\", \
                 \"publication_date\", \"type\", \"abstract\", \"html_url\", \"pdf_url\"}}.",
                identifier
            ),
            LookupRequest::Cases { term, limit } => format!(
                "Find up to {} court opinions related to \"{}\" on CourtListener. \
                 Reply as {{\"cases\": [{{\"name\", \"court\", \"year\", \"citation\", \"summary\", \
                 \"url\", \"date_filed\"}}]}}.",
                limit, term
            ),
            LookupRequest::RecentDocuments {
                doc_type,
                window_days,
            } => format!(
                "List Federal Register documents{} published in the last {} days. \
                 Reply as {{\"documents\": [{{\"title\", \"type\", \"abstract\", \
                 \"publication_date\", \"document_number\", \"html_url\"}}]}}.",
                doc_type
                    .as_deref()
                    .map(|t| format!(" of type {}", t))
                    .unwrap_or_default(),
                window_days
            ),
        }
    }
}

/// Parse the outermost JSON object in an agent reply, tolerating prose or
/// code fences around it.
fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, NavigatorError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(NavigatorError::Upstream(
            "agent reply contained no JSON object".to_string(),
        ));
    };
    if end < start {
        return Err(NavigatorError::Upstream(
            "agent reply contained no JSON object".to_string(),
        ));
    }
    serde_json::from_str(&reply[start..=end])
        .map_err(|e| NavigatorError::Upstream(format!("malformed agent reply: {}", e)))
}

fn status_kind(raw: &str) -> Result<StatusKind, NavigatorError> {
    match raw.trim().to_uppercase().replace(' ', "_").as_str() {
        "ACTIVE" => Ok(StatusKind::Active),
        "NOT_FOUND" => Ok(StatusKind::NotFound),
        other => Err(NavigatorError::Upstream(format!(
            "agent returned unknown status '{}'",
            other
        ))),
    }
}

#[async_trait]
impl LookupBackend for AgentLookup {
    fn name(&self) -> &str {
        "agent"
    }

    fn provenance(&self) -> Provenance {
        Provenance::Orchestrated
    }

    fn source_name(&self, _request: &LookupRequest) -> String {
        AGENT_SOURCE.to_string()
    }

    async fn fetch(&self, request: &LookupRequest) -> Result<LookupPayload, NavigatorError> {
        let reply = self.runner.run(&Self::prompt(request)).await?;
        tracing::debug!("Agent reply: {}", reply);

        match request {
            LookupRequest::PolicyStatus { identifier } => {
                let parsed: AgentStatus = parse_reply(&reply)?;
                let mut status =
                    PolicyStatus::bare(identifier, status_kind(&parsed.status)?, AGENT_SOURCE);
                status.title = parsed.title;
                status.document_number = parsed.document_number;
                status.publication_date = parsed.publication_date;
                status.doc_type = parsed.doc_type;
                status.abstract_text = parsed.abstract_text;
                status.html_url = parsed.html_url;
                status.pdf_url = parsed.pdf_url;
                Ok(LookupPayload::PolicyStatus(status))
            }
            LookupRequest::Cases { limit, .. } => {
                let parsed: AgentCases = parse_reply(&reply)?;
                let cases = parsed
                    .cases
                    .into_iter()
                    .filter(|case| !case.name.trim().is_empty())
                    .take(*limit)
                    .map(|case| CaseRecord {
                        name: case.name,
                        court: case.court.unwrap_or_else(|| "Unknown court".to_string()),
                        year: case.year,
                        citation: case.citation,
                        summary: case
                            .summary
                            .unwrap_or_else(|| "No summary available".to_string()),
                        url: case.url,
                        date_filed: case.date_filed,
                        source: AGENT_SOURCE.to_string(),
                    })
                    .collect();
                Ok(LookupPayload::Cases(cases))
            }
            LookupRequest::RecentDocuments { .. } => {
                let parsed: AgentDocuments = parse_reply(&reply)?;
                let documents = parsed
                    .documents
                    .into_iter()
                    .map(|doc| RegisterDocument {
                        title: doc.title,
                        doc_type: doc.doc_type,
                        abstract_text: doc.abstract_text,
                        publication_date: doc.publication_date,
                        document_number: doc.document_number,
                        html_url: doc.html_url,
                    })
                    .collect();
                Ok(LookupPayload::Documents(documents))
            }
        }
    }
}
