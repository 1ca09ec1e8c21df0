//! Final answer assembly with citations and a bounded confidence score.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::intent::QueryIntent;
use crate::core::config::{ConfidenceConfig, SynthesisConfig};
use crate::llm::LlmService;
use crate::lookup::{LookupPayload, LookupResult, Provenance};
use crate::rag::RetrievalResult;

const DOCUMENT_ORIGIN: &str = "Document Index";
const DISPLAY_SOURCE_LIMIT: usize = 5;
const TEMPLATE_DOC_LIMIT: usize = 3;

const SYNTHESIS_INSTRUCTIONS: &str = "You are a policy research assistant. Answer the question \
using only the supplied context. Mention the documents or data sources you rely on by name. \
If the context says live data was unavailable, say so.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub origin: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub intent: Option<QueryIntent>,
    pub retrieved_docs: usize,
    pub lookup_provenance: Option<Provenance>,
    pub used_llm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f64,
    pub metadata: ResponseMetadata,
}

impl SynthesizedResponse {
    pub fn with_intent(mut self, intent: QueryIntent) -> Self {
        self.metadata.intent = Some(intent);
        self
    }
}

/// Display-ready projection of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence_percent: u8,
    pub provenance: Option<Provenance>,
    pub used_llm: bool,
}

pub struct ResponseSynthesizer {
    llm: Option<LlmService>,
    config: SynthesisConfig,
}

impl ResponseSynthesizer {
    pub fn new(config: &SynthesisConfig, llm: Option<LlmService>) -> Self {
        Self {
            llm,
            config: config.clone(),
        }
    }

    pub async fn synthesize(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
        lookup: Option<&LookupResult>,
    ) -> SynthesizedResponse {
        let sources = collect_sources(retrieval, lookup, &self.config.confidence);
        let confidence = score_confidence(&sources, lookup, &self.config.confidence);

        let generated = match &self.llm {
            Some(llm) => self.generate(llm, query, retrieval, lookup).await,
            None => None,
        };
        let used_llm = generated.is_some();
        let answer = generated.unwrap_or_else(|| self.compose(query, retrieval, lookup));

        tracing::info!(
            "Synthesized answer from {} sources (confidence {:.2}, llm: {})",
            sources.len(),
            confidence,
            used_llm
        );

        SynthesizedResponse {
            query: query.to_string(),
            answer,
            sources,
            confidence,
            metadata: ResponseMetadata {
                timestamp: Utc::now(),
                intent: None,
                retrieved_docs: retrieval.len(),
                lookup_provenance: lookup.map(|result| result.provenance),
                used_llm,
            },
        }
    }

    async fn generate(
        &self,
        llm: &LlmService,
        query: &str,
        retrieval: &RetrievalResult,
        lookup: Option<&LookupResult>,
    ) -> Option<String> {
        let context = self.build_context(retrieval, lookup);
        let prompt = format!(
            "Question: {}\n\nContext:\n{}\n\nAnswer:",
            query, context
        );
        match llm.generate(SYNTHESIS_INSTRUCTIONS, &prompt).await {
            Ok(answer) if !answer.trim().is_empty() => Some(answer.trim().to_string()),
            Ok(_) => {
                tracing::warn!("Generation returned an empty answer, using template");
                None
            }
            Err(err) => {
                tracing::warn!("Generation failed, using template: {}", err);
                None
            }
        }
    }

    /// Bounded context block for the generation prompt.
    pub fn build_context(&self, retrieval: &RetrievalResult, lookup: Option<&LookupResult>) -> String {
        let mut parts = Vec::new();

        if !retrieval.is_empty() {
            parts.push("Retrieved documents:".to_string());
            for (index, hit) in retrieval.iter().take(self.config.top_n).enumerate() {
                parts.push(format!(
                    "Document {} ({}, from {}):\n{}",
                    index + 1,
                    hit.document.title(),
                    document_origin(hit),
                    truncate_chars(&hit.document.content, self.config.passage_chars)
                ));
            }
        }

        if let Some(lookup) = lookup.filter(|result| !result.payloads.is_empty()) {
            parts.push(format!(
                "Government and legal information ({} data):",
                lookup.provenance
            ));
            for (source, payload) in &lookup.payloads {
                parts.push(format!("[{}] {}", source, payload.summary()));
            }
        }

        if parts.is_empty() {
            return "No supporting context was found.".to_string();
        }
        truncate_chars(&parts.join("\n\n"), self.config.max_context_chars)
    }

    /// Deterministic template answer. Never empty.
    pub fn compose(&self, query: &str, retrieval: &RetrievalResult, lookup: Option<&LookupResult>) -> String {
        let mut parts = Vec::new();

        if !retrieval.is_empty() {
            parts.push(format!(
                "Found {} relevant document{} for \"{}\":",
                retrieval.len(),
                if retrieval.len() == 1 { "" } else { "s" },
                query
            ));
            for (index, hit) in retrieval.iter().take(TEMPLATE_DOC_LIMIT).enumerate() {
                parts.push(format!(
                    "{}. {}: {} (Source: {})",
                    index + 1,
                    hit.document.title(),
                    truncate_chars(&hit.document.content, self.config.snippet_chars),
                    document_origin(hit)
                ));
            }
        }

        if let Some(lookup) = lookup {
            for (source, payload) in &lookup.payloads {
                parts.push(format!("{} (Source: {})", payload.summary(), source));
            }
            if !lookup.provenance.is_live() && !lookup.payloads.is_empty() {
                parts.push(
                    "Note: live data sources were unavailable, so the details above are placeholder data."
                        .to_string(),
                );
            }
        }

        if parts.is_empty() {
            return format!(
                "No relevant documents or live data were found for \"{}\".",
                query
            );
        }
        parts.join("\n")
    }

    pub fn format_for_display(response: &SynthesizedResponse) -> DisplayResponse {
        DisplayResponse {
            query: response.query.clone(),
            answer: response.answer.clone(),
            sources: response
                .sources
                .iter()
                .take(DISPLAY_SOURCE_LIMIT)
                .cloned()
                .collect(),
            confidence_percent: (response.confidence.clamp(0.0, 1.0) * 100.0).round() as u8,
            provenance: response.metadata.lookup_provenance,
            used_llm: response.metadata.used_llm,
        }
    }
}

fn document_origin(hit: &crate::rag::ScoredDocument) -> String {
    hit.document
        .metadata
        .get("source")
        .and_then(|value| value.as_str())
        .unwrap_or(DOCUMENT_ORIGIN)
        .to_string()
}

/// Retrieved documents first, then lookup sources, stably sorted by
/// descending score so documents win ties.
fn collect_sources(
    retrieval: &RetrievalResult,
    lookup: Option<&LookupResult>,
    confidence: &ConfidenceConfig,
) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = retrieval
        .iter()
        .map(|hit| SourceRef {
            title: hit.document.title(),
            origin: document_origin(hit),
            score: f64::from(hit.score),
        })
        .collect();

    if let Some(lookup) = lookup {
        let score = if lookup.provenance.is_live() {
            1.0
        } else {
            confidence.placeholder_source_score
        };
        for (origin, payload) in &lookup.payloads {
            let titles: Vec<String> = match payload {
                LookupPayload::PolicyStatus(status) => {
                    vec![status.title.clone().unwrap_or_else(|| status.identifier.clone())]
                }
                LookupPayload::Cases(cases) => cases.iter().map(|case| case.name.clone()).collect(),
                LookupPayload::Documents(documents) => {
                    documents.iter().map(|doc| doc.title.clone()).collect()
                }
            };
            sources.extend(titles.into_iter().map(|title| SourceRef {
                title,
                origin: origin.clone(),
                score,
            }));
        }
    }

    sources.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    sources
}

pub fn score_confidence(
    sources: &[SourceRef],
    lookup: Option<&LookupResult>,
    config: &ConfidenceConfig,
) -> f64 {
    let Some(max_score) = sources
        .iter()
        .map(|source| source.score)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
    else {
        return config.no_source_confidence.clamp(0.0, 1.0);
    };

    let source_bonus = (sources.len() as f64 * config.per_source_bonus).min(config.max_source_bonus);
    let live_bonus = match lookup {
        Some(result) if result.is_live() && !result.is_empty() => config.live_lookup_bonus,
        _ => 0.0,
    };

    (config.baseline + source_bonus + live_bonus)
        .clamp(0.0, 1.0)
        .min(max_score.clamp(0.0, 1.0))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
