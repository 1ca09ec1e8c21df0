use std::sync::Arc;

use super::agent::{AgentLookup, LlmAgentRunner};
use super::backend::LookupBackend;
use super::direct::DirectLookup;
use super::placeholder::PlaceholderLookup;
use super::types::{LookupRequest, LookupResult};
use crate::core::config::LookupConfig;
use crate::core::errors::NavigatorError;
use crate::llm::LlmService;

/// Runs each request down the tier list (orchestrated, then direct) and
/// falls back to placeholder data when every tier fails.
pub struct ExternalLookupEngine {
    tiers: Vec<Arc<dyn LookupBackend>>,
    placeholder: PlaceholderLookup,
    default_case_limit: usize,
}

impl ExternalLookupEngine {
    pub fn with_tiers(tiers: Vec<Arc<dyn LookupBackend>>, default_case_limit: usize) -> Self {
        Self {
            tiers,
            placeholder: PlaceholderLookup,
            default_case_limit: default_case_limit.max(1),
        }
    }

    pub fn from_config(
        config: &LookupConfig,
        llm: Option<&LlmService>,
    ) -> Result<Self, NavigatorError> {
        let mut tiers: Vec<Arc<dyn LookupBackend>> = Vec::new();

        if config.agent.enabled {
            match llm {
                Some(llm) => {
                    let llm = match &config.agent.model {
                        Some(model) => llm.with_model(model.clone()),
                        None => llm.clone(),
                    };
                    tracing::info!("Lookup tier enabled: agent ({})", llm.model());
                    tiers.push(Arc::new(AgentLookup::new(Arc::new(LlmAgentRunner::new(llm)))));
                }
                None => {
                    tracing::warn!("Agent lookup enabled but no LLM endpoint is configured, skipping that tier");
                }
            }
        }

        tiers.push(Arc::new(DirectLookup::from_config(config)?));
        Ok(Self::with_tiers(tiers, config.case_limit))
    }

    pub fn default_case_limit(&self) -> usize {
        self.default_case_limit
    }

    pub async fn check_policy_status(&self, identifier: &str) -> LookupResult {
        self.run(LookupRequest::PolicyStatus {
            identifier: identifier.trim().to_string(),
        })
        .await
    }

    pub async fn search_cases(&self, term: &str, limit: usize) -> LookupResult {
        self.run(LookupRequest::Cases {
            term: term.trim().to_string(),
            limit: limit.max(1),
        })
        .await
    }

    pub async fn get_recent_documents(&self, doc_type: Option<&str>, window_days: u32) -> LookupResult {
        self.run(LookupRequest::RecentDocuments {
            doc_type: doc_type.map(str::to_string),
            window_days: window_days.max(1),
        })
        .await
    }

    async fn run(&self, request: LookupRequest) -> LookupResult {
        for tier in &self.tiers {
            match tier.fetch(&request).await {
                Ok(payload) => {
                    tracing::info!("{} served by {} tier", request.kind(), tier.name());
                    return LookupResult::single(
                        tier.provenance(),
                        tier.source_name(&request),
                        payload,
                    );
                }
                Err(err) => {
                    tracing::warn!("{} via {} tier failed: {}", request.kind(), tier.name(), err);
                }
            }
        }

        tracing::warn!("{} falling back to placeholder data", request.kind());
        self.placeholder_result(&request).await
    }

    async fn placeholder_result(&self, request: &LookupRequest) -> LookupResult {
        let source = self.placeholder.source_name(request);
        match self.placeholder.fetch(request).await {
            Ok(payload) => LookupResult::single(self.placeholder.provenance(), source, payload),
            Err(err) => {
                tracing::error!("Placeholder lookup failed: {}", err);
                LookupResult {
                    provenance: self.placeholder.provenance(),
                    payloads: Default::default(),
                }
            }
        }
    }
}
