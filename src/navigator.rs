//! Pipeline coordinator.
//!
//! One `PolicyNavigator` is one session: it owns its conversation history
//! and runs each query turn start to finish before accepting the next.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::actions::{build_action_engine, ActionEngine, ActionKind};
use crate::core::config::{AppPaths, NavigatorConfig};
use crate::core::errors::{NavigatorError, Rejection};
use crate::history::{ConversationHistory, HistoryEntry};
use crate::llm::LlmService;
use crate::lookup::{ExternalLookupEngine, LookupResult, StatusKind};
use crate::pipeline::{
    DisplayResponse, IntentClassifier, QueryIntent, ResponseSynthesizer, RoutingDecision,
    RoutingPolicy, SynthesizedResponse,
};
use crate::rag::{BatchCounts, Document, RetrievalEngine, RetrievalResult, RetrievalStats};

const STATUS_TOP_K: usize = 3;
const CHECKLIST_ITEMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigatorStats {
    pub retrieval: RetrievalStats,
    pub history_len: usize,
}

pub struct PolicyNavigator {
    max_query_length: usize,
    classifier: IntentClassifier,
    retrieval: RetrievalEngine,
    lookup: ExternalLookupEngine,
    synthesizer: ResponseSynthesizer,
    actions: Arc<dyn ActionEngine>,
    history: ConversationHistory,
}

impl PolicyNavigator {
    /// Build every component from configuration. Backend selection for
    /// retrieval and lookup happens here, once.
    pub async fn connect(config: &NavigatorConfig, paths: &AppPaths) -> Result<Self, NavigatorError> {
        let llm = LlmService::from_config(&config.llm)?;
        match &llm {
            Some(llm) => {
                llm.health_check().await;
            }
            None => tracing::info!(
                "No LLM endpoint configured, using keyword classification and template answers"
            ),
        }

        let retrieval = RetrievalEngine::connect(&config.retrieval, paths, llm.as_ref()).await?;
        let lookup = ExternalLookupEngine::from_config(&config.lookup, llm.as_ref())?;
        let actions = build_action_engine(&config.actions)?;

        Ok(Self::with_components(
            config,
            IntentClassifier::new(&config.classifier, llm.clone()),
            retrieval,
            lookup,
            ResponseSynthesizer::new(&config.synthesis, llm),
            actions,
        ))
    }

    pub fn with_components(
        config: &NavigatorConfig,
        classifier: IntentClassifier,
        retrieval: RetrievalEngine,
        lookup: ExternalLookupEngine,
        synthesizer: ResponseSynthesizer,
        actions: Arc<dyn ActionEngine>,
    ) -> Self {
        Self {
            max_query_length: config.app.max_query_length,
            classifier,
            retrieval,
            lookup,
            synthesizer,
            actions,
            history: ConversationHistory::new(),
        }
    }

    fn validate_query<'a>(&self, query: &'a str) -> Result<&'a str, Rejection> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(Rejection::EmptyQuery);
        }
        if trimmed.chars().count() > self.max_query_length {
            return Err(Rejection::QueryTooLong {
                max: self.max_query_length,
            });
        }
        Ok(trimmed)
    }

    pub async fn process_query(&mut self, query: &str) -> Result<SynthesizedResponse, Rejection> {
        let query = match self.validate_query(query) {
            Ok(query) => query,
            Err(rejection) => {
                tracing::warn!("Rejected query: {}", rejection);
                return Err(rejection);
            }
        };
        tracing::info!("Processing query: {}", query);

        let intent = self.classifier.classify(query).await;
        let decision = RoutingPolicy::route(intent);
        tracing::debug!("Routing {} as {:?}", intent, decision);

        let retrieval = self.retrieve(query, self.retrieval.default_top_k(), decision).await;

        let lookup = if decision.use_external_lookup {
            Some(match intent {
                QueryIntent::CaseLawSearch => {
                    self.lookup
                        .search_cases(query, self.lookup.default_case_limit())
                        .await
                }
                _ => self.lookup.check_policy_status(query).await,
            })
        } else {
            None
        };

        if decision.use_action {
            self.send_checklist(query, &retrieval).await;
        }

        let response = self
            .synthesizer
            .synthesize(query, &retrieval, lookup.as_ref())
            .await
            .with_intent(intent);
        self.history.push(query, response.clone());
        Ok(response)
    }

    async fn retrieve(&self, query: &str, top_k: usize, decision: RoutingDecision) -> RetrievalResult {
        if !decision.use_retrieval {
            return RetrievalResult::empty();
        }
        self.retrieval.search(query, top_k, None).await
    }

    async fn send_checklist(&self, query: &str, retrieval: &RetrievalResult) {
        let requirements: Vec<String> = retrieval
            .iter()
            .take(CHECKLIST_ITEMS)
            .map(|hit| hit.document.title())
            .collect();
        let payload = json!({
            "policy": query,
            "requirements": requirements,
        });
        let sent = self
            .actions
            .trigger(ActionKind::SendComplianceChecklist, &payload)
            .await;
        tracing::info!("Compliance checklist action completed (delivered: {})", sent);
    }

    /// Status lookup for a known policy, skipping classification.
    pub async fn check_policy_status(&self, identifier: &str) -> Result<SynthesizedResponse, Rejection> {
        let identifier = self.validate_query(identifier)?;
        let decision = RoutingPolicy::pinned_lookup();

        let retrieval = self.retrieve(identifier, STATUS_TOP_K, decision).await;
        let lookup = self.lookup.check_policy_status(identifier).await;
        Ok(self
            .synthesizer
            .synthesize(&format!("Status of {}", identifier), &retrieval, Some(&lookup))
            .await
            .with_intent(QueryIntent::PolicyStatus))
    }

    /// Case-law search for a regulation, skipping classification.
    pub async fn search_cases(&self, term: &str, limit: usize) -> Result<SynthesizedResponse, Rejection> {
        let term = self.validate_query(term)?;
        if limit == 0 {
            return Err(Rejection::InvalidLimit);
        }
        let decision = RoutingPolicy::pinned_lookup();

        let retrieval = self
            .retrieve(term, self.retrieval.default_top_k(), decision)
            .await;
        let lookup = self.lookup.search_cases(term, limit).await;
        Ok(self
            .synthesizer
            .synthesize(&format!("Cases related to {}", term), &retrieval, Some(&lookup))
            .await
            .with_intent(QueryIntent::CaseLawSearch))
    }

    pub async fn recent_documents(
        &self,
        doc_type: Option<&str>,
        window_days: u32,
    ) -> Result<LookupResult, Rejection> {
        if window_days == 0 {
            return Err(Rejection::InvalidWindow);
        }
        let doc_type = doc_type.map(str::trim).filter(|t| !t.is_empty());
        Ok(self.lookup.get_recent_documents(doc_type, window_days).await)
    }

    /// Look up a policy and post an update alert when live data says it is
    /// active. Returns whether an alert was delivered.
    pub async fn notify_policy_update(&self, identifier: &str) -> Result<bool, Rejection> {
        let identifier = self.validate_query(identifier)?;
        let lookup = self.lookup.check_policy_status(identifier).await;

        let Some(status) = lookup.policy_status().filter(|_| lookup.is_live()) else {
            tracing::info!("No live status for {}, skipping update alert", identifier);
            return Ok(false);
        };
        if status.status != StatusKind::Active {
            return Ok(false);
        }

        let payload = json!({
            "policy": identifier,
            "status": "ACTIVE",
            "date": status.publication_date,
            "document_number": status.document_number,
            "summary": status.title,
        });
        Ok(self.actions.trigger(ActionKind::PolicyUpdate, &payload).await)
    }

    pub async fn add_document(
        &self,
        id: &str,
        content: &str,
        metadata: BTreeMap<String, Value>,
    ) -> Result<bool, Rejection> {
        if id.trim().is_empty() {
            return Err(Rejection::MissingDocumentId);
        }
        if content.trim().is_empty() {
            return Err(Rejection::EmptyContent);
        }
        let document = Document {
            id: id.trim().to_string(),
            content: content.to_string(),
            metadata,
        };
        Ok(self.retrieval.add_document(&document).await)
    }

    pub async fn add_documents_batch(&self, documents: &[Document]) -> BatchCounts {
        self.retrieval.add_documents_batch(documents).await
    }

    pub async fn get_stats(&self) -> NavigatorStats {
        NavigatorStats {
            retrieval: self.retrieval.get_stats().await,
            history_len: self.history.len(),
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn retrieval(&self) -> &RetrievalEngine {
        &self.retrieval
    }

    pub fn format_for_display(response: &SynthesizedResponse) -> DisplayResponse {
        ResponseSynthesizer::format_for_display(response)
    }
}
