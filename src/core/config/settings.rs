//! Typed configuration handed to every component at construction.
//!
//! Every field has a default so an empty or missing `config.yml` still
//! produces a usable (fully offline) configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Vector dimensionality shared by both retrieval backends.
pub const EMBEDDING_DIMENSION: usize = 384;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub app: AppConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub lookup: LookupConfig,
    pub synthesis: SynthesisConfig,
    pub classifier: ClassifierConfig,
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub max_query_length: usize,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_query_length: 4000,
            log_level: "info".to_string(),
        }
    }
}

/// OpenAI-compatible endpoint used for delegated classification,
/// generation and agent-orchestrated lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Deterministic in-process hashing embedder. Always available.
    #[default]
    Hashing,
    /// Embeddings endpoint of the configured LLM provider.
    Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub embedding_dimension: usize,
    pub embedder: EmbedderKind,
    pub embedding_model: String,
    /// Overrides the local index location derived from `AppPaths`.
    pub local_index_path: Option<PathBuf>,
    pub managed: ManagedIndexConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            embedding_dimension: EMBEDDING_DIMENSION,
            embedder: EmbedderKind::Hashing,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            local_index_path: None,
            managed: ManagedIndexConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedIndexConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub index_name: String,
    pub timeout_secs: u64,
}

impl ManagedIndexConfig {
    pub fn is_configured(&self) -> bool {
        let has_url = self
            .base_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false);
        let has_key = self
            .api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);
        has_url && has_key
    }
}

impl Default for ManagedIndexConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            index_name: "policy_documents".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLookupConfig {
    pub enabled: bool,
    /// Model used by the agent; falls back to `llm.model`.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub agent: AgentLookupConfig,
    pub federal_register: SourceConfig,
    pub courtlistener: SourceConfig,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
    pub case_limit: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            agent: AgentLookupConfig::default(),
            federal_register: SourceConfig::default(),
            courtlistener: SourceConfig::default(),
            timeout_secs: 10,
            requests_per_minute: 30,
            case_limit: 5,
        }
    }
}

/// Confidence scoring parameters. Only the bounding and monotonicity of the
/// resulting score are load-bearing; the magnitudes are tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub baseline: f64,
    pub per_source_bonus: f64,
    pub max_source_bonus: f64,
    pub live_lookup_bonus: f64,
    pub no_source_confidence: f64,
    pub placeholder_source_score: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            baseline: 0.3,
            per_source_bonus: 0.1,
            max_source_bonus: 0.4,
            live_lookup_bonus: 0.1,
            no_source_confidence: 0.1,
            placeholder_source_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Passages considered for the generation prompt.
    pub top_n: usize,
    /// Per-passage cap inside the generation prompt.
    pub passage_chars: usize,
    /// Hard cap on the whole context block.
    pub max_context_chars: usize,
    /// Per-passage cap inside template answers.
    pub snippet_chars: usize,
    pub confidence: ConfidenceConfig,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            passage_chars: 500,
            max_context_chars: 4000,
            snippet_chars: 200,
            confidence: ConfidenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub use_llm: bool,
    pub policy_status_keywords: Option<Vec<String>>,
    pub case_law_keywords: Option<Vec<String>>,
    pub compliance_keywords: Option<Vec<String>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            policy_status_keywords: None,
            case_law_keywords: None,
            compliance_keywords: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub slack_webhook_url: Option<String>,
    pub channel: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            slack_webhook_url: None,
            channel: None,
            timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let config: NavigatorConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.retrieval.embedding_dimension, EMBEDDING_DIMENSION);
        assert_eq!(config.retrieval.embedder, EmbedderKind::Hashing);
        assert!(!config.llm.is_configured());
        assert!(!config.retrieval.managed.is_configured());
        assert_eq!(config.lookup.case_limit, 5);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: NavigatorConfig = serde_json::from_value(json!({
            "llm": { "base_url": "http://localhost:1234" },
            "synthesis": { "confidence": { "baseline": 0.25 } }
        }))
        .unwrap();

        assert!(config.llm.is_configured());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.synthesis.confidence.baseline, 0.25);
        assert_eq!(config.synthesis.confidence.per_source_bonus, 0.1);
    }

    #[test]
    fn managed_index_requires_url_and_key() {
        let mut managed = ManagedIndexConfig {
            base_url: Some("https://index.example".to_string()),
            ..Default::default()
        };
        assert!(!managed.is_configured());
        managed.api_key = Some("k".to_string());
        assert!(managed.is_configured());
    }
}
