use std::sync::Arc;
use std::time::Duration;

use crate::core::config::LlmConfig;
use crate::core::errors::NavigatorError;
use crate::llm::openai::OpenAiCompatibleProvider;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

/// Shared handle to the configured text-generation provider.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            provider,
            model: model.into(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// `None` when no endpoint is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, NavigatorError> {
        if !config.is_configured() {
            return Ok(None);
        }
        let base_url = config.base_url.clone().unwrap_or_default();
        let provider = OpenAiCompatibleProvider::new(
            base_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        tracing::info!("LLM provider configured (model: {})", config.model);
        Ok(Some(Self {
            provider: Arc::new(provider),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    /// Single-turn generation with a system instruction.
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, NavigatorError> {
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(prompt)])
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        self.provider.chat(request, &self.model).await
    }

    pub async fn embed(
        &self,
        inputs: &[String],
        model_id: &str,
    ) -> Result<Vec<Vec<f32>>, NavigatorError> {
        self.provider.embed(inputs, model_id).await
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Reachability check. Logs the outcome and never fails; an unreachable
    /// provider only means LLM-backed steps fall back per call.
    pub async fn health_check(&self) -> bool {
        match self.provider.health_check().await {
            Ok(true) => {
                tracing::info!("LLM provider '{}' is reachable", self.provider_name());
                true
            }
            Ok(false) => {
                tracing::warn!(
                    "LLM provider '{}' is not reachable, LLM steps will use their fallbacks",
                    self.provider_name()
                );
                false
            }
            Err(err) => {
                tracing::warn!(
                    "LLM provider '{}' health check failed: {}",
                    self.provider_name(),
                    err
                );
                false
            }
        }
    }
}
