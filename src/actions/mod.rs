//! Outbound notifications triggered by the pipeline.
//!
//! Results are advisory: the coordinator logs them and moves on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::ActionsConfig;
use crate::core::errors::NavigatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendComplianceChecklist,
    PolicyUpdate,
}

#[async_trait]
pub trait ActionEngine: Send + Sync {
    async fn trigger(&self, kind: ActionKind, payload: &Value) -> bool;
}

/// Used when no webhook is configured.
pub struct NoopActionEngine;

#[async_trait]
impl ActionEngine for NoopActionEngine {
    async fn trigger(&self, kind: ActionKind, _payload: &Value) -> bool {
        tracing::debug!("No action endpoint configured, skipping {:?}", kind);
        false
    }
}

/// Posts messages to a Slack-style incoming webhook.
pub struct WebhookActionEngine {
    client: Client,
    webhook_url: String,
    channel: Option<String>,
}

impl WebhookActionEngine {
    pub fn new(
        webhook_url: String,
        channel: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NavigatorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NavigatorError::internal)?;
        Ok(Self {
            client,
            webhook_url,
            channel,
        })
    }

    async fn post(&self, text: String) -> Result<(), NavigatorError> {
        let mut body = json!({ "text": text });
        if let Some(channel) = &self.channel {
            body["channel"] = Value::String(channel.clone());
        }

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(NavigatorError::upstream)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavigatorError::Upstream(format!(
                "webhook returned {}",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ActionEngine for WebhookActionEngine {
    async fn trigger(&self, kind: ActionKind, payload: &Value) -> bool {
        let message = match kind {
            ActionKind::SendComplianceChecklist => compliance_checklist_message(payload),
            ActionKind::PolicyUpdate => policy_update_message(payload),
        };
        match self.post(message).await {
            Ok(()) => {
                tracing::info!("Sent {:?} notification", kind);
                true
            }
            Err(err) => {
                tracing::warn!("Failed to send {:?} notification: {}", kind, err);
                false
            }
        }
    }
}

pub fn build_action_engine(config: &ActionsConfig) -> Result<Arc<dyn ActionEngine>, NavigatorError> {
    match config
        .slack_webhook_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    {
        Some(url) => Ok(Arc::new(WebhookActionEngine::new(
            url.to_string(),
            config.channel.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(NoopActionEngine)),
    }
}

fn text_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .unwrap_or("N/A")
}

pub fn compliance_checklist_message(payload: &Value) -> String {
    let mut requirements: Vec<&str> = payload
        .get("requirements")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if requirements.is_empty() {
        requirements.push("Review the applicable policy documents");
    }
    let checklist: Vec<String> = requirements.iter().map(|req| format!("☐ {}", req)).collect();

    format!(
        "*Compliance Checklist*\nPolicy: {}\n\nRequirements:\n{}\n\nGenerated: {}",
        text_field(payload, "policy"),
        checklist.join("\n"),
        Utc::now().format("%Y-%m-%d %H:%M")
    )
}

pub fn policy_update_message(payload: &Value) -> String {
    format!(
        "*Policy Update Alert*\nPolicy: {}\nStatus: {}\nDate: {}\nDocument Number: {}\nSummary: {}",
        text_field(payload, "policy"),
        text_field(payload, "status"),
        text_field(payload, "date"),
        text_field(payload, "document_number"),
        text_field(payload, "summary"),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every trigger and answers with a fixed outcome.
    pub struct RecordingActionEngine {
        pub outcome: bool,
        pub calls: Mutex<Vec<(ActionKind, Value)>>,
    }

    impl RecordingActionEngine {
        pub fn new(outcome: bool) -> Self {
            Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ActionEngine for RecordingActionEngine {
        async fn trigger(&self, kind: ActionKind, payload: &Value) -> bool {
            self.calls.lock().unwrap().push((kind, payload.clone()));
            self.outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_lists_requirements() {
        let message = compliance_checklist_message(&json!({
            "policy": "GDPR",
            "requirements": ["Data Processing Agreement", "Breach Notification"]
        }));
        assert!(message.contains("Policy: GDPR"));
        assert!(message.contains("☐ Data Processing Agreement\n☐ Breach Notification"));
    }

    #[test]
    fn checklist_without_requirements_still_has_an_item() {
        let message = compliance_checklist_message(&json!({}));
        assert!(message.contains("Policy: N/A"));
        assert!(message.contains("☐ Review the applicable policy documents"));
    }

    #[test]
    fn policy_update_fills_missing_fields() {
        let message = policy_update_message(&json!({"policy": "EO 14008", "status": "ACTIVE"}));
        assert!(message.contains("Status: ACTIVE"));
        assert!(message.contains("Date: N/A"));
    }

    #[test]
    fn noop_without_webhook() {
        assert!(build_action_engine(&ActionsConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn unreachable_webhook_reports_failure() {
        let engine = WebhookActionEngine::new(
            "http://127.0.0.1:9/hook".to_string(),
            Some("#policy".to_string()),
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(
            !engine
                .trigger(ActionKind::PolicyUpdate, &json!({"policy": "EO 14008"}))
                .await
        );
        assert!(!NoopActionEngine.trigger(ActionKind::PolicyUpdate, &json!({})).await);
    }
}
