//! Query intent classification.
//!
//! The configured chat model picks one of four labels. Without a model, or
//! when the call fails, curated keyword sets are matched in priority order:
//! policy status, then case law, then compliance. The first category with
//! any matching keyword wins regardless of how many keywords match.

use serde::{Deserialize, Serialize};

use crate::core::config::ClassifierConfig;
use crate::llm::LlmService;

const POLICY_STATUS_KEYWORDS: &[&str] = &[
    "status",
    "in effect",
    "effective",
    "active",
    "executive order",
    "revoked",
    "rescinded",
    "deadline",
    "expire",
];

const CASE_LAW_KEYWORDS: &[&str] = &[
    "case",
    "court",
    "ruling",
    "judgment",
    "lawsuit",
    "litigation",
    "precedent",
    "challenged",
    "opinion",
];

const COMPLIANCE_KEYWORDS: &[&str] = &[
    "comply",
    "compliance",
    "requirement",
    "obligation",
    "mandatory",
    "checklist",
    "audit",
    "assessment",
];

const CLASSIFICATION_PROMPT: &str = "Classify the user's question about government policy into exactly one \
category. Reply with the label only.\n\
policy_status: whether a policy, regulation or executive order is active, amended or revoked\n\
case_law: court cases, rulings or litigation about a regulation\n\
compliance: obligations, requirements or checklists an organization must meet\n\
general: anything else";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    GeneralQuery,
    PolicyStatus,
    CaseLawSearch,
    ComplianceCheck,
}

impl QueryIntent {
    pub fn label(self) -> &'static str {
        match self {
            QueryIntent::GeneralQuery => "general",
            QueryIntent::PolicyStatus => "policy_status",
            QueryIntent::CaseLawSearch => "case_law",
            QueryIntent::ComplianceCheck => "compliance",
        }
    }

    /// Accepts the bare label, the variant name or either with decoration
    /// such as quotes, punctuation or a trailing explanation.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let first_line = raw.trim().lines().next()?;
        let normalized: String = first_line
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }

        const LABELS: &[(&str, QueryIntent)] = &[
            ("policystatus", QueryIntent::PolicyStatus),
            ("caselawsearch", QueryIntent::CaseLawSearch),
            ("caselaw", QueryIntent::CaseLawSearch),
            ("compliancecheck", QueryIntent::ComplianceCheck),
            ("compliance", QueryIntent::ComplianceCheck),
            ("generalquery", QueryIntent::GeneralQuery),
            ("general", QueryIntent::GeneralQuery),
        ];
        LABELS
            .iter()
            .find(|(label, _)| normalized.starts_with(label))
            .map(|(_, intent)| *intent)
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub struct IntentClassifier {
    llm: Option<LlmService>,
    rules: Vec<(QueryIntent, Vec<String>)>,
}

impl IntentClassifier {
    pub fn new(config: &ClassifierConfig, llm: Option<LlmService>) -> Self {
        let keywords = |custom: &Option<Vec<String>>, defaults: &[&str]| -> Vec<String> {
            custom
                .clone()
                .unwrap_or_else(|| defaults.iter().map(|kw| kw.to_string()).collect())
                .into_iter()
                .map(|kw| kw.trim().to_lowercase())
                .filter(|kw| !kw.is_empty())
                .collect()
        };

        let rules = vec![
            (
                QueryIntent::PolicyStatus,
                keywords(&config.policy_status_keywords, POLICY_STATUS_KEYWORDS),
            ),
            (
                QueryIntent::CaseLawSearch,
                keywords(&config.case_law_keywords, CASE_LAW_KEYWORDS),
            ),
            (
                QueryIntent::ComplianceCheck,
                keywords(&config.compliance_keywords, COMPLIANCE_KEYWORDS),
            ),
        ];

        Self {
            llm: if config.use_llm { llm } else { None },
            rules,
        }
    }

    /// Keyword-only classifier.
    pub fn offline(config: &ClassifierConfig) -> Self {
        Self::new(config, None)
    }

    pub async fn classify(&self, query: &str) -> QueryIntent {
        let Some(llm) = &self.llm else {
            return self.classify_by_keywords(query);
        };

        match llm.generate(CLASSIFICATION_PROMPT, query).await {
            Ok(reply) => match QueryIntent::parse_label(&reply) {
                Some(intent) => {
                    tracing::info!("Classified query as {}", intent);
                    intent
                }
                None => {
                    tracing::warn!("Unrecognized classification reply {:?}, using general", reply);
                    QueryIntent::GeneralQuery
                }
            },
            Err(err) => {
                tracing::warn!("Delegated classification failed, using keywords: {}", err);
                self.classify_by_keywords(query)
            }
        }
    }

    pub fn classify_by_keywords(&self, query: &str) -> QueryIntent {
        let lowered = query.to_lowercase();
        let intent = self
            .rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw.as_str())))
            .map(|(intent, _)| *intent)
            .unwrap_or(QueryIntent::GeneralQuery);
        tracing::info!("Classified query as {} (keywords)", intent);
        intent
    }
}
