use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source label attached to every synthetic record.
pub const PLACEHOLDER_SOURCE: &str = "Placeholder Data";

/// Which tier produced a lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Agent-orchestrated lookup.
    Orchestrated,
    /// Direct call to the data source.
    Direct,
    /// Synthetic data returned because every real source failed.
    Placeholder,
}

impl Provenance {
    pub fn is_live(self) -> bool {
        !matches!(self, Provenance::Placeholder)
    }

    pub fn label(self) -> &'static str {
        match self {
            Provenance::Orchestrated => "orchestrated",
            Provenance::Direct => "direct",
            Provenance::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A request understood by every lookup tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRequest {
    PolicyStatus { identifier: String },
    Cases { term: String, limit: usize },
    RecentDocuments { doc_type: Option<String>, window_days: u32 },
}

impl LookupRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            LookupRequest::PolicyStatus { .. } => "policy status",
            LookupRequest::Cases { .. } => "case search",
            LookupRequest::RecentDocuments { .. } => "recent documents",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    Active,
    NotFound,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatus {
    pub identifier: String,
    pub status: StatusKind,
    pub title: Option<String>,
    pub document_number: Option<String>,
    pub publication_date: Option<String>,
    pub doc_type: Option<String>,
    pub abstract_text: Option<String>,
    pub html_url: Option<String>,
    pub pdf_url: Option<String>,
    pub message: Option<String>,
    pub last_checked: DateTime<Utc>,
    pub source: String,
}

impl PolicyStatus {
    pub fn bare(identifier: &str, status: StatusKind, source: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            status,
            title: None,
            document_number: None,
            publication_date: None,
            doc_type: None,
            abstract_text: None,
            html_url: None,
            pdf_url: None,
            message: None,
            last_checked: Utc::now(),
            source: source.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub name: String,
    pub court: String,
    pub year: Option<String>,
    pub citation: Option<String>,
    pub summary: String,
    pub url: Option<String>,
    pub date_filed: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDocument {
    pub title: String,
    pub doc_type: Option<String>,
    pub abstract_text: Option<String>,
    pub publication_date: Option<String>,
    pub document_number: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum LookupPayload {
    PolicyStatus(PolicyStatus),
    Cases(Vec<CaseRecord>),
    Documents(Vec<RegisterDocument>),
}

impl LookupPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            LookupPayload::PolicyStatus(_) => false,
            LookupPayload::Cases(cases) => cases.is_empty(),
            LookupPayload::Documents(documents) => documents.is_empty(),
        }
    }

    /// One-paragraph plain-text rendering.
    pub fn summary(&self) -> String {
        match self {
            LookupPayload::PolicyStatus(status) => {
                let state = match status.status {
                    StatusKind::Active => "active",
                    StatusKind::NotFound => "not found",
                    StatusKind::Unknown => "unknown",
                };
                let mut text = format!("Status of {}: {}", status.identifier, state);
                if let Some(title) = &status.title {
                    text.push_str(&format!(". Latest document: {}", title));
                }
                if let Some(date) = &status.publication_date {
                    text.push_str(&format!(" (published {})", date));
                }
                if let Some(message) = &status.message {
                    text.push_str(&format!(". {}", message));
                }
                text.push('.');
                text
            }
            LookupPayload::Cases(cases) if cases.is_empty() => "No related cases found.".to_string(),
            LookupPayload::Cases(cases) => {
                let listed: Vec<String> = cases
                    .iter()
                    .map(|case| match (&case.year, &case.citation) {
                        (Some(year), Some(citation)) => {
                            format!("{} ({}, {}, {})", case.name, case.court, year, citation)
                        }
                        (Some(year), None) => format!("{} ({}, {})", case.name, case.court, year),
                        _ => format!("{} ({})", case.name, case.court),
                    })
                    .collect();
                format!("Related cases: {}.", listed.join("; "))
            }
            LookupPayload::Documents(documents) if documents.is_empty() => {
                "No recent documents found.".to_string()
            }
            LookupPayload::Documents(documents) => {
                let listed: Vec<&str> = documents.iter().map(|d| d.title.as_str()).collect();
                format!("Recent documents: {}.", listed.join("; "))
            }
        }
    }
}

/// Outcome of an external lookup. Never an error: failures surface as a
/// placeholder provenance instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub provenance: Provenance,
    pub payloads: BTreeMap<String, LookupPayload>,
}

impl LookupResult {
    pub fn single(provenance: Provenance, source: impl Into<String>, payload: LookupPayload) -> Self {
        let mut payloads = BTreeMap::new();
        payloads.insert(source.into(), payload);
        Self {
            provenance,
            payloads,
        }
    }

    pub fn is_live(&self) -> bool {
        self.provenance.is_live() && !self.payloads.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.values().all(LookupPayload::is_empty)
    }

    pub fn policy_status(&self) -> Option<&PolicyStatus> {
        self.payloads.values().find_map(|payload| match payload {
            LookupPayload::PolicyStatus(status) => Some(status),
            _ => None,
        })
    }

    pub fn cases(&self) -> Vec<&CaseRecord> {
        self.payloads
            .values()
            .filter_map(|payload| match payload {
                LookupPayload::Cases(cases) => Some(cases),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn documents(&self) -> Vec<&RegisterDocument> {
        self.payloads
            .values()
            .filter_map(|payload| match payload {
                LookupPayload::Documents(documents) => Some(documents),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(name: &str) -> CaseRecord {
        CaseRecord {
            name: name.to_string(),
            court: "9th Cir.".to_string(),
            year: Some("2008".to_string()),
            citation: None,
            summary: String::new(),
            url: None,
            date_filed: None,
            source: "CourtListener API".to_string(),
        }
    }

    #[test]
    fn placeholder_is_not_live() {
        let result = LookupResult::single(
            Provenance::Placeholder,
            PLACEHOLDER_SOURCE,
            LookupPayload::Cases(vec![case("A v. B")]),
        );
        assert!(!result.is_live());
        assert!(!result.is_empty());
        assert_eq!(result.cases().len(), 1);
    }

    #[test]
    fn summaries_render_payloads() {
        let mut status = PolicyStatus::bare("EO 14008", StatusKind::Active, "Federal Register API");
        status.title = Some("Tackling the Climate Crisis".to_string());
        let text = LookupPayload::PolicyStatus(status).summary();
        assert!(text.contains("active"));
        assert!(text.contains("Tackling the Climate Crisis"));

        let cases = LookupPayload::Cases(vec![case("Roommates")]).summary();
        assert_eq!(cases, "Related cases: Roommates (9th Cir., 2008).");
        assert!(LookupPayload::Documents(vec![]).is_empty());
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let value = serde_json::to_value(LookupPayload::Cases(vec![])).unwrap();
        assert_eq!(value["kind"], "cases");
    }
}
