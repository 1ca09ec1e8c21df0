//! Tier 3: synthetic data for when every real source is down.

use async_trait::async_trait;

use super::backend::LookupBackend;
use super::types::{
    CaseRecord, LookupPayload, LookupRequest, PolicyStatus, Provenance, StatusKind,
    PLACEHOLDER_SOURCE,
};
use crate::core::errors::NavigatorError;

struct CuratedCase {
    name: &'static str,
    court: &'static str,
    year: &'static str,
    citation: &'static str,
    summary: &'static str,
    url: &'static str,
    date_filed: &'static str,
}

static SECTION_230_CASES: [CuratedCase; 2] = [
    CuratedCase {
        name: "Fair Housing Council v. Roommates.com",
        court: "9th Circuit Court of Appeals",
        year: "2008",
        citation: "521 F.3d 1157",
        summary: "Clarified limits on Section 230 platform immunity. Websites that contribute to developing illegal content are not protected.",
        url: "https://www.courtlistener.com/opinion/171033/",
        date_filed: "2008-04-03",
    },
    CuratedCase {
        name: "Gonzalez v. Google LLC",
        court: "Supreme Court of the United States",
        year: "2023",
        citation: "598 U.S. ___",
        summary: "Examined whether algorithmic recommendations are protected by Section 230.",
        url: "https://www.supremecourt.gov/opinions/22pdf/21-1333_6j7a.pdf",
        date_filed: "2023-05-18",
    },
];

static GDPR_CASES: [CuratedCase; 1] = [CuratedCase {
    name: "Google LLC v. CNIL",
    court: "Court of Justice of the European Union",
    year: "2019",
    citation: "Case C-507/17",
    summary: "Addressed the territorial scope of the right to be forgotten under GDPR Article 17.",
    url: "https://curia.europa.eu/juris/document/document.jsf?docid=218105",
    date_filed: "2019-09-24",
}];

impl CuratedCase {
    fn to_record(&self) -> CaseRecord {
        CaseRecord {
            name: self.name.to_string(),
            court: self.court.to_string(),
            year: Some(self.year.to_string()),
            citation: Some(self.citation.to_string()),
            summary: self.summary.to_string(),
            url: Some(self.url.to_string()),
            date_filed: Some(self.date_filed.to_string()),
            source: PLACEHOLDER_SOURCE.to_string(),
        }
    }
}

pub fn placeholder_cases(term: &str, limit: usize) -> Vec<CaseRecord> {
    let lowered = term.to_lowercase();
    let curated: &[CuratedCase] = if lowered.contains("section 230") {
        &SECTION_230_CASES
    } else if lowered.contains("gdpr") {
        &GDPR_CASES
    } else {
        &[]
    };

    if !curated.is_empty() {
        return curated.iter().take(limit).map(CuratedCase::to_record).collect();
    }

    vec![CaseRecord {
        name: format!("Related Case for {}", term.trim()),
        court: "Various Courts".to_string(),
        year: None,
        citation: None,
        summary: format!(
            "Placeholder case for {}. Configure the case-law source for real data.",
            term.trim()
        ),
        url: None,
        date_filed: None,
        source: PLACEHOLDER_SOURCE.to_string(),
    }]
    .into_iter()
    .take(limit)
    .collect()
}

pub fn placeholder_status(identifier: &str) -> PolicyStatus {
    let mut status = PolicyStatus::bare(identifier, StatusKind::Unknown, PLACEHOLDER_SOURCE);
    status.message = Some("Live policy data is currently unavailable".to_string());
    status
}

pub struct PlaceholderLookup;

#[async_trait]
impl LookupBackend for PlaceholderLookup {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn provenance(&self) -> Provenance {
        Provenance::Placeholder
    }

    fn source_name(&self, _request: &LookupRequest) -> String {
        PLACEHOLDER_SOURCE.to_string()
    }

    async fn fetch(&self, request: &LookupRequest) -> Result<LookupPayload, NavigatorError> {
        Ok(match request {
            LookupRequest::PolicyStatus { identifier } => {
                LookupPayload::PolicyStatus(placeholder_status(identifier))
            }
            LookupRequest::Cases { term, limit } => {
                LookupPayload::Cases(placeholder_cases(term, *limit))
            }
            LookupRequest::RecentDocuments { .. } => LookupPayload::Documents(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curated_cases_match_case_insensitively() {
        let cases = placeholder_cases("Section 230 immunity", 5);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "Fair Housing Council v. Roommates.com");
        assert!(cases.iter().all(|c| c.source == PLACEHOLDER_SOURCE));

        assert_eq!(placeholder_cases("GDPR", 5)[0].citation.as_deref(), Some("Case C-507/17"));
        assert_eq!(placeholder_cases("section 230", 1).len(), 1);
    }

    #[test]
    fn unknown_terms_get_a_generic_case() {
        let cases = placeholder_cases("clean water act", 3);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "Related Case for clean water act");
        assert!(placeholder_cases("anything", 0).is_empty());
    }

    #[tokio::test]
    async fn status_is_unknown_and_tagged() {
        let payload = PlaceholderLookup
            .fetch(&LookupRequest::PolicyStatus {
                identifier: "EO 14008".to_string(),
            })
            .await
            .unwrap();
        let LookupPayload::PolicyStatus(status) = payload else {
            panic!("expected policy status");
        };
        assert_eq!(status.status, StatusKind::Unknown);
        assert_eq!(status.source, PLACEHOLDER_SOURCE);
    }
}
