use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exact-match metadata constraints (`key == value` for every entry).
pub type MetadataFilter = BTreeMap<String, Value>;

/// A stored policy document. Embeddings are derived by the backend and never
/// supplied by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Display title: `title` metadata, else `source`, else the id.
    pub fn title(&self) -> String {
        ["title", "source"]
            .iter()
            .filter_map(|key| self.metadata.get(*key))
            .filter_map(|value| value.as_str())
            .map(str::trim)
            .find(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn matches(&self, filter: &MetadataFilter) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Search hits ordered by descending score, each score within `[0, 1]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    hits: Vec<ScoredDocument>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_hits(mut hits: Vec<ScoredDocument>, top_k: usize) -> Self {
        for hit in &mut hits {
            hit.score = if hit.score.is_finite() {
                hit.score.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(top_k);
        Self { hits }
    }

    pub fn hits(&self) -> &[ScoredDocument] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn first(&self) -> Option<&ScoredDocument> {
        self.hits.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredDocument> {
        self.hits.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            document: Document::new(id, "text"),
            score,
        }
    }

    #[test]
    fn hits_are_sorted_clamped_and_truncated() {
        let result = RetrievalResult::from_hits(
            vec![hit("a", 0.2), hit("b", 1.3), hit("c", -0.4), hit("d", 0.7)],
            3,
        );

        let ids: Vec<&str> = result.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
        assert_eq!(result.first().unwrap().score, 1.0);
        assert!(result
            .hits()
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn title_prefers_metadata() {
        let doc = Document::new("eo-14008", "body").with_metadata("source", "Federal Register");
        assert_eq!(doc.title(), "Federal Register");

        let titled = doc.clone().with_metadata("title", "Tackling the Climate Crisis");
        assert_eq!(titled.title(), "Tackling the Climate Crisis");

        assert_eq!(Document::new("bare", "x").title(), "bare");
    }

    #[test]
    fn filter_requires_every_entry() {
        let doc = Document::new("d", "x")
            .with_metadata("agency", "EPA")
            .with_metadata("year", 2021);
        let mut filter = MetadataFilter::new();
        filter.insert("agency".to_string(), json!("EPA"));
        assert!(doc.matches(&filter));
        filter.insert("year".to_string(), json!(2020));
        assert!(!doc.matches(&filter));
    }
}
