use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::SynthesizedResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub query: String,
    pub response: SynthesizedResponse,
    pub timestamp: DateTime<Utc>,
}

/// In-memory, append-only record of one session's query turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, query: &str, response: SynthesizedResponse) -> &HistoryEntry {
        self.entries.push(HistoryEntry {
            id: Uuid::new_v4().to_string(),
            query: query.to_string(),
            response,
            timestamp: Utc::now(),
        });
        let index = self.entries.len() - 1;
        &self.entries[index]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        tracing::info!("Clearing conversation history ({} entries)", self.entries.len());
        self.entries.clear();
    }
}
