//! Text-to-vector encoders paired with the local index.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::errors::NavigatorError;
use crate::llm::LlmService;
use crate::vector_math::l2_normalize;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, NavigatorError>;
}

/// Deterministic term-hashing encoder.
///
/// Terms are hashed into fixed buckets and weighted by frequency, so texts
/// that share vocabulary land close together. It needs no model files and no
/// network, which makes it the always-available default.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// FNV-1a
    fn bucket(term: &str, dimension: usize) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in term.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash as usize) % dimension
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.len() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    pub fn encode(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];
        if tokens.is_empty() {
            return vector;
        }

        let mut counts: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        for (term, count) in counts {
            // longer terms are less likely to be stopwords
            let weight = 1.0 + (term.len() as f32).ln();
            vector[Self::bucket(term, self.dimension)] += (count / total) * weight;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, NavigatorError> {
        Ok(inputs.iter().map(|text| self.encode(text)).collect())
    }
}

/// Embeddings endpoint of the configured LLM provider.
pub struct ProviderEmbedder {
    llm: LlmService,
    model: String,
    dimension: usize,
}

impl ProviderEmbedder {
    pub fn new(llm: LlmService, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            llm,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, NavigatorError> {
        let vectors = self.llm.embed(inputs, &self.model).await?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(NavigatorError::Upstream(format!(
                "embedding model '{}' returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimension
            )));
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_math::cosine_similarity;

    #[test]
    fn empty_text_yields_zero_vector() {
        let embedder = HashingEmbedder::new(384);
        let vector = embedder.encode("  ?! ");
        assert_eq!(vector.len(), 384);
        assert!(vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn output_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(384);
        let a = embedder.encode("Executive Order 14008 climate crisis");
        let b = embedder.encode("Executive Order 14008 climate crisis");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.encode("carbon emissions");
        let related = embedder.encode("carbon emissions rule");
        let unrelated = embedder.encode("data privacy consent requirements");

        let close = cosine_similarity(&query, &related).unwrap();
        let far = cosine_similarity(&query, &unrelated).unwrap();
        assert!(close > far, "{close} should exceed {far}");
    }

    #[tokio::test]
    async fn batch_matches_single_encoding() {
        let embedder = HashingEmbedder::new(64);
        let inputs = vec!["section 230".to_string(), "gdpr article 17".to_string()];
        let batch = embedder.embed(&inputs).await.unwrap();
        assert_eq!(batch[1], embedder.encode("gdpr article 17"));
    }
}
