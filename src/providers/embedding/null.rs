//! Deterministic local embedder for tests and offline runs
//!
//! Produces a stable pseudo-embedding from a content digest so identical
//! texts always map to identical vectors.

use crate::domain::error::Result;
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::Embedding;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

const DEFAULT_DIMENSION: usize = 8;

/// Hash-derived embeddings with no external service
pub struct NullEmbeddingProvider {
    dimension: usize,
}

impl NullEmbeddingProvider {
    pub fn new(dimension: Option<usize>) -> Self {
        Self {
            dimension: dimension.unwrap_or(DEFAULT_DIMENSION),
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dimension)
            .map(|i| {
                let byte = digest[i % digest.len()];
                (byte as f32 / 255.0) * 2.0 - 1.0
            })
            .collect()
    }
}

impl Default for NullEmbeddingProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .map(|text| Embedding {
                vector: self.vector_for(text),
                model: self.model_name().to_string(),
                dimensions: self.dimension,
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "null-embedding-v1"
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_texts_share_vectors() {
        let provider = NullEmbeddingProvider::default();
        let batch = provider
            .embed_batch(&["fn main() {}".to_string(), "fn main() {}".to_string()])
            .await
            .unwrap();
        assert_eq!(batch[0], batch[1]);
        assert_eq!(batch[0].vector.len(), DEFAULT_DIMENSION);
    }

    #[tokio::test]
    async fn different_texts_diverge() {
        let provider = NullEmbeddingProvider::default();
        let batch = provider
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_ne!(batch[0].vector, batch[1].vector);
    }
}
