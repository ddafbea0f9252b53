use crate::domain::error::{Error, Result};
use crate::domain::types::Embedding;
use async_trait::async_trait;

/// Capability interface for embedding backends.
///
/// Concrete HTTP clients live in `providers::embedding`; the engine only
/// depends on this contract.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| Error::embedding("No embedding returned"))
    }

    /// Embed a batch of texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Dimensionality of the vectors this provider produces
    fn dimensions(&self) -> usize;

    /// Model identifier, as recorded in the index fingerprint
    fn model_name(&self) -> &str;

    /// Provider identifier, as recorded in the index fingerprint
    fn provider_name(&self) -> &str;
}
