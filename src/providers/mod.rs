//! Provider construction from the loaded configuration

pub mod embedding;
pub mod vector_store;

use crate::config::{Config, EmbeddingProviderKind};
use crate::domain::error::{Error, Result};
use crate::domain::ports::{EmbeddingProvider, VectorStore};
use std::sync::Arc;

/// Build the configured embedding provider
pub fn create_embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingProviderKind::OpenAI => {
            let api_key = embedding
                .api_key
                .clone()
                .ok_or_else(|| Error::config("OpenAI embedding provider requires an API key"))?;
            Ok(Arc::new(embedding::OpenAiEmbeddingProvider::new(
                api_key,
                embedding.base_url.clone(),
                embedding.model.clone(),
                embedding.dimension,
            )?))
        }
        EmbeddingProviderKind::VoyageAI => {
            let api_key = embedding
                .api_key
                .clone()
                .ok_or_else(|| Error::config("VoyageAI embedding provider requires an API key"))?;
            Ok(Arc::new(embedding::VoyageAiEmbeddingProvider::new(
                api_key,
                embedding.base_url.clone(),
                embedding.model.clone(),
                embedding.dimension,
            )?))
        }
        EmbeddingProviderKind::Null => Ok(Arc::new(embedding::NullEmbeddingProvider::new(
            embedding.dimension,
        ))),
    }
}

/// Build the configured vector store
#[cfg(feature = "milvus")]
pub async fn create_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(
        vector_store::MilvusVectorStore::connect(
            config.vector_store.address.clone(),
            config.vector_store.token.clone(),
        )
        .await?,
    ))
}

/// Build the configured vector store
#[cfg(not(feature = "milvus"))]
pub async fn create_vector_store(_config: &Config) -> Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(vector_store::MemoryVectorStore::new()))
}
