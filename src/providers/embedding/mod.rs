//! Embedding provider implementations

pub mod null;
pub mod openai;
pub mod voyageai;

pub use null::NullEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;
pub use voyageai::VoyageAiEmbeddingProvider;
