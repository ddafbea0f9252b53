//! Capability interfaces for the engine's external collaborators

pub mod embedding;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use vector_store::{ScoredDocument, SearchField, SearchParams, SearchRequest, VectorStore};
