use crate::domain::error::Result;
use crate::domain::types::{FilterExpr, VectorDocument};
use async_trait::async_trait;

/// Which index field a search request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    /// The dense embedding vector
    Dense,
    /// The BM25-style sparse vector built from `content` (hybrid mode only)
    Sparse,
}

/// Backend-specific search tuning knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Probe count for dense ANN search
    pub nprobe: usize,
    /// Low-weight term drop ratio for sparse search
    pub drop_ratio_search: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            nprobe: 10,
            drop_ratio_search: 0.2,
        }
    }
}

/// One search request against a collection
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub field: SearchField,
    /// Query embedding; required for dense requests
    pub query_vector: Option<Vec<f32>>,
    /// Raw query text; required for sparse requests
    pub query_text: Option<String>,
    pub top_k: usize,
    pub filter: FilterExpr,
    pub params: SearchParams,
}

/// A document with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: VectorDocument,
    pub score: f32,
}

/// Capability interface for vector storage backends.
///
/// The adapter must be safe under concurrent queries; index-write phases
/// serialize per codebase above this layer.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection; `hybrid` adds the sparse-vector field
    async fn create_collection(&self, name: &str, dimension: usize, hybrid: bool) -> Result<()>;

    async fn drop_collection(&self, name: &str) -> Result<()>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Insert documents; in hybrid collections the store derives the sparse
    /// vector from each document's `content`
    async fn insert(&self, collection: &str, documents: Vec<VectorDocument>) -> Result<()>;

    /// Delete all documents matching the filter, returning the count removed
    async fn delete_by_filter(&self, collection: &str, filter: &FilterExpr) -> Result<usize>;

    /// Fetch documents matching the filter without scoring
    async fn query_by_filter(
        &self,
        collection: &str,
        filter: &FilterExpr,
        limit: usize,
    ) -> Result<Vec<VectorDocument>>;

    /// Ranked similarity search over one field
    async fn search(&self, collection: &str, request: SearchRequest) -> Result<Vec<ScoredDocument>>;

    /// Upper bound on collections, where the backend imposes one
    async fn check_collection_limit(&self) -> Result<()> {
        Ok(())
    }

    /// Provider identifier, as recorded in the index fingerprint
    fn provider_name(&self) -> &str;
}
