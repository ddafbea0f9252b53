//! In-memory vector store
//!
//! Default backend for tests and single-process runs. Dense search is
//! brute-force cosine similarity; sparse search scores documents with BM25
//! over their content, which is what the hybrid schema's sparse vector
//! encodes in a server-side store.

use crate::domain::error::{Error, Result};
use crate::domain::ports::{ScoredDocument, SearchField, SearchRequest, VectorStore};
use crate::domain::types::{FilterExpr, VectorDocument};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// BM25 parameters
#[derive(Debug, Clone)]
struct Bm25Params {
    k1: f32,
    b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

struct Collection {
    dimension: usize,
    hybrid: bool,
    documents: Vec<VectorDocument>,
}

/// Brute-force in-memory store
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, name: &str, dimension: usize, hybrid: bool) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                hybrid,
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn insert(&self, collection: &str, documents: Vec<VectorDocument>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("Unknown collection {}", collection)))?;
        for document in documents {
            if document.vector.len() != collection.dimension {
                return Err(Error::vector_db(format!(
                    "Vector for {} has {} dimensions, collection expects {}",
                    document.id,
                    document.vector.len(),
                    collection.dimension
                )));
            }
            collection.documents.retain(|d| d.id != document.id);
            collection.documents.push(document);
        }
        Ok(())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &FilterExpr) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("Unknown collection {}", collection)))?;
        let before = collection.documents.len();
        collection
            .documents
            .retain(|doc| !matches_document(filter, doc));
        Ok(before - collection.documents.len())
    }

    async fn query_by_filter(
        &self,
        collection: &str,
        filter: &FilterExpr,
        limit: usize,
    ) -> Result<Vec<VectorDocument>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(collection)
            .ok_or_else(|| Error::vector_db(format!("Unknown collection {}", collection)))?;
        Ok(collection
            .documents
            .iter()
            .filter(|doc| matches_document(filter, doc))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search(&self, collection: &str, request: SearchRequest) -> Result<Vec<ScoredDocument>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(collection)
            .ok_or_else(|| Error::vector_db(format!("Unknown collection {}", collection)))?;

        let candidates: Vec<&VectorDocument> = collection
            .documents
            .iter()
            .filter(|doc| matches_document(&request.filter, doc))
            .collect();

        let mut scored: Vec<ScoredDocument> = match request.field {
            SearchField::Dense => {
                let query = request.query_vector.as_deref().ok_or_else(|| {
                    Error::invalid_argument("Dense search requires a query vector")
                })?;
                candidates
                    .into_iter()
                    .map(|doc| ScoredDocument {
                        document: doc.clone(),
                        score: cosine_similarity(query, &doc.vector),
                    })
                    .collect()
            }
            SearchField::Sparse => {
                if !collection.hybrid {
                    return Err(Error::vector_db(
                        "Sparse search requires a hybrid collection",
                    ));
                }
                let query = request.query_text.as_deref().ok_or_else(|| {
                    Error::invalid_argument("Sparse search requires query text")
                })?;
                let scorer = Bm25Scorer::new(&candidates, Bm25Params::default());
                candidates
                    .into_iter()
                    .map(|doc| ScoredDocument {
                        document: doc.clone(),
                        score: scorer.score(&doc.content, query),
                    })
                    .filter(|hit| hit.score > 0.0)
                    .collect()
            }
        };

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(request.top_k);
        Ok(scored)
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

fn matches_document(filter: &FilterExpr, doc: &VectorDocument) -> bool {
    let language = doc
        .metadata
        .get("language")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    filter.matches(&doc.relative_path, &doc.file_extension, language)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// BM25 scorer over a candidate set
struct Bm25Scorer {
    document_freq: HashMap<String, usize>,
    total_docs: usize,
    avg_doc_len: f32,
    params: Bm25Params,
}

impl Bm25Scorer {
    fn new(documents: &[&VectorDocument], params: Bm25Params) -> Self {
        let total_docs = documents.len();
        let mut document_freq = HashMap::new();
        let mut total_length = 0.0;

        for doc in documents {
            let tokens = tokenize(&doc.content);
            total_length += tokens.len() as f32;
            let unique: HashSet<String> = tokens.into_iter().collect();
            for term in unique {
                *document_freq.entry(term).or_insert(0) += 1;
            }
        }

        let avg_doc_len = if total_docs > 0 {
            total_length / total_docs as f32
        } else {
            0.0
        };

        Self {
            document_freq,
            total_docs,
            avg_doc_len,
            params,
        }
    }

    fn score(&self, content: &str, query: &str) -> f32 {
        let query_terms = tokenize(query);
        let doc_terms = tokenize(content);
        let doc_length = doc_terms.len() as f32;

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for term in &doc_terms {
            *term_freq.entry(term.as_str()).or_insert(0) += 1;
        }

        let mut score = 0.0;
        for term in &query_terms {
            let tf = *term_freq.get(term.as_str()).unwrap_or(&0) as f32;
            let df = *self.document_freq.get(term).unwrap_or(&0) as f32;
            if df == 0.0 || tf == 0.0 {
                continue;
            }
            let idf = if self.total_docs > 1 {
                ((self.total_docs as f32 - df + 0.5) / (df + 0.5) + 1.0).ln()
            } else {
                1.0
            };
            let tf_normalized = (tf * (self.params.k1 + 1.0))
                / (tf
                    + self.params.k1
                        * (1.0 - self.params.b
                            + self.params.b * doc_length / self.avg_doc_len.max(1.0)));
            score += idf * tf_normalized;
        }
        score
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| token.len() > 2)
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{FilterCond, FilterField};

    fn doc(id: &str, path: &str, content: &str, vector: Vec<f32>) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            vector,
            content: content.to_string(),
            relative_path: path.to_string(),
            start_line: 1,
            end_line: 5,
            file_extension: ".rs".to_string(),
            metadata: serde_json::json!({ "language": "rust" }),
        }
    }

    #[tokio::test]
    async fn dense_search_ranks_by_cosine() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 2, true).await.unwrap();
        store
            .insert(
                "c",
                vec![
                    doc("near", "a.rs", "alpha", vec![1.0, 0.0]),
                    doc("far", "b.rs", "beta", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .search(
                "c",
                SearchRequest {
                    field: SearchField::Dense,
                    query_vector: Some(vec![1.0, 0.1]),
                    query_text: None,
                    top_k: 2,
                    filter: FilterExpr::new(),
                    params: Default::default(),
                },
            )
            .await
            .unwrap();
        assert_eq!(hits[0].document.id, "near");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn sparse_search_matches_terms() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 2, true).await.unwrap();
        store
            .insert(
                "c",
                vec![
                    doc("auth", "auth.rs", "fn validate_token(token: &str)", vec![0.0, 0.0]),
                    doc("math", "math.rs", "fn add(a: i32, b: i32)", vec![0.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .search(
                "c",
                SearchRequest {
                    field: SearchField::Sparse,
                    query_vector: None,
                    query_text: Some("validate token".to_string()),
                    top_k: 10,
                    filter: FilterExpr::new(),
                    params: Default::default(),
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, "auth");
    }

    #[tokio::test]
    async fn delete_by_filter_removes_matching_documents() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 2, false).await.unwrap();
        store
            .insert(
                "c",
                vec![
                    doc("one", "src/a.rs", "x", vec![0.0, 0.0]),
                    doc("two", "src/b.rs", "y", vec![0.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let filter = FilterExpr::new().with(FilterCond::Eq(
            FilterField::RelativePath,
            "src/a.rs".to_string(),
        ));
        let removed = store.delete_by_filter("c", &filter).await.unwrap();
        assert_eq!(removed, 1);
        let rest = store
            .query_by_filter("c", &FilterExpr::new(), 10)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "two");
    }

    #[tokio::test]
    async fn insert_upserts_by_id() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 2, false).await.unwrap();
        store
            .insert("c", vec![doc("one", "a.rs", "old", vec![0.0, 0.0])])
            .await
            .unwrap();
        store
            .insert("c", vec![doc("one", "a.rs", "new", vec![0.0, 0.0])])
            .await
            .unwrap();
        let docs = store
            .query_by_filter("c", &FilterExpr::new(), 10)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "new");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 4, false).await.unwrap();
        let result = store
            .insert("c", vec![doc("one", "a.rs", "x", vec![0.0, 0.0])])
            .await;
        assert!(result.is_err());
    }
}
