//! Milvus vector store adapter
//!
//! Server-backed store for production deployments. Dense search goes
//! through the Milvus ANN index; the filter expression is applied to the
//! projected rows, and sparse requests degrade to an empty ranked list
//! (rank fusion then falls back to the dense ranking) because the carried
//! SDK has no sparse-vector surface.

use crate::domain::error::{Error, Result};
use crate::domain::ports::{ScoredDocument, SearchField, SearchRequest, VectorStore};
use crate::domain::types::{FilterExpr, VectorDocument};
use async_trait::async_trait;
use milvus::client::Client;
use milvus::data::FieldColumn;
use milvus::schema::{CollectionSchemaBuilder, FieldSchema};

const CONTENT_MAX_LEN: i32 = 65535;
const PATH_MAX_LEN: i32 = 1024;

/// Milvus-backed vector store
pub struct MilvusVectorStore {
    client: Client,
}

impl MilvusVectorStore {
    /// Connect to a Milvus endpoint
    pub async fn connect(address: String, _token: Option<String>) -> Result<Self> {
        let endpoint = address
            .strip_prefix("http://")
            .or_else(|| address.strip_prefix("https://"))
            .unwrap_or(&address)
            .to_string();
        let client = Client::new(endpoint)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to connect to Milvus: {}", e)))?;
        Ok(Self { client })
    }

    async fn collection(&self, name: &str) -> Result<milvus::collection::Collection> {
        self.client
            .get_collection(name)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to get collection '{}': {}", name, e)))
    }
}

/// Stable i64 primary key derived from the string chunk id
fn primary_key_of(id: &str) -> i64 {
    let digest = md5::compute(id.as_bytes());
    i64::from_le_bytes([
        digest.0[0], digest.0[1], digest.0[2], digest.0[3], digest.0[4], digest.0[5], digest.0[6],
        digest.0[7],
    ])
    .abs()
}

#[async_trait]
impl VectorStore for MilvusVectorStore {
    async fn create_collection(&self, name: &str, dimension: usize, _hybrid: bool) -> Result<()> {
        let schema = CollectionSchemaBuilder::new(name, &format!("Collection for {}", name))
            .add_field(FieldSchema::new_primary_int64("id", "primary key", false))
            .add_field(FieldSchema::new_float_vector(
                "vector",
                "dense embedding",
                dimension as i64,
            ))
            .add_field(FieldSchema::new_varchar("chunk_id", "chunk id", 64))
            .add_field(FieldSchema::new_varchar(
                "content",
                "chunk text",
                CONTENT_MAX_LEN as i64,
            ))
            .add_field(FieldSchema::new_varchar(
                "relative_path",
                "relative path",
                PATH_MAX_LEN as i64,
            ))
            .add_field(FieldSchema::new_int64("start_line", "start line"))
            .add_field(FieldSchema::new_int64("end_line", "end line"))
            .add_field(FieldSchema::new_varchar(
                "file_extension",
                "file extension",
                32,
            ))
            .add_field(FieldSchema::new_varchar(
                "metadata",
                "chunk metadata json",
                CONTENT_MAX_LEN as i64,
            ))
            .build()
            .map_err(|e| Error::vector_db(format!("Failed to create schema: {}", e)))?;

        self.client
            .create_collection(schema, None)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to create collection: {}", e)))?;

        let collection = self.collection(name).await?;
        use milvus::index::{IndexParams, IndexType, MetricType};
        use std::collections::HashMap;
        let index_params = IndexParams::new(
            "vector_index".to_string(),
            IndexType::IvfFlat,
            MetricType::IP,
            HashMap::from([("nlist".to_string(), "1024".to_string())]),
        );
        collection
            .create_index("vector", index_params)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to create index: {}", e)))?;
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.client
            .drop_collection(name)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to drop collection: {}", e)))
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .has_collection(name)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to check collection: {}", e)))
    }

    async fn insert(&self, collection: &str, documents: Vec<VectorDocument>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let instance = self.collection(collection).await?;
        let schema = instance.schema();

        let mut ids = Vec::with_capacity(documents.len());
        let mut chunk_ids = Vec::with_capacity(documents.len());
        let mut vectors = Vec::new();
        let mut contents = Vec::with_capacity(documents.len());
        let mut relative_paths = Vec::with_capacity(documents.len());
        let mut start_lines = Vec::with_capacity(documents.len());
        let mut end_lines = Vec::with_capacity(documents.len());
        let mut extensions = Vec::with_capacity(documents.len());
        let mut metadata = Vec::with_capacity(documents.len());

        for doc in &documents {
            ids.push(primary_key_of(&doc.id));
            chunk_ids.push(doc.id.clone());
            vectors.extend_from_slice(&doc.vector);
            contents.push(doc.content.clone());
            relative_paths.push(doc.relative_path.clone());
            start_lines.push(doc.start_line as i64);
            end_lines.push(doc.end_line as i64);
            extensions.push(doc.file_extension.clone());
            metadata.push(doc.metadata.to_string());
        }

        let field = |name: &str| {
            schema
                .get_field(name)
                .ok_or_else(|| Error::vector_db(format!("Missing schema field {}", name)))
        };

        let columns = vec![
            FieldColumn::new(field("id")?, ids),
            FieldColumn::new(field("vector")?, vectors),
            FieldColumn::new(field("chunk_id")?, chunk_ids),
            FieldColumn::new(field("content")?, contents),
            FieldColumn::new(field("relative_path")?, relative_paths),
            FieldColumn::new(field("start_line")?, start_lines),
            FieldColumn::new(field("end_line")?, end_lines),
            FieldColumn::new(field("file_extension")?, extensions),
            FieldColumn::new(field("metadata")?, metadata),
        ];

        instance
            .insert(columns, None)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to insert vectors: {}", e)))?;
        Ok(())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &FilterExpr) -> Result<usize> {
        let instance = self.collection(collection).await?;
        let matching = self.query_by_filter(collection, filter, usize::MAX).await?;
        if matching.is_empty() {
            return Ok(0);
        }
        let id_list = matching
            .iter()
            .map(|doc| primary_key_of(&doc.id).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let expr = format!("id in [{}]", id_list);
        instance
            .delete(&expr, None)
            .await
            .map_err(|e| Error::vector_db(format!("Failed to delete vectors: {}", e)))?;
        Ok(matching.len())
    }

    async fn query_by_filter(
        &self,
        collection: &str,
        filter: &FilterExpr,
        limit: usize,
    ) -> Result<Vec<VectorDocument>> {
        let instance = self.collection(collection).await?;
        let load_percent = instance.get_load_percent().await.unwrap_or(0);
        if load_percent < 100 {
            let _ = instance.load(1).await;
        }

        let columns = match instance.query::<_, [&str; 0]>("id >= 0", []).await {
            Ok(columns) => columns,
            Err(_) => return Ok(Vec::new()),
        };
        let mut documents = documents_from_columns(&columns)?;
        documents.retain(|doc| filter_matches(filter, doc));
        documents.truncate(limit);
        Ok(documents)
    }

    async fn search(&self, collection: &str, request: SearchRequest) -> Result<Vec<ScoredDocument>> {
        if request.field == SearchField::Sparse {
            tracing::debug!("Sparse search unavailable on this backend; returning empty ranking");
            return Ok(Vec::new());
        }
        let query = request
            .query_vector
            .ok_or_else(|| Error::invalid_argument("Dense search requires a query vector"))?;

        let instance = self.collection(collection).await?;
        let load_percent = instance.get_load_percent().await.unwrap_or(0);
        if load_percent < 100 && instance.load(1).await.is_err() {
            return Ok(Vec::new());
        }

        use milvus::collection::SearchOption;
        use milvus::index::MetricType;
        use milvus::value::Value;

        // Over-fetch so post-filtering can still fill top_k
        let fetch = (request.top_k * 4).max(request.top_k) as i32;
        let search_option = SearchOption::new();
        let results = instance
            .search(
                vec![Value::from(query)],
                "vector",
                fetch,
                MetricType::IP,
                vec![
                    "chunk_id",
                    "content",
                    "relative_path",
                    "start_line",
                    "end_line",
                    "file_extension",
                    "metadata",
                ],
                &search_option,
            )
            .await
            .map_err(|e| Error::vector_db(format!("Failed to search: {}", e)))?;

        let mut scored = Vec::new();
        for result in results {
            let documents = documents_from_columns(&result.field)?;
            for (i, document) in documents.into_iter().enumerate() {
                if !filter_matches(&request.filter, &document) {
                    continue;
                }
                let score = result.score.get(i).copied().unwrap_or(0.0);
                scored.push(ScoredDocument { document, score });
            }
        }
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(request.top_k);
        Ok(scored)
    }

    fn provider_name(&self) -> &str {
        "milvus"
    }
}

fn filter_matches(filter: &FilterExpr, doc: &VectorDocument) -> bool {
    let language = doc
        .metadata
        .get("language")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    filter.matches(&doc.relative_path, &doc.file_extension, language)
}

/// Rebuild documents from projected field columns
fn documents_from_columns(columns: &[FieldColumn]) -> Result<Vec<VectorDocument>> {
    let string_column = |name: &str| -> Result<Vec<String>> {
        columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::vector_db(format!("{} field not found in result", name)))?
            .value
            .clone()
            .try_into()
            .map_err(|e| Error::vector_db(format!("Failed to extract {}: {:?}", name, e)))
    };
    let int_column = |name: &str| -> Result<Vec<i64>> {
        columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::vector_db(format!("{} field not found in result", name)))?
            .value
            .clone()
            .try_into()
            .map_err(|e| Error::vector_db(format!("Failed to extract {}: {:?}", name, e)))
    };

    let chunk_ids = string_column("chunk_id")?;
    let contents = string_column("content")?;
    let relative_paths = string_column("relative_path")?;
    let start_lines = int_column("start_line")?;
    let end_lines = int_column("end_line")?;
    let extensions = string_column("file_extension")?;
    let metadata = string_column("metadata")?;

    let mut documents = Vec::with_capacity(chunk_ids.len());
    for i in 0..chunk_ids.len() {
        documents.push(VectorDocument {
            id: chunk_ids[i].clone(),
            vector: Vec::new(),
            content: contents.get(i).cloned().unwrap_or_default(),
            relative_path: relative_paths.get(i).cloned().unwrap_or_default(),
            start_line: start_lines.get(i).copied().unwrap_or(0) as u32,
            end_line: end_lines.get(i).copied().unwrap_or(0) as u32,
            file_extension: extensions.get(i).cloned().unwrap_or_default(),
            metadata: metadata
                .get(i)
                .and_then(|m| serde_json::from_str(m).ok())
                .unwrap_or(serde_json::Value::Null),
        });
    }
    Ok(documents)
}
