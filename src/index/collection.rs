//! Collection naming and completion markers
//!
//! The collection name is a pure function of the canonical codebase path
//! and the hybrid flag. The completion marker is a reserved document written
//! after a successful build whose payload proves the collection matches the
//! runtime fingerprint.

use crate::domain::ports::VectorStore;
use crate::domain::types::{
    CompletionMarker, FilterCond, FilterExpr, FilterField, IndexFingerprint, VectorDocument,
    MARKER_DOCUMENT_ID, MARKER_FILE_EXTENSION, MARKER_KIND, MARKER_RELATIVE_PATH,
};
use crate::domain::error::Result;
use crate::infrastructure::paths::path_digest;

const HYBRID_COLLECTION_PREFIX: &str = "hybrid_code_chunks_";
const DENSE_COLLECTION_PREFIX: &str = "code_chunks_";

/// Collection name for a codebase: prefix + first 8 hex of the canonical
/// path digest
pub fn collection_name(canonical_path: &str, hybrid: bool) -> String {
    let digest = path_digest(canonical_path);
    let prefix = if hybrid {
        HYBRID_COLLECTION_PREFIX
    } else {
        DENSE_COLLECTION_PREFIX
    };
    format!("{}{}", prefix, &digest[..8])
}

/// Filter condition excluding the completion marker; appended to every
/// search and delete expression the engine issues
pub fn marker_exclusion() -> FilterCond {
    FilterCond::Ne(FilterField::FileExtension, MARKER_FILE_EXTENSION.to_string())
}

/// Build the marker document for a finished build
pub fn marker_document(
    canonical_path: &str,
    fingerprint: &IndexFingerprint,
    indexed_files: usize,
    total_chunks: usize,
    run_id: &str,
    dimension: usize,
) -> VectorDocument {
    let marker = CompletionMarker {
        kind: MARKER_KIND.to_string(),
        codebase_path: canonical_path.to_string(),
        fingerprint: fingerprint.clone(),
        indexed_files,
        total_chunks,
        completed_at: chrono::Utc::now().to_rfc3339(),
        run_id: run_id.to_string(),
    };
    VectorDocument {
        id: MARKER_DOCUMENT_ID.to_string(),
        vector: vec![0.0; dimension],
        content: String::new(),
        relative_path: MARKER_RELATIVE_PATH.to_string(),
        start_line: 0,
        end_line: 0,
        file_extension: MARKER_FILE_EXTENSION.to_string(),
        metadata: serde_json::to_value(&marker).unwrap_or(serde_json::Value::Null),
    }
}

/// Replace any prior marker with a fresh one
pub async fn write_marker(
    store: &dyn VectorStore,
    collection: &str,
    document: VectorDocument,
) -> Result<()> {
    let marker_filter = FilterExpr::new().with(FilterCond::Eq(
        FilterField::FileExtension,
        MARKER_FILE_EXTENSION.to_string(),
    ));
    let _ = store.delete_by_filter(collection, &marker_filter).await;
    store.insert(collection, vec![document]).await
}

/// Read the first valid marker row, or `None` when absent or malformed
pub async fn read_marker(
    store: &dyn VectorStore,
    collection: &str,
) -> Result<Option<CompletionMarker>> {
    if !store.collection_exists(collection).await? {
        return Ok(None);
    }
    let marker_filter = FilterExpr::new().with(FilterCond::Eq(
        FilterField::FileExtension,
        MARKER_FILE_EXTENSION.to_string(),
    ));
    let rows = store.query_by_filter(collection, &marker_filter, 4).await?;
    Ok(rows
        .iter()
        .find_map(|row| CompletionMarker::from_metadata(&row.metadata)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_is_pure_and_mode_aware() {
        let hybrid = collection_name("/home/dev/repo", true);
        let dense = collection_name("/home/dev/repo", false);
        assert!(hybrid.starts_with("hybrid_code_chunks_"));
        assert!(dense.starts_with("code_chunks_"));
        assert_eq!(hybrid, collection_name("/home/dev/repo", true));
        assert_eq!(hybrid.len(), "hybrid_code_chunks_".len() + 8);
        assert_ne!(hybrid, collection_name("/home/dev/other", true));
    }

    #[test]
    fn marker_document_carries_zero_vector_and_payload() {
        let fingerprint = IndexFingerprint {
            embedding_provider: "openai".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimension: 4,
            vector_store_provider: "memory".into(),
            schema_version: crate::domain::types::SchemaVersion::HybridV3,
        };
        let doc = marker_document("/repo", &fingerprint, 3, 17, "run-1", 4);
        assert_eq!(doc.vector, vec![0.0; 4]);
        assert_eq!(doc.file_extension, MARKER_FILE_EXTENSION);
        let marker = CompletionMarker::from_metadata(&doc.metadata).unwrap();
        assert_eq!(marker.indexed_files, 3);
        assert_eq!(marker.total_chunks, 17);
    }
}
