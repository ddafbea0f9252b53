//! The indexing engine
//!
//! Owns the splitter, the embedding handle, and the vector-store handle;
//! resolves per-codebase ignore state; drives index, reindex, and
//! incremental sync; serves semantic search with rank fusion in hybrid
//! mode.

use crate::chunking::languages::is_indexable_extension;
use crate::chunking::{Splitter, SplitterKind};
use crate::config::Config;
use crate::domain::error::{Error, Result};
use crate::domain::ports::{
    EmbeddingProvider, ScoredDocument, SearchField, SearchParams, SearchRequest, VectorStore,
};
use crate::domain::types::{
    ChangeReport, Chunk, ChunkMetadata, CompletionMarker, FilterCond, FilterExpr, FilterField,
    IndexBuildOutcome, IndexFingerprint, IndexStats, Language, SchemaVersion, SearchHit,
    SyncChanges, VectorDocument,
};
use crate::index::collection::{
    collection_name, marker_document, marker_exclusion, read_marker, write_marker,
};
use crate::index::ignore::{CompiledIgnore, IgnoreState};
use crate::infrastructure::constants::RRF_K;
use crate::infrastructure::paths::{normalize_separators, StatePaths};
use crate::sync::synchronizer::FileSynchronizer;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Progress callback invoked with a 0..=100 percentage during builds
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// Result of one index build
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub stats: IndexStats,
    /// Sorted unique relative paths that produced chunks
    pub manifest: Vec<String>,
}

/// The indexing-and-retrieval engine
pub struct Context {
    config: Arc<Config>,
    embedding: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    state_paths: StatePaths,
    ignore: Mutex<IgnoreState>,
    synchronizers: Mutex<HashMap<String, Arc<Mutex<FileSynchronizer>>>>,
}

impl Context {
    pub fn new(
        config: Arc<Config>,
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        state_paths: StatePaths,
    ) -> Self {
        let ignore = IgnoreState::new(&config.custom_ignore_patterns);
        Self {
            config,
            embedding,
            store,
            state_paths,
            ignore: Mutex::new(ignore),
            synchronizers: Mutex::new(HashMap::new()),
        }
    }

    pub fn hybrid_mode(&self) -> bool {
        self.config.hybrid_mode
    }

    pub fn state_paths(&self) -> &StatePaths {
        &self.state_paths
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// The fingerprint this runtime stamps onto indexes it builds
    pub fn runtime_fingerprint(&self) -> IndexFingerprint {
        IndexFingerprint {
            embedding_provider: self.embedding.provider_name().to_string(),
            embedding_model: self.embedding.model_name().to_string(),
            embedding_dimension: self.embedding.dimensions(),
            vector_store_provider: self.store.provider_name().to_string(),
            schema_version: if self.config.hybrid_mode {
                SchemaVersion::HybridV3
            } else {
                SchemaVersion::DenseV3
            },
        }
    }

    /// Collection name for a canonical codebase path
    pub fn collection_for(&self, canonical_path: &str) -> String {
        collection_name(canonical_path, self.config.hybrid_mode)
    }

    pub async fn has_collection(&self, canonical_path: &str) -> Result<bool> {
        self.store
            .collection_exists(&self.collection_for(canonical_path))
            .await
    }

    pub async fn check_collection_limit(&self) -> Result<()> {
        self.store.check_collection_limit().await
    }

    /// Read the completion marker of a codebase's collection
    pub async fn completion_marker(
        &self,
        canonical_path: &str,
    ) -> Result<Option<CompletionMarker>> {
        read_marker(self.store.as_ref(), &self.collection_for(canonical_path)).await
    }

    // ------------------------------------------------------------------
    // Ignore state
    // ------------------------------------------------------------------

    pub async fn add_runtime_ignore_patterns(&self, patterns: &[String]) {
        self.ignore.lock().await.add_runtime_patterns(patterns);
    }

    /// Re-read the codebase's ignore files and return the effective list
    pub async fn reload_ignore_rules_for_codebase(
        &self,
        canonical_path: &str,
    ) -> Result<Vec<String>> {
        self.ignore.lock().await.reload_for_codebase(canonical_path)
    }

    pub async fn ignore_rules_version(&self) -> u64 {
        self.ignore.lock().await.rules_version()
    }

    pub async fn ignore_control_signature(&self, canonical_path: &str) -> String {
        self.ignore.lock().await.control_signature(canonical_path)
    }

    async fn matcher_for(&self, canonical_path: &str) -> Result<Arc<CompiledIgnore>> {
        self.ignore.lock().await.matcher_for(canonical_path)
    }

    /// Compiled ignore matcher for external walks (sidecar builds)
    pub async fn matcher_handle(&self, canonical_path: &str) -> Result<Arc<CompiledIgnore>> {
        self.matcher_for(canonical_path).await
    }

    // ------------------------------------------------------------------
    // Synchronizers
    // ------------------------------------------------------------------

    /// The codebase's synchronizer, created and initialized on first use
    pub async fn synchronizer_for(
        &self,
        canonical_path: &str,
    ) -> Result<Arc<Mutex<FileSynchronizer>>> {
        let mut synchronizers = self.synchronizers.lock().await;
        if let Some(sync) = synchronizers.get(canonical_path) {
            return Ok(Arc::clone(sync));
        }
        let matcher = self.matcher_for(canonical_path).await?;
        let state_file = self.state_paths.merkle_file(canonical_path)?;
        let mut sync = FileSynchronizer::new(canonical_path, matcher, state_file, 0);
        sync.init().await?;
        let sync = Arc::new(Mutex::new(sync));
        synchronizers.insert(canonical_path.to_string(), Arc::clone(&sync));
        Ok(sync)
    }

    /// Drop the in-memory synchronizer so the next use rebuilds it with the
    /// current effective ignore patterns
    pub async fn reset_synchronizer(&self, canonical_path: &str) {
        self.synchronizers.lock().await.remove(canonical_path);
    }

    /// Probe the change set without persisting synchronizer state
    pub async fn peek_changes(&self, canonical_path: &str) -> Result<ChangeReport> {
        let sync = self.synchronizer_for(canonical_path).await?;
        let guard = sync.lock().await;
        guard.peek_changes().await
    }

    // ------------------------------------------------------------------
    // Index build
    // ------------------------------------------------------------------

    /// Build or rebuild the index of a codebase
    pub async fn index_codebase(
        &self,
        canonical_path: &str,
        force_reindex: bool,
        splitter_kind: SplitterKind,
        custom_extensions: &[String],
        progress: Option<ProgressFn>,
    ) -> Result<IndexReport> {
        let collection = self.collection_for(canonical_path);
        let dimension = self.embedding.dimensions();

        if force_reindex && self.store.collection_exists(&collection).await? {
            self.store.drop_collection(&collection).await?;
        }
        if !self.store.collection_exists(&collection).await? {
            self.store
                .create_collection(&collection, dimension, self.config.hybrid_mode)
                .await?;
        }

        let matcher = self.matcher_for(canonical_path).await?;
        let files = discover_files(Path::new(canonical_path), &matcher, custom_extensions);
        let total_files = files.len().max(1);
        let splitter = Splitter::default().with_kind(splitter_kind);

        let mut batch: Vec<Chunk> = Vec::new();
        let mut manifest: Vec<String> = Vec::new();
        let mut total_chunks = 0usize;
        let mut indexed_files = 0usize;
        let mut outcome = IndexBuildOutcome::Completed;

        'files: for (processed, (abs_path, rel_path)) in files.iter().enumerate() {
            let content = match tokio::fs::read_to_string(abs_path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {}: {}", abs_path.display(), e);
                    continue;
                }
            };

            let extension = extension_of(rel_path);
            let language = Language::from_extension(extension.trim_start_matches('.'));
            let chunks = splitter.split_file(
                &content,
                language,
                &abs_path.to_string_lossy(),
                rel_path,
            );
            if chunks.is_empty() {
                continue;
            }

            indexed_files += 1;
            manifest.push(rel_path.clone());

            for chunk in chunks {
                if total_chunks >= self.config.chunk_limit {
                    tracing::warn!(
                        "Chunk limit {} reached while indexing {}",
                        self.config.chunk_limit,
                        canonical_path
                    );
                    outcome = IndexBuildOutcome::LimitReached;
                    break 'files;
                }
                batch.push(chunk);
                total_chunks += 1;
                if batch.len() >= self.config.embedding_batch_size {
                    self.flush_batch(&collection, canonical_path, &mut batch)
                        .await;
                }
            }

            if let Some(progress) = &progress {
                progress((processed + 1) as f32 / total_files as f32 * 100.0);
            }
        }

        if !batch.is_empty() {
            self.flush_batch(&collection, canonical_path, &mut batch)
                .await;
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let marker = marker_document(
            canonical_path,
            &self.runtime_fingerprint(),
            indexed_files,
            total_chunks,
            &run_id,
            dimension,
        );
        write_marker(self.store.as_ref(), &collection, marker).await?;

        manifest.sort();
        manifest.dedup();
        Ok(IndexReport {
            stats: IndexStats {
                indexed_files,
                total_chunks,
                status: outcome,
            },
            manifest,
        })
    }

    /// Embed and insert one batch. The buffer is always cleared, even when
    /// the batch fails, so chunks are never submitted twice.
    async fn flush_batch(&self, collection: &str, canonical_path: &str, batch: &mut Vec<Chunk>) {
        let chunks = std::mem::take(batch);
        if chunks.is_empty() {
            return;
        }
        if let Err(e) = self.embed_and_insert(collection, canonical_path, &chunks).await {
            tracing::error!(
                "Failed to index batch of {} chunks for {}: {}",
                chunks.len(),
                canonical_path,
                e
            );
        }
    }

    async fn embed_and_insert(
        &self,
        collection: &str,
        canonical_path: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }

        let indexed_at = chrono::Utc::now().to_rfc3339();
        let mut per_file_index: HashMap<String, usize> = HashMap::new();
        let mut documents = Vec::with_capacity(chunks.len());

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let relative_path = self.relative_of(canonical_path, &chunk.file_path);
            let chunk_index = per_file_index.entry(relative_path.clone()).or_insert(0);
            let metadata = ChunkMetadata {
                codebase_path: canonical_path.to_string(),
                language: chunk.language.as_str().to_string(),
                chunk_index: *chunk_index,
                indexed_at: indexed_at.clone(),
                breadcrumbs: chunk.breadcrumbs.clone(),
                symbol_id: chunk.symbol_id.clone(),
                symbol_label: chunk.symbol_label.clone(),
            };
            *chunk_index += 1;

            documents.push(VectorDocument {
                id: chunk_id(&relative_path, chunk.start_line, chunk.end_line, &chunk.content),
                vector: embedding.vector,
                content: chunk.content.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                file_extension: extension_of(&relative_path).to_string(),
                relative_path,
                metadata: serde_json::to_value(&metadata)?,
            });
        }

        self.store.insert(collection, documents).await
    }

    fn relative_of(&self, canonical_path: &str, file_path: &str) -> String {
        crate::infrastructure::paths::relative_to_root(
            Path::new(canonical_path),
            Path::new(file_path),
        )
        .unwrap_or_else(|_| normalize_separators(file_path))
    }

    // ------------------------------------------------------------------
    // Incremental sync
    // ------------------------------------------------------------------

    /// Re-embed only what changed since the last synchronizer snapshot
    pub async fn incremental_sync(&self, canonical_path: &str) -> Result<SyncChanges> {
        let sync = self.synchronizer_for(canonical_path).await?;
        let report = {
            let mut guard = sync.lock().await;
            guard.check_for_changes().await?
        };

        let collection = self.collection_for(canonical_path);
        if !self.store.collection_exists(&collection).await? {
            return Err(Error::not_found(format!(
                "No collection for {}",
                canonical_path
            )));
        }

        // Stale vectors of removed and modified files go first
        for path in report.removed.iter().chain(report.modified.iter()) {
            let filter = FilterExpr::new()
                .with(FilterCond::Eq(FilterField::RelativePath, path.clone()))
                .with(marker_exclusion());
            if let Err(e) = self.store.delete_by_filter(&collection, &filter).await {
                tracing::warn!("Failed to delete vectors for {}: {}", path, e);
            }
        }

        // Then the standard pipeline over added ∪ modified
        let mut to_index: Vec<String> = report.added.clone();
        to_index.extend(report.modified.iter().cloned());
        if !to_index.is_empty() {
            self.index_files(canonical_path, &collection, &to_index)
                .await?;
        }

        Ok(SyncChanges {
            added: report.added,
            removed: report.removed,
            modified: report.modified,
        })
    }

    async fn index_files(
        &self,
        canonical_path: &str,
        collection: &str,
        relative_paths: &[String],
    ) -> Result<()> {
        let splitter = Splitter::default();
        let mut batch: Vec<Chunk> = Vec::new();

        for rel_path in relative_paths {
            let extension = extension_of(rel_path);
            if !is_indexable_extension(extension.trim_start_matches('.')) {
                continue;
            }
            let abs_path = Path::new(canonical_path).join(rel_path);
            let content = match tokio::fs::read_to_string(&abs_path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {}: {}", abs_path.display(), e);
                    continue;
                }
            };
            let language = Language::from_extension(extension.trim_start_matches('.'));
            let chunks =
                splitter.split_file(&content, language, &abs_path.to_string_lossy(), rel_path);
            for chunk in chunks {
                batch.push(chunk);
                if batch.len() >= self.config.embedding_batch_size {
                    self.flush_batch(collection, canonical_path, &mut batch)
                        .await;
                }
            }
        }
        if !batch.is_empty() {
            self.flush_batch(collection, canonical_path, &mut batch)
                .await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Clear
    // ------------------------------------------------------------------

    /// Drop the collection and the synchronizer snapshot
    pub async fn clear_index(&self, canonical_path: &str) -> Result<()> {
        let collection = self.collection_for(canonical_path);
        if self.store.collection_exists(&collection).await? {
            self.store.drop_collection(&collection).await?;
        }
        let state_file = self.state_paths.merkle_file(canonical_path)?;
        FileSynchronizer::delete_snapshot(&state_file)?;
        self.reset_synchronizer(canonical_path).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Semantic search over a codebase's collection.
    ///
    /// Returns an empty list when the collection does not exist. The
    /// completion-marker exclusion is always appended to the caller's
    /// filter.
    pub async fn semantic_search(
        &self,
        canonical_path: &str,
        query: &str,
        top_k: usize,
        threshold: f32,
        filter: FilterExpr,
    ) -> Result<Vec<SearchHit>> {
        let collection = self.collection_for(canonical_path);
        if !self.store.collection_exists(&collection).await? {
            return Ok(Vec::new());
        }

        let mut filter = filter;
        filter.push(marker_exclusion());

        let query_embedding = self.embedding.embed(query).await?;
        let dense_request = SearchRequest {
            field: SearchField::Dense,
            query_vector: Some(query_embedding.vector),
            query_text: None,
            top_k,
            filter: filter.clone(),
            params: SearchParams::default(),
        };

        let scored = if self.config.hybrid_mode {
            let sparse_request = SearchRequest {
                field: SearchField::Sparse,
                query_vector: None,
                query_text: Some(query.to_string()),
                top_k,
                filter: filter.clone(),
                params: SearchParams::default(),
            };
            let dense = self.store.search(&collection, dense_request).await?;
            let sparse = self.store.search(&collection, sparse_request).await?;
            fuse_reciprocal_rank(dense, sparse, top_k)
        } else {
            let mut dense = self.store.search(&collection, dense_request).await?;
            dense.truncate(top_k);
            dense
        };

        Ok(scored
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .map(project_hit)
            .collect())
    }
}

/// Reciprocal Rank Fusion of two ranked lists
fn fuse_reciprocal_rank(
    dense: Vec<ScoredDocument>,
    sparse: Vec<ScoredDocument>,
    top_k: usize,
) -> Vec<ScoredDocument> {
    let mut fused: HashMap<String, (VectorDocument, f32)> = HashMap::new();
    for ranked in [dense, sparse] {
        for (rank, hit) in ranked.into_iter().enumerate() {
            let rrf = 1.0 / (RRF_K + rank as f32 + 1.0);
            fused
                .entry(hit.document.id.clone())
                .and_modify(|(_, score)| *score += rrf)
                .or_insert((hit.document, rrf));
        }
    }
    let mut merged: Vec<ScoredDocument> = fused
        .into_values()
        .map(|(document, score)| ScoredDocument { document, score })
        .collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
    merged.truncate(top_k);
    merged
}

fn project_hit(scored: ScoredDocument) -> SearchHit {
    let doc = scored.document;
    let metadata: Option<ChunkMetadata> = serde_json::from_value(doc.metadata).ok();
    SearchHit {
        content: doc.content,
        relative_path: doc.relative_path,
        start_line: doc.start_line,
        end_line: doc.end_line,
        language: metadata
            .as_ref()
            .map(|m| m.language.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        score: scored.score,
        breadcrumbs: metadata.as_ref().and_then(|m| m.breadcrumbs.clone()),
        indexed_at: metadata.as_ref().map(|m| m.indexed_at.clone()),
        symbol_id: metadata.as_ref().and_then(|m| m.symbol_id.clone()),
        symbol_label: metadata.and_then(|m| m.symbol_label),
    }
}

/// Stable chunk id: first 16 hex of
/// SHA-256(`relativePath:startLine:endLine:content`)
pub fn chunk_id(relative_path: &str, start_line: u32, end_line: u32, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}:", relative_path, start_line, end_line).as_bytes());
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Extension of a relative path including the leading dot
fn extension_of(path: &str) -> &str {
    path.rfind('.')
        .filter(|idx| !path[idx + 1..].contains('/'))
        .map(|idx| &path[idx..])
        .unwrap_or("")
}

/// Walk the tree collecting indexable files under the ignore matcher
fn discover_files(
    root: &Path,
    matcher: &CompiledIgnore,
    custom_extensions: &[String],
) -> Vec<(PathBuf, String)> {
    let mut files = Vec::new();
    walk_collect(root, root, matcher, custom_extensions, &mut files);
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}

fn walk_collect(
    root: &Path,
    dir: &Path,
    matcher: &CompiledIgnore,
    custom_extensions: &[String],
    out: &mut Vec<(PathBuf, String)>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot enumerate {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map(|rel| normalize_separators(&rel.to_string_lossy()))
            .unwrap_or_default();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if !matcher.is_ignored(&relative, true) {
                walk_collect(root, &path, matcher, custom_extensions, out);
            }
        } else if file_type.is_file() && !matcher.is_ignored(&relative, false) {
            let ext = extension_of(&relative);
            let bare = ext.trim_start_matches('.');
            let custom_hit = custom_extensions
                .iter()
                .any(|c| c.trim_start_matches('.') == bare);
            if is_indexable_extension(bare) || custom_hit {
                out.push((path, relative));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> ScoredDocument {
        ScoredDocument {
            document: VectorDocument {
                id: id.to_string(),
                vector: vec![],
                content: String::new(),
                relative_path: format!("{}.rs", id),
                start_line: 1,
                end_line: 2,
                file_extension: ".rs".to_string(),
                metadata: serde_json::Value::Null,
            },
            score: 0.0,
        }
    }

    #[test]
    fn rrf_prefers_documents_ranked_in_both_lists() {
        let dense = vec![doc("a"), doc("b"), doc("c")];
        let sparse = vec![doc("b"), doc("d")];
        let fused = fuse_reciprocal_rank(dense, sparse, 10);
        assert_eq!(fused[0].document.id, "b");
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn chunk_id_is_deterministic_and_content_sensitive() {
        let one = chunk_id("src/a.rs", 1, 10, "fn a() {}");
        let two = chunk_id("src/a.rs", 1, 10, "fn a() {}");
        assert_eq!(one, two);
        assert_eq!(one.len(), 16);
        assert_ne!(one, chunk_id("src/a.rs", 1, 10, "fn b() {}"));
        assert_ne!(one, chunk_id("src/b.rs", 1, 10, "fn a() {}"));
    }

    #[test]
    fn extension_includes_leading_dot() {
        assert_eq!(extension_of("src/main.rs"), ".rs");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of("a.b/file"), "");
    }
}
