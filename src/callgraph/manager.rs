//! Sidecar lifecycle: build, persist, load, delta rebuild, outline

use crate::callgraph::builder::build_graph;
use crate::callgraph::{CallGraphSidecar, LineSpan, SymbolNode, SIDECAR_FORMAT_V3};
use crate::chunking::languages::{call_graph_build_extensions, supports_file_outline};
use crate::domain::error::{Error, Result};
use crate::domain::types::{IndexFingerprint, SidecarInfo, SyncChanges};
use crate::index::ignore::CompiledIgnore;
use crate::infrastructure::paths::StatePaths;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Owner of per-codebase call-graph sidecars
pub struct CallGraphSidecarManager {
    state_paths: StatePaths,
    fingerprint: IndexFingerprint,
}

impl CallGraphSidecarManager {
    pub fn new(state_paths: StatePaths, fingerprint: IndexFingerprint) -> Self {
        Self {
            state_paths,
            fingerprint,
        }
    }

    /// Build the sidecar for a codebase and persist it with sorted lists
    pub async fn build(
        &self,
        canonical_path: &str,
        matcher: std::sync::Arc<CompiledIgnore>,
    ) -> Result<CallGraphSidecar> {
        let root = Path::new(canonical_path).to_path_buf();
        let graph =
            tokio::task::spawn_blocking(move || build_graph(&root, &matcher))
                .await
                .map_err(|e| Error::internal(format!("Sidecar build task failed: {}", e)))??;

        let mut sidecar = CallGraphSidecar {
            format_version: SIDECAR_FORMAT_V3.to_string(),
            codebase_path: canonical_path.to_string(),
            built_at: chrono::Utc::now().to_rfc3339(),
            fingerprint: self.fingerprint.clone(),
            nodes: graph.nodes,
            edges: graph.edges,
            notes: graph.notes,
        };
        sidecar.sort_for_write();

        let path = self.state_paths.call_graph_file(canonical_path)?;
        let body = serde_json::to_string_pretty(&sidecar)?;
        std::fs::write(&path, body)?;
        Ok(sidecar)
    }

    /// Load a sidecar, discarding files whose schema version differs from
    /// the runtime fingerprint
    pub fn load(&self, canonical_path: &str) -> Result<Option<CallGraphSidecar>> {
        let path = self.state_paths.call_graph_file(canonical_path)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let sidecar: CallGraphSidecar = match serde_json::from_str(&content) {
            Ok(sidecar) => sidecar,
            Err(e) => {
                tracing::warn!("Discarding unreadable sidecar {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        if sidecar.fingerprint.schema_version != self.fingerprint.schema_version {
            tracing::info!(
                "Discarding sidecar for {}: schema {} differs from runtime {}",
                canonical_path,
                sidecar.fingerprint.schema_version,
                self.fingerprint.schema_version
            );
            return Ok(None);
        }
        Ok(Some(sidecar))
    }

    pub fn delete(&self, canonical_path: &str) -> Result<()> {
        let path = self.state_paths.call_graph_file(canonical_path)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Reference record stored in the lifecycle snapshot
    pub fn info_for(&self, canonical_path: &str, sidecar: &CallGraphSidecar) -> SidecarInfo {
        let path = self
            .state_paths
            .call_graph_file(canonical_path)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        SidecarInfo {
            path,
            node_count: sidecar.nodes.len(),
            edge_count: sidecar.edges.len(),
            built_at: sidecar.built_at.clone(),
            fingerprint: sidecar.fingerprint.clone(),
        }
    }

    /// Whether a change set warrants a rebuild: any changed path with a
    /// supported source extension
    pub fn should_rebuild(changes: &SyncChanges) -> bool {
        let extensions = call_graph_build_extensions();
        changes
            .added
            .iter()
            .chain(changes.removed.iter())
            .chain(changes.modified.iter())
            .any(|path| {
                path.rsplit('.')
                    .next()
                    .map(|ext| extensions.contains(&ext))
                    .unwrap_or(false)
            })
    }

    /// Rebuild when the delta policy says the change set is relevant
    pub async fn rebuild_if_supported_delta(
        &self,
        canonical_path: &str,
        changes: &SyncChanges,
        matcher: std::sync::Arc<CompiledIgnore>,
    ) -> Result<Option<CallGraphSidecar>> {
        if !Self::should_rebuild(changes) {
            return Ok(None);
        }
        self.build(canonical_path, matcher).await.map(Some)
    }

    /// Sidecar-backed outline of one file
    pub fn outline(
        &self,
        canonical_path: &str,
        file: &str,
        range: Option<(u32, u32)>,
        limit_symbols: usize,
        selector: OutlineSelector<'_>,
    ) -> Result<OutlineResult> {
        let extension = file.rsplit('.').next().unwrap_or("");
        if !supports_file_outline(extension) {
            return Ok(OutlineResult {
                status: OutlineStatus::Unsupported,
                entries: Vec::new(),
            });
        }
        let Some(sidecar) = self.load(canonical_path)? else {
            return Ok(OutlineResult {
                status: OutlineStatus::RequiresReindex,
                entries: Vec::new(),
            });
        };

        let mut entries: Vec<OutlineEntry> = sidecar
            .nodes
            .iter()
            .filter(|node| node.file == file)
            .filter(|node| match range {
                Some((start, end)) => node.span.start <= end && node.span.end >= start,
                None => true,
            })
            .filter(|node| match selector {
                OutlineSelector::All => true,
                OutlineSelector::SymbolId(id) => node.symbol_id == id,
                OutlineSelector::SymbolLabel(label) => {
                    node.symbol_label.as_deref() == Some(label)
                }
            })
            .map(OutlineEntry::from_node)
            .collect();
        entries.sort_by_key(|entry| (entry.span.start, entry.span.end));

        let status = match selector {
            OutlineSelector::All => OutlineStatus::Ok,
            _ if entries.is_empty() => OutlineStatus::NotFound,
            _ if entries.len() > 1 => OutlineStatus::Ambiguous,
            _ => OutlineStatus::Ok,
        };
        entries.truncate(limit_symbols);
        Ok(OutlineResult { status, entries })
    }
}

/// Which symbols an outline call selects
#[derive(Debug, Clone, Copy)]
pub enum OutlineSelector<'a> {
    All,
    SymbolId(&'a str),
    SymbolLabel(&'a str),
}

/// Outline response status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutlineStatus {
    Ok,
    RequiresReindex,
    Unsupported,
    Ambiguous,
    NotFound,
}

/// One outline row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutlineEntry {
    pub symbol_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_label: Option<String>,
    pub span: LineSpan,
}

impl OutlineEntry {
    fn from_node(node: &SymbolNode) -> Self {
        Self {
            symbol_id: node.symbol_id.clone(),
            symbol_label: node.symbol_label.clone(),
            span: node.span,
        }
    }
}

/// Outline result with its status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineResult {
    pub status: OutlineStatus,
    pub entries: Vec<OutlineEntry>,
}
