//! Handler for the manage_index tool
//!
//! Drives the index lifecycle: create and reindex run as background builds
//! polled through the status action; sync runs the incremental pipeline;
//! clear removes the collection, the synchronizer snapshot, and the
//! sidecar. Reindex carries a preflight that blocks rebuilds whose only
//! motivation is ignore-rule churn.

use crate::domain::types::{CodebaseStatus, SyncChanges};
use crate::index::ProgressFn;
use crate::infrastructure::paths::canonical_codebase_path;
use crate::server::args::{ManageIndexAction, ManageIndexArgs};
use crate::server::envelope::{error_result, json_result, ManageIndexEnvelope};
use crate::server::state::ServerState;
use crate::sync::SyncOutcome;
use rmcp::model::CallToolResult;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Handler for index management operations
pub struct ManageIndexHandler {
    state: Arc<ServerState>,
}

impl ManageIndexHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn handle(&self, args: ManageIndexArgs) -> CallToolResult {
        if let Err(e) = args.validate() {
            return error_result(format!("Invalid manage_index arguments: {}", e));
        }

        let action = args.action.as_str();
        let path = Path::new(&args.path);
        let needs_directory = matches!(
            args.action,
            ManageIndexAction::Create | ManageIndexAction::Reindex | ManageIndexAction::Sync
        );
        if needs_directory {
            if !path.exists() {
                return error_result(format!("Path does not exist: {}", args.path));
            }
            if !path.is_dir() {
                return error_result(format!("Path is not a directory: {}", args.path));
            }
        }

        let canonical = match canonical_codebase_path(path) {
            Ok(canonical) => canonical,
            Err(e) => return error_result(format!("Cannot resolve {}: {}", args.path, e)),
        };

        if !args.ignore_patterns.is_empty() {
            self.state
                .context
                .add_runtime_ignore_patterns(&args.ignore_patterns)
                .await;
        }

        match args.action {
            ManageIndexAction::Create => {
                self.handle_create(&canonical, &args, false, None, None).await
            }
            ManageIndexAction::Reindex => self.handle_reindex(&canonical, &args).await,
            ManageIndexAction::Sync => self.handle_sync(&canonical, action).await,
            ManageIndexAction::Status => self.handle_status(&canonical).await,
            ManageIndexAction::Clear => self.handle_clear(&canonical).await,
        }
    }

    async fn handle_create(
        &self,
        canonical: &str,
        args: &ManageIndexArgs,
        is_reindex: bool,
        probe_warning: Option<&'static str>,
        preflight: Option<serde_json::Value>,
    ) -> CallToolResult {
        let action: &'static str = if is_reindex { "reindex" } else { "create" };

        if let Some(info) = self.state.snapshots.get_codebase_info(canonical) {
            if let CodebaseStatus::Indexing {
                indexing_percentage,
            } = info.status
            {
                let envelope = ManageIndexEnvelope::new(action, canonical, "not_ready")
                    .reason("already_indexing")
                    .message(format!(
                        "Indexing already in progress ({:.0}%); poll manage_index status",
                        indexing_percentage
                    ))
                    .hints(serde_json::json!({
                        "status": {
                            "tool": "manage_index",
                            "args": { "action": "status", "path": canonical },
                        }
                    }));
                return json_result(&envelope);
            }
            if !is_reindex && info.status.is_searchable() && !args.force {
                let envelope = ManageIndexEnvelope::new(action, canonical, "blocked")
                    .reason("already_indexed")
                    .message("Codebase is already indexed; use action=reindex or force=true to rebuild")
                    .hints(serde_json::json!({
                        "reindex": {
                            "tool": "manage_index",
                            "args": { "action": "reindex", "path": canonical },
                        }
                    }));
                return json_result(&envelope);
            }
        }

        // Collection-limit validation runs up-front; the refusal is terminal
        // and therefore non-error
        if let Err(e) = self.state.context.check_collection_limit().await {
            let envelope = ManageIndexEnvelope::new(action, canonical, "blocked")
                .reason("collection_limit")
                .message(format!(
                    "The vector store refused a new collection: {}. Clear an existing \
                     codebase index before creating another one.",
                    e
                ));
            return json_result(&envelope);
        }

        self.spawn_build(canonical, args, is_reindex || args.force);

        let mut envelope = ManageIndexEnvelope::new(action, canonical, "ok").message(format!(
            "Index build started in the background for {}; poll manage_index status",
            canonical
        ));
        if let Some(warning) = probe_warning {
            envelope = envelope.warning(warning);
        }
        if let Some(preflight) = preflight {
            envelope = envelope.preflight(preflight);
        }
        json_result(&envelope)
    }

    async fn handle_reindex(&self, canonical: &str, args: &ManageIndexArgs) -> CallToolResult {
        let mut probe_warning: Option<&'static str> = None;
        let mut preflight: Option<serde_json::Value> = None;

        if self.state.snapshots.get_codebase_info(canonical).is_some() {
            match self.probe_ignore_only_churn(canonical).await {
                Ok(ignore_only) => {
                    if ignore_only && !args.allow_unnecessary_reindex {
                        let envelope =
                            ManageIndexEnvelope::new("reindex", canonical, "blocked")
                                .reason("unnecessary_reindex_ignore_only")
                                .message(
                                    "The tracked tree has no effective file changes; only \
                                     ignore rules changed. Use sync, or override explicitly.",
                                )
                                .warning("REINDEX_UNNECESSARY_IGNORE_ONLY")
                                .hints(serde_json::json!({
                                    "sync": {
                                        "tool": "manage_index",
                                        "args": { "action": "sync", "path": canonical },
                                    },
                                    "overrideReindex": {
                                        "tool": "manage_index",
                                        "args": {
                                            "action": "reindex",
                                            "path": canonical,
                                            "allowUnnecessaryReindex": true,
                                        },
                                    },
                                }));
                        return json_result(&envelope);
                    }
                }
                Err(e) => {
                    tracing::warn!("Reindex preflight probe failed for {}: {}", canonical, e);
                    probe_warning = Some("IGNORE_POLICY_PROBE_FAILED");
                    preflight = Some(serde_json::json!({
                        "outcome": "probe_failed",
                        "error": e.to_string(),
                    }));
                }
            }
        }

        self.handle_create(canonical, args, true, probe_warning, preflight)
            .await
    }

    /// Whether the change set since the last snapshot is ignore-rule churn
    /// only (no effective file changes the tracked tree would ingest)
    async fn probe_ignore_only_churn(&self, canonical: &str) -> crate::domain::error::Result<bool> {
        let stored_signature = self
            .state
            .snapshots
            .get_codebase_info(canonical)
            .and_then(|info| info.ignore_control_signature);

        self.state
            .context
            .reload_ignore_rules_for_codebase(canonical)
            .await?;
        let current_signature = self.state.context.ignore_control_signature(canonical).await;
        let report = self.state.context.peek_changes(canonical).await?;

        // Only changes the tracked tree would ingest count as effective;
        // churn in ignore files themselves does not
        let effective_changes = report
            .added
            .iter()
            .chain(report.removed.iter())
            .chain(report.modified.iter())
            .any(|path| is_ingestible(path));

        let signature_changed = stored_signature
            .map(|stored| stored != current_signature)
            .unwrap_or(false);
        Ok(!effective_changes && signature_changed)
    }

    fn spawn_build(&self, canonical: &str, args: &ManageIndexArgs, force: bool) {
        let state = Arc::clone(&self.state);
        let canonical = canonical.to_string();
        let splitter = args.splitter;
        let custom_extensions = args.custom_extensions.clone();

        state.snapshots.set_indexing(&canonical, 0.0);

        tokio::spawn(async move {
            let _ = state.snapshots.save().await;

            let progress_snapshots = Arc::clone(&state.snapshots);
            let progress_path = canonical.clone();
            let progress: ProgressFn = Arc::new(move |pct: f32| {
                progress_snapshots.set_indexing(&progress_path, pct);
            });

            let result = state
                .context
                .index_codebase(&canonical, force, splitter, &custom_extensions, Some(progress))
                .await;

            match result {
                Ok(report) => {
                    // Metadata lands while the entry is still `indexing`, so
                    // a status poll that sees `indexed` also sees it
                    let _ = state
                        .snapshots
                        .set_codebase_index_manifest(&canonical, report.manifest);
                    let _ = state.snapshots.set_codebase_ignore_rules_version(
                        &canonical,
                        state.context.ignore_rules_version().await,
                    );
                    let _ = state.snapshots.set_codebase_ignore_control_signature(
                        &canonical,
                        state.context.ignore_control_signature(&canonical).await,
                    );
                    state.snapshots.set_indexed(&canonical, &report.stats);

                    match build_sidecar(&state, &canonical).await {
                        Ok(()) => {}
                        Err(e) => {
                            tracing::warn!("Sidecar build failed for {}: {}", canonical, e)
                        }
                    }

                    tracing::info!(
                        "Indexed {}: {} files, {} chunks",
                        canonical,
                        report.stats.indexed_files,
                        report.stats.total_chunks
                    );
                }
                Err(e) => {
                    let last_pct = match state.snapshots.get_codebase_info(&canonical) {
                        Some(info) => match info.status {
                            CodebaseStatus::Indexing {
                                indexing_percentage,
                            } => Some(indexing_percentage),
                            _ => None,
                        },
                        None => None,
                    };
                    tracing::error!("Index build failed for {}: {}", canonical, e);
                    state
                        .snapshots
                        .set_index_failed(&canonical, e.to_string(), last_pct);
                }
            }
            let _ = state.snapshots.save().await;
        });
    }

    async fn handle_sync(&self, canonical: &str, action: &'static str) -> CallToolResult {
        if self.state.snapshots.get_codebase_info(canonical).is_none() {
            let envelope = ManageIndexEnvelope::new(action, canonical, "not_indexed")
                .message("Codebase is not tracked; create an index first")
                .hints(serde_json::json!({
                    "create": {
                        "tool": "manage_index",
                        "args": { "action": "create", "path": canonical },
                    }
                }));
            return json_result(&envelope);
        }

        match self
            .state
            .sync_manager
            .ensure_freshness(canonical, Duration::ZERO)
            .await
        {
            Ok(SyncOutcome::Synced(changes)) => {
                let envelope = ManageIndexEnvelope::new(action, canonical, "ok")
                    .message(sync_summary(&changes))
                    .detail(serde_json::json!({
                        "added": changes.added.len(),
                        "removed": changes.removed.len(),
                        "modified": changes.modified.len(),
                        "totalChanges": changes.total_changes(),
                    }));
                json_result(&envelope)
            }
            Ok(SyncOutcome::Skipped) => {
                let envelope = ManageIndexEnvelope::new(action, canonical, "ok")
                    .message("Index is already fresh");
                json_result(&envelope)
            }
            Ok(SyncOutcome::Removed) => {
                let envelope = ManageIndexEnvelope::new(action, canonical, "not_indexed")
                    .message("Codebase directory no longer exists; entry removed");
                json_result(&envelope)
            }
            Err(e) => error_result(format!("Sync failed for {}: {}", canonical, e)),
        }
    }

    async fn handle_status(&self, canonical: &str) -> CallToolResult {
        let Some(info) = self.state.snapshots.get_codebase_info(canonical) else {
            let envelope = ManageIndexEnvelope::new("status", canonical, "not_indexed")
                .message("Codebase is not tracked")
                .hints(serde_json::json!({
                    "create": {
                        "tool": "manage_index",
                        "args": { "action": "create", "path": canonical },
                    }
                }));
            return json_result(&envelope);
        };

        let envelope = ManageIndexEnvelope::new("status", canonical, "ok")
            .message(format!("Status: {}", info.status.name()))
            .detail(serde_json::json!({
                "codebase": info,
                "runtimeFingerprint": self.state.snapshots.runtime_fingerprint(),
                "collection": self.state.context.collection_for(canonical),
            }));
        json_result(&envelope)
    }

    async fn handle_clear(&self, canonical: &str) -> CallToolResult {
        if let Err(e) = self.state.context.clear_index(canonical).await {
            return error_result(format!("Failed to clear index for {}: {}", canonical, e));
        }
        if let Err(e) = self.state.callgraph.delete(canonical) {
            tracing::warn!("Failed to delete sidecar for {}: {}", canonical, e);
        }
        self.state.snapshots.remove_codebase(canonical);
        let _ = self.state.snapshots.save().await;

        let envelope = ManageIndexEnvelope::new("clear", canonical, "ok")
            .message(format!("Cleared index, snapshot entry, and sidecar for {}", canonical));
        json_result(&envelope)
    }
}

/// Build the sidecar after a successful index build and record its info
async fn build_sidecar(
    state: &Arc<ServerState>,
    canonical: &str,
) -> crate::domain::error::Result<()> {
    let matcher = state.context.matcher_handle(canonical).await?;
    let sidecar = state.callgraph.build(canonical, matcher).await?;
    let info = state.callgraph.info_for(canonical, &sidecar);
    state
        .snapshots
        .set_codebase_call_graph_sidecar(canonical, Some(info))?;
    Ok(())
}

fn is_ingestible(relative_path: &str) -> bool {
    relative_path
        .rsplit('.')
        .next()
        .map(crate::chunking::languages::is_indexable_extension)
        .unwrap_or(false)
}

fn sync_summary(changes: &SyncChanges) -> String {
    format!(
        "Sync completed: {} added, {} removed, {} modified",
        changes.added.len(),
        changes.removed.len(),
        changes.modified.len()
    )
}
