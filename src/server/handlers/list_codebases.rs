//! Handler for the list_codebases tool

use crate::server::envelope::json_result;
use crate::server::state::ServerState;
use rmcp::model::CallToolResult;
use std::sync::Arc;

/// Handler listing every tracked codebase
pub struct ListCodebasesHandler {
    state: Arc<ServerState>,
}

impl ListCodebasesHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn handle(&self) -> CallToolResult {
        let codebases: Vec<serde_json::Value> = self
            .state
            .snapshots
            .list_codebases()
            .into_iter()
            .map(|(path, info)| {
                serde_json::json!({
                    "path": path,
                    "status": info.status.name(),
                    "searchable": info.status.is_searchable(),
                    "lastUpdated": info.last_updated,
                    "indexFingerprint": info.index_fingerprint,
                    "fingerprintSource": info.fingerprint_source,
                    "callGraphSidecar": info.call_graph_sidecar,
                    "detail": info.status,
                })
            })
            .collect();

        json_result(&serde_json::json!({
            "tool": "list_codebases",
            "version": 1,
            "count": codebases.len(),
            "codebases": codebases,
            "runtimeFingerprint": self.state.snapshots.runtime_fingerprint(),
        }))
    }
}
