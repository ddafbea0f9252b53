//! Handler for the call_graph tool

use crate::callgraph::query::{run_query, CallGraphQuery, QueryResponse};
use crate::infrastructure::paths::canonical_codebase_path;
use crate::server::args::CallGraphArgs;
use crate::server::envelope::{error_result, json_result};
use crate::server::state::ServerState;
use rmcp::model::CallToolResult;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

/// Handler for heuristic call-graph queries
pub struct CallGraphHandler {
    state: Arc<ServerState>,
}

impl CallGraphHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn handle(&self, args: CallGraphArgs) -> CallToolResult {
        if let Err(e) = args.validate() {
            return error_result(format!("Invalid call_graph arguments: {}", e));
        }

        let canonical = match canonical_codebase_path(Path::new(&args.path)) {
            Ok(canonical) => canonical,
            Err(e) => return error_result(format!("Cannot resolve {}: {}", args.path, e)),
        };

        let sidecar = match self.state.callgraph.load(&canonical) {
            Ok(Some(sidecar)) => sidecar,
            Ok(None) => {
                return json_result(&QueryResponse::missing_sidecar(&canonical));
            }
            Err(e) => return error_result(format!("Failed to load sidecar: {}", e)),
        };

        let response = run_query(
            &sidecar,
            &CallGraphQuery {
                symbol_ref: args.symbol_ref,
                direction: args.direction,
                depth: args.depth,
                limit: args.limit,
            },
        );
        json_result(&response)
    }
}
