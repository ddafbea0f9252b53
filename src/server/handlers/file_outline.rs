//! Handler for the file_outline tool

use crate::callgraph::manager::OutlineSelector;
use crate::infrastructure::constants::OUTLINE_MAX_SYMBOLS;
use crate::infrastructure::paths::canonical_codebase_path;
use crate::server::args::{FileOutlineArgs, OutlineResolveMode};
use crate::server::envelope::{error_result, json_result};
use crate::server::state::ServerState;
use rmcp::model::CallToolResult;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

/// Handler for sidecar-backed outlines
pub struct FileOutlineHandler {
    state: Arc<ServerState>,
}

impl FileOutlineHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn handle(&self, args: FileOutlineArgs) -> CallToolResult {
        if let Err(e) = args.validate() {
            return error_result(format!("Invalid file_outline arguments: {}", e));
        }

        let canonical = match canonical_codebase_path(Path::new(&args.path)) {
            Ok(canonical) => canonical,
            Err(e) => return error_result(format!("Cannot resolve {}: {}", args.path, e)),
        };

        let selector = match args.resolve_mode {
            OutlineResolveMode::Outline => OutlineSelector::All,
            OutlineResolveMode::Exact => {
                if let Some(id) = args.symbol_id_exact.as_deref() {
                    OutlineSelector::SymbolId(id)
                } else if let Some(label) = args.symbol_label_exact.as_deref() {
                    OutlineSelector::SymbolLabel(label)
                } else {
                    return error_result(
                        "resolve_mode=exact requires symbol_id_exact or symbol_label_exact",
                    );
                }
            }
        };

        let range = match (args.start_line, args.end_line) {
            (Some(start), Some(end)) => Some((start, end)),
            (Some(start), None) => Some((start, u32::MAX)),
            (None, Some(end)) => Some((1, end)),
            (None, None) => None,
        };
        let limit = args
            .limit_symbols
            .unwrap_or(OUTLINE_MAX_SYMBOLS)
            .clamp(1, OUTLINE_MAX_SYMBOLS);

        let outline = match self
            .state
            .callgraph
            .outline(&canonical, &args.file, range, limit, selector)
        {
            Ok(outline) => outline,
            Err(e) => return error_result(format!("Outline failed: {}", e)),
        };

        json_result(&serde_json::json!({
            "tool": "file_outline",
            "version": 1,
            "path": canonical,
            "file": args.file,
            "status": outline.status,
            "symbols": outline.entries,
        }))
    }
}
