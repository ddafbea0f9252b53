//! Handler for the read_file tool
//!
//! Line-range policy: no range reads up to the configured cap from the
//! start; a lone start reads the cap from there; a lone end reads 1..end;
//! both clamp. Truncated reads append one continuation hint quoting the
//! path and the next start line. `open_symbol` applies a direct span
//! verbatim or resolves the symbol through the sidecar outline.

use crate::callgraph::manager::{OutlineSelector, OutlineStatus};
use crate::domain::types::CodebaseStatus;
use crate::infrastructure::paths::{canonical_codebase_path, relative_to_root};
use crate::server::args::{OpenSymbolArgs, ReadFileArgs, ReadFileMode};
use crate::server::envelope::{error_result, json_result, text_result};
use crate::server::state::ServerState;
use rmcp::model::CallToolResult;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

/// Handler for symbol-aware file reads
pub struct ReadFileHandler {
    state: Arc<ServerState>,
}

impl ReadFileHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn handle(&self, args: ReadFileArgs) -> CallToolResult {
        if let Err(e) = args.validate() {
            return error_result(format!("Invalid read_file arguments: {}", e));
        }

        let path = Path::new(&args.path);
        if !path.is_file() {
            return error_result(format!("Not a readable file: {}", args.path));
        }

        let canonical_file = match canonical_codebase_path(path) {
            Ok(canonical) => canonical,
            Err(e) => return error_result(format!("Cannot resolve {}: {}", args.path, e)),
        };
        let enclosing_root = self.state.snapshots.resolve_codebase_root(&canonical_file);

        // A file under a codebase that is still indexing is not readable
        // through the index surface yet
        if let Some(root) = &enclosing_root {
            if let Some(info) = self.state.snapshots.get_codebase_info(root) {
                if let CodebaseStatus::Indexing {
                    indexing_percentage,
                } = info.status
                {
                    return json_result(&serde_json::json!({
                        "tool": "read_file",
                        "version": 1,
                        "status": "not_ready",
                        "reason": "indexing",
                        "indexing": { "progressPct": indexing_percentage },
                        "hints": {
                            "status": {
                                "tool": "manage_index",
                                "args": { "action": "status", "path": root },
                            }
                        }
                    }));
                }
            }
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => return error_result(format!("Failed to read {}: {}", args.path, e)),
        };
        let total_lines = content.lines().count();

        // Resolve the requested span
        let (range_start, range_end) = match self
            .resolve_span(&args, enclosing_root.as_deref(), &canonical_file)
            .await
        {
            Ok(span) => span,
            Err(result) => return *result,
        };

        let max_lines = self.state.config.read_file_max_lines;
        let (start, end) = apply_range_policy(range_start, range_end, total_lines, max_lines);

        let lines: Vec<&str> = content.lines().collect();
        let slice_end = end.min(lines.len());
        let slice_start = start.saturating_sub(1).min(slice_end);
        let body = lines[slice_start..slice_end].join("\n");
        let truncated = slice_end < total_lines && range_end.is_none();
        let continuation = truncated.then(|| {
            format!(
                "Output truncated. Continue with read_file {{\"path\": \"{}\", \"start_line\": {}}}",
                args.path,
                slice_end + 1
            )
        });

        match args.mode {
            ReadFileMode::Plain => {
                let mut text = body;
                if let Some(hint) = continuation {
                    text.push('\n');
                    text.push_str(&hint);
                }
                text_result(text)
            }
            ReadFileMode::Annotated => {
                let outline = match &enclosing_root {
                    Some(root) => {
                        let relative = relative_to_root(Path::new(root), path).ok();
                        match relative {
                            Some(relative) => self
                                .state
                                .callgraph
                                .outline(root, &relative, None, 500, OutlineSelector::All)
                                .ok(),
                            None => None,
                        }
                    }
                    None => None,
                };
                let (outline_status, outline_entries) = match outline {
                    Some(outline) => (Some(outline.status), Some(outline.entries)),
                    None => (None, None),
                };
                json_result(&serde_json::json!({
                    "tool": "read_file",
                    "version": 1,
                    "path": args.path,
                    "startLine": slice_start + 1,
                    "endLine": slice_end,
                    "totalLines": total_lines,
                    "truncated": truncated,
                    "continuation": continuation,
                    "content": body,
                    "outlineStatus": outline_status,
                    "outline": outline_entries,
                }))
            }
        }
    }

    /// Turn the open_symbol selector into an explicit range, when present
    async fn resolve_span(
        &self,
        args: &ReadFileArgs,
        enclosing_root: Option<&str>,
        canonical_file: &str,
    ) -> Result<(Option<u32>, Option<u32>), Box<CallToolResult>> {
        let Some(open_symbol) = &args.open_symbol else {
            return Ok((args.start_line, args.end_line));
        };

        // A direct span is applied verbatim
        if let (Some(start), Some(end)) = (open_symbol.start_line, open_symbol.end_line) {
            return Ok((Some(start), Some(end)));
        }

        let Some(root) = enclosing_root else {
            return Err(Box::new(json_result(&serde_json::json!({
                "tool": "read_file",
                "version": 1,
                "status": "requires_reindex",
                "reason": "no_indexed_root",
                "message": format!(
                    "No indexed codebase covers {}; open_symbol needs an index to resolve",
                    canonical_file
                ),
            }))));
        };
        let Ok(relative) = relative_to_root(Path::new(root), Path::new(canonical_file)) else {
            return Err(Box::new(error_result(format!(
                "{} is not under {}",
                canonical_file, root
            ))));
        };

        let selector = match selector_of(open_symbol) {
            Some(selector) => selector,
            None => {
                return Err(Box::new(error_result(
                    "open_symbol requires symbol_id, symbol_label, or a direct span",
                )))
            }
        };

        let outline = self
            .state
            .callgraph
            .outline(root, &relative, None, 500, selector)
            .map_err(|e| Box::new(error_result(format!("Outline resolution failed: {}", e))))?;

        match outline.status {
            OutlineStatus::Ok => {
                let entry = outline.entries.first().ok_or_else(|| {
                    Box::new(error_result("Outline resolved no span for the symbol"))
                })?;
                Ok((Some(entry.span.start), Some(entry.span.end)))
            }
            OutlineStatus::RequiresReindex => Err(Box::new(json_result(&serde_json::json!({
                "tool": "read_file",
                "version": 1,
                "status": "requires_reindex",
                "reason": "missing_sidecar",
                "hints": {
                    "reindex": {
                        "tool": "manage_index",
                        "args": { "action": "reindex", "path": root },
                    }
                }
            })))),
            OutlineStatus::Unsupported => Err(Box::new(error_result(
                "open_symbol is not supported for this file's language",
            ))),
            OutlineStatus::Ambiguous => Err(Box::new(error_result(
                "open_symbol selector matched more than one symbol",
            ))),
            OutlineStatus::NotFound => Err(Box::new(error_result(
                "open_symbol selector matched no symbol",
            ))),
        }
    }
}

fn selector_of(open_symbol: &OpenSymbolArgs) -> Option<OutlineSelector<'_>> {
    if let Some(id) = open_symbol.symbol_id.as_deref() {
        return Some(OutlineSelector::SymbolId(id));
    }
    open_symbol
        .symbol_label
        .as_deref()
        .map(OutlineSelector::SymbolLabel)
}

/// The documented line-range policy
fn apply_range_policy(
    start: Option<u32>,
    end: Option<u32>,
    total_lines: usize,
    max_lines: usize,
) -> (usize, usize) {
    match (start, end) {
        (None, None) => (1, max_lines.min(total_lines)),
        (Some(start), None) => {
            let start = (start.max(1)) as usize;
            (start, (start + max_lines - 1).min(total_lines))
        }
        (None, Some(end)) => (1, (end as usize).min(total_lines)),
        (Some(start), Some(end)) => {
            let start = (start.max(1)) as usize;
            let end = (end as usize).min(total_lines);
            (start.min(end.max(1)), end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_range_reads_up_to_the_cap() {
        assert_eq!(apply_range_policy(None, None, 2000, 1000), (1, 1000));
        assert_eq!(apply_range_policy(None, None, 5, 1000), (1, 5));
    }

    #[test]
    fn start_only_reads_cap_lines_from_start() {
        assert_eq!(apply_range_policy(Some(100), None, 2000, 1000), (100, 1099));
        assert_eq!(apply_range_policy(Some(100), None, 150, 1000), (100, 150));
    }

    #[test]
    fn end_only_reads_from_line_one() {
        assert_eq!(apply_range_policy(None, Some(30), 2000, 1000), (1, 30));
    }

    #[test]
    fn both_bounds_clamp() {
        assert_eq!(apply_range_policy(Some(10), Some(5000), 200, 1000), (10, 200));
    }
}
