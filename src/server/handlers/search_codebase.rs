//! Handler for the search_codebase tool
//!
//! Resolves the codebase root (a sub-directory query maps onto its closest
//! indexed parent), enforces the fingerprint gate, performs an
//! opportunistic coalesced freshness sync, runs the engine search with
//! filters derived from the scope and query-prefix operators, and shapes
//! results into a grouped or raw envelope. Overlapping chunk spans of one
//! file merge into contiguous snippets.

use crate::chunking::languages::DOC_EXTENSIONS;
use crate::domain::types::{FilterCond, FilterExpr, FilterField, GateOutcome, SearchHit};
use crate::infrastructure::constants::{
    MERGE_CLUSTER_GAP, PREVIEW_LIMIT, SEARCH_FRESHNESS_THRESHOLD,
};
use crate::infrastructure::paths::canonical_codebase_path;
use crate::server::args::{GroupBy, RankingMode, ResultMode, SearchCodebaseArgs, SearchScope};
use crate::server::envelope::{error_result, json_result};
use crate::server::state::ServerState;
use crate::sync::SyncOutcome;
use rmcp::model::CallToolResult;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

/// Handler for semantic search
pub struct SearchCodebaseHandler {
    state: Arc<ServerState>,
}

/// One shaped result row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultRow {
    relative_path: String,
    start_line: u32,
    end_line: u32,
    language: String,
    score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    breadcrumbs: Option<Vec<String>>,
    snippet: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    truncated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultGroup {
    key: String,
    items: Vec<ResultRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchEnvelope {
    tool: &'static str,
    version: u32,
    query: String,
    resolved_path: String,
    scope: &'static str,
    total_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<Vec<ResultGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<ResultRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<serde_json::Value>,
}

impl SearchCodebaseHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn handle(&self, args: SearchCodebaseArgs) -> CallToolResult {
        if let Err(e) = args.validate() {
            return error_result(format!("Invalid search_codebase arguments: {}", e));
        }

        let canonical = match canonical_codebase_path(Path::new(&args.path)) {
            Ok(canonical) => canonical,
            Err(e) => return error_result(format!("Cannot resolve {}: {}", args.path, e)),
        };

        // Exact match, else closest indexed parent
        let Some(root) = self.state.snapshots.resolve_codebase_root(&canonical) else {
            return error_result(format!(
                "No index covers {}. Run manage_index with action=create first.",
                canonical
            ));
        };

        let decision = self
            .state
            .snapshots
            .ensure_fingerprint_compatibility_on_access(&root);
        if decision.changed {
            let _ = self.state.snapshots.save().await;
        }
        if let GateOutcome::Denied { reason, message } = &decision.outcome {
            return json_result(&serde_json::json!({
                "tool": "search_codebase",
                "version": 1,
                "status": "requires_reindex",
                "reason": reason.to_string(),
                "message": message,
                "hints": {
                    "reindex": {
                        "tool": "manage_index",
                        "args": { "action": "reindex", "path": root },
                    }
                }
            }));
        }

        // Opportunistic freshness pass; a recently-synced codebase skips
        let sync_outcome = self
            .state
            .sync_manager
            .ensure_freshness(&root, SEARCH_FRESHNESS_THRESHOLD)
            .await;
        let changed_paths: HashSet<String> = match &sync_outcome {
            Ok(SyncOutcome::Synced(changes)) => {
                changes.changed_files().into_iter().collect()
            }
            Ok(_) => HashSet::new(),
            Err(e) => {
                tracing::warn!("Freshness sync failed for {}: {}", root, e);
                HashSet::new()
            }
        };

        let (clean_query, mut filter) = parse_query_operators(&args.query);
        apply_scope(&mut filter, args.scope);
        if canonical != root {
            // Sub-directory query narrows to that subtree
            if let Some(sub) = canonical.strip_prefix(&format!("{}/", root.trim_end_matches('/')))
            {
                filter.push(FilterCond::PathPrefix(format!("{}/", sub)));
            }
        }

        let limit = args
            .limit
            .unwrap_or_else(|| self.state.capabilities.default_search_limit())
            .clamp(1, self.state.capabilities.max_search_limit());

        let hits = match self
            .state
            .context
            .semantic_search(&root, &clean_query, limit, 0.0, filter)
            .await
        {
            Ok(hits) => hits,
            Err(e) => return error_result(format!("Search failed: {}", e)),
        };

        let mut rows = match args.result_mode {
            ResultMode::Raw => hits.into_iter().map(|hit| row_from_hit(&root, hit)).collect(),
            ResultMode::Grouped => merge_adjacent(&root, hits),
        };

        if args.ranking_mode == RankingMode::AutoChangedFirst && !changed_paths.is_empty() {
            rows.sort_by(|a, b| {
                let a_changed = changed_paths.contains(&a.relative_path);
                let b_changed = changed_paths.contains(&b.relative_path);
                b_changed
                    .cmp(&a_changed)
                    .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            });
        } else {
            rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        }
        rows.truncate(limit);

        let debug = args.debug.then(|| {
            serde_json::json!({
                "telemetryTag": self.state.capabilities.telemetry_tag(),
                "hybridMode": self.state.context.hybrid_mode(),
                "freshness": match &sync_outcome {
                    Ok(SyncOutcome::Skipped) => "skipped",
                    Ok(SyncOutcome::Synced(_)) => "synced",
                    Ok(SyncOutcome::Removed) => "removed",
                    Err(_) => "failed",
                },
            })
        });

        let total = rows.len();
        let envelope = match args.result_mode {
            ResultMode::Grouped => SearchEnvelope {
                tool: "search_codebase",
                version: 1,
                query: clean_query,
                resolved_path: root,
                scope: scope_name(args.scope),
                total_results: total,
                groups: Some(group_rows(rows, args.group_by)),
                results: None,
                debug,
            },
            ResultMode::Raw => SearchEnvelope {
                tool: "search_codebase",
                version: 1,
                query: clean_query,
                resolved_path: root,
                scope: scope_name(args.scope),
                total_results: total,
                groups: None,
                results: Some(rows),
                debug,
            },
        };
        json_result(&envelope)
    }
}

fn scope_name(scope: SearchScope) -> &'static str {
    match scope {
        SearchScope::Runtime => "runtime",
        SearchScope::Mixed => "mixed",
        SearchScope::Docs => "docs",
    }
}

/// Strip `lang:`, `path:`, `-path:`, `must:`, `exclude:` operators off the
/// query prefix, returning the cleaned query and the derived filter
fn parse_query_operators(query: &str) -> (String, FilterExpr) {
    let mut filter = FilterExpr::new();
    let mut remaining: Vec<&str> = Vec::new();
    let mut in_prefix = true;

    for token in query.split_whitespace() {
        if in_prefix {
            if let Some(value) = token.strip_prefix("lang:") {
                filter.push(FilterCond::Eq(
                    FilterField::Language,
                    value.to_lowercase(),
                ));
                continue;
            }
            if let Some(value) = token.strip_prefix("-path:") {
                filter.push(FilterCond::NotPathPrefix(value.to_string()));
                continue;
            }
            if let Some(value) = token.strip_prefix("path:") {
                filter.push(FilterCond::PathPrefix(value.to_string()));
                continue;
            }
            if let Some(value) = token.strip_prefix("must:") {
                filter.push(FilterCond::PathContains(value.to_string()));
                continue;
            }
            if let Some(value) = token.strip_prefix("exclude:") {
                filter.push(FilterCond::NotPathContains(value.to_string()));
                continue;
            }
            in_prefix = false;
        }
        remaining.push(token);
    }

    (remaining.join(" "), filter)
}

fn apply_scope(filter: &mut FilterExpr, scope: SearchScope) {
    let doc_exts: Vec<String> = DOC_EXTENSIONS.iter().map(|ext| format!(".{}", ext)).collect();
    match scope {
        SearchScope::Runtime => filter.push(FilterCond::ExtNotIn(doc_exts)),
        SearchScope::Docs => filter.push(FilterCond::ExtIn(doc_exts)),
        SearchScope::Mixed => {}
    }
}

fn row_from_hit(_root: &str, hit: SearchHit) -> ResultRow {
    let (snippet, truncated) = clip(&hit.content);
    ResultRow {
        relative_path: hit.relative_path,
        start_line: hit.start_line,
        end_line: hit.end_line,
        language: hit.language,
        score: hit.score,
        symbol_label: hit.symbol_label,
        symbol_id: hit.symbol_id,
        breadcrumbs: hit.breadcrumbs,
        snippet,
        truncated,
    }
}

/// Merge overlapping or near-adjacent hits of one file into contiguous
/// snippets, reading the underlying file where available
fn merge_adjacent(root: &str, hits: Vec<SearchHit>) -> Vec<ResultRow> {
    use std::collections::BTreeMap;

    let mut per_file: BTreeMap<String, Vec<SearchHit>> = BTreeMap::new();
    for hit in hits {
        per_file.entry(hit.relative_path.clone()).or_default().push(hit);
    }

    let mut rows = Vec::new();
    for (relative_path, mut file_hits) in per_file {
        file_hits.sort_by_key(|hit| (hit.start_line, hit.end_line));

        let mut cluster: Vec<SearchHit> = Vec::new();
        let mut clusters: Vec<Vec<SearchHit>> = Vec::new();
        for hit in file_hits {
            match cluster.last() {
                Some(last) if hit.start_line.saturating_sub(last.end_line) <= MERGE_CLUSTER_GAP => {
                    cluster.push(hit);
                }
                Some(_) => {
                    clusters.push(std::mem::take(&mut cluster));
                    cluster.push(hit);
                }
                None => cluster.push(hit),
            }
        }
        if !cluster.is_empty() {
            clusters.push(cluster);
        }

        for cluster in clusters {
            rows.push(merge_cluster(root, &relative_path, cluster));
        }
    }
    rows
}

fn merge_cluster(root: &str, relative_path: &str, cluster: Vec<SearchHit>) -> ResultRow {
    let start_line = cluster.iter().map(|hit| hit.start_line).min().unwrap_or(1);
    let end_line = cluster.iter().map(|hit| hit.end_line).max().unwrap_or(start_line);
    let best = cluster
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        .cloned()
        .unwrap_or_else(|| cluster[0].clone());

    // Prefer a contiguous snippet read from the file; otherwise join the
    // chunk texts with a gap marker
    let content = read_span(root, relative_path, start_line, end_line).unwrap_or_else(|| {
        cluster
            .iter()
            .map(|hit| hit.content.as_str())
            .collect::<Vec<_>>()
            .join("\n⋯\n")
    });
    let (snippet, truncated) = clip(&content);

    ResultRow {
        relative_path: relative_path.to_string(),
        start_line,
        end_line,
        language: best.language,
        score: best.score,
        symbol_label: best.symbol_label,
        symbol_id: best.symbol_id,
        breadcrumbs: best.breadcrumbs,
        snippet,
        truncated,
    }
}

fn read_span(root: &str, relative_path: &str, start_line: u32, end_line: u32) -> Option<String> {
    let content = std::fs::read_to_string(Path::new(root).join(relative_path)).ok()?;
    let lines: Vec<&str> = content.lines().collect();
    let start = start_line.saturating_sub(1) as usize;
    let end = (end_line as usize).min(lines.len());
    if start >= end {
        return None;
    }
    Some(lines[start..end].join("\n"))
}

fn clip(content: &str) -> (String, bool) {
    if content.chars().count() <= PREVIEW_LIMIT {
        return (content.to_string(), false);
    }
    let clipped: String = content.chars().take(PREVIEW_LIMIT).collect();
    (clipped, true)
}

fn group_rows(rows: Vec<ResultRow>, group_by: GroupBy) -> Vec<ResultGroup> {
    let mut groups: Vec<ResultGroup> = Vec::new();
    for row in rows {
        let key = match group_by {
            GroupBy::File => row.relative_path.clone(),
            GroupBy::Symbol => row
                .symbol_label
                .clone()
                .unwrap_or_else(|| row.relative_path.clone()),
        };
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.items.push(row),
            None => groups.push(ResultGroup {
                key,
                items: vec![row],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_strip_off_the_query_prefix() {
        let (query, filter) =
            parse_query_operators("lang:rust path:src/ -path:tests/ find the auth flow");
        assert_eq!(query, "find the auth flow");
        assert_eq!(filter.all.len(), 3);
        assert!(filter.matches("src/auth.rs", ".rs", "rust"));
        assert!(!filter.matches("tests/auth.rs", ".rs", "rust"));
        assert!(!filter.matches("src/auth.py", ".py", "python"));
    }

    #[test]
    fn operators_after_plain_words_stay_in_the_query() {
        let (query, filter) = parse_query_operators("find lang:rust things");
        assert_eq!(query, "find lang:rust things");
        assert!(filter.all.is_empty());
    }

    #[test]
    fn runtime_scope_excludes_docs() {
        let mut filter = FilterExpr::new();
        apply_scope(&mut filter, SearchScope::Runtime);
        assert!(filter.matches("src/a.rs", ".rs", "rust"));
        assert!(!filter.matches("README.md", ".md", "markdown"));
    }

    fn hit(path: &str, start: u32, end: u32, score: f32) -> SearchHit {
        SearchHit {
            content: format!("lines {}..{}", start, end),
            relative_path: path.to_string(),
            start_line: start,
            end_line: end,
            language: "rust".to_string(),
            score,
            breadcrumbs: None,
            indexed_at: None,
            symbol_id: None,
            symbol_label: None,
        }
    }

    #[test]
    fn nearby_spans_merge_into_one_row() {
        let rows = merge_adjacent(
            "/nonexistent-root",
            vec![hit("a.rs", 1, 10, 0.9), hit("a.rs", 15, 20, 0.5)],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_line, 1);
        assert_eq!(rows[0].end_line, 20);
        assert!((rows[0].score - 0.9).abs() < f32::EPSILON);
        assert!(rows[0].snippet.contains('⋯'));
    }

    #[test]
    fn distant_spans_stay_separate() {
        let rows = merge_adjacent(
            "/nonexistent-root",
            vec![hit("a.rs", 1, 10, 0.9), hit("a.rs", 100, 110, 0.5)],
        );
        assert_eq!(rows.len(), 2);
    }
}
