//! Tool argument types for the MCP server

use crate::callgraph::Direction;
use crate::chunking::SplitterKind;
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

/// Index-management actions
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ManageIndexAction {
    Create,
    Reindex,
    Sync,
    Status,
    Clear,
}

impl ManageIndexAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Reindex => "reindex",
            Self::Sync => "sync",
            Self::Status => "status",
            Self::Clear => "clear",
        }
    }
}

/// Arguments for the manage_index tool
#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[schemars(description = "Create, refresh, inspect, or remove a codebase index")]
pub struct ManageIndexArgs {
    /// The index operation to perform
    #[schemars(description = "One of create, reindex, sync, status, clear")]
    pub action: ManageIndexAction,
    /// Absolute path of the codebase root
    #[validate(length(min = 1, message = "Path cannot be empty"))]
    #[validate(custom(function = "validate_absolute_path", message = "Path must be absolute"))]
    #[schemars(description = "Absolute path to the codebase directory")]
    pub path: String,
    /// Force a rebuild even when an index already exists
    #[serde(default)]
    #[schemars(description = "Drop any existing collection before building")]
    pub force: bool,
    /// Preferred splitting strategy
    #[serde(default)]
    #[schemars(description = "Chunking strategy: ast (default) or langchain")]
    pub splitter: SplitterKind,
    /// Additional file extensions to ingest
    #[serde(default)]
    #[schemars(description = "Extra file extensions to index, e.g. [\"vue\", \"svelte\"]")]
    pub custom_extensions: Vec<String>,
    /// Additional ignore patterns for this and later operations
    #[serde(default)]
    #[schemars(description = "Extra ignore patterns in gitignore syntax")]
    pub ignore_patterns: Vec<String>,
    /// Override the ignore-only reindex preflight block
    #[serde(default)]
    #[schemars(description = "Proceed with reindex even when only ignore rules changed")]
    pub allow_unnecessary_reindex: bool,
}

/// Search scopes
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    Runtime,
    Mixed,
    Docs,
}

/// Result shaping modes
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultMode {
    #[default]
    Grouped,
    Raw,
}

/// Grouping keys for grouped results
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Symbol,
    File,
}

/// Ranking modes
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    Default,
    #[default]
    AutoChangedFirst,
}

/// Arguments for the search_codebase tool
#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[schemars(description = "Semantic search over an indexed codebase")]
pub struct SearchCodebaseArgs {
    /// Absolute path of the codebase root or a subdirectory of it
    #[validate(length(min = 1, message = "Path cannot be empty"))]
    #[schemars(description = "Absolute path of the codebase (or a subdirectory)")]
    pub path: String,
    /// Natural-language query; supports lang:, path:, -path:, must:,
    /// exclude: prefix operators
    #[validate(length(min = 1, max = 1000, message = "Query must be 1..=1000 characters"))]
    #[schemars(description = "Natural language query with optional prefix operators")]
    pub query: String,
    #[serde(default)]
    #[schemars(description = "Search scope: runtime (default), mixed, or docs")]
    pub scope: SearchScope,
    #[serde(default)]
    #[schemars(description = "Result mode: grouped (default) or raw")]
    pub result_mode: ResultMode,
    #[serde(default)]
    #[schemars(description = "Grouping key for grouped results: symbol (default) or file")]
    pub group_by: GroupBy,
    #[serde(default)]
    #[schemars(description = "Ranking mode: auto_changed_first (default) or default")]
    pub ranking_mode: RankingMode,
    /// Maximum results; clamped by the capability resolver
    #[schemars(description = "Maximum number of results")]
    pub limit: Option<usize>,
    #[serde(default)]
    #[schemars(description = "Include scoring diagnostics in the response")]
    pub debug: bool,
}

/// Read modes for read_file
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadFileMode {
    #[default]
    Plain,
    Annotated,
}

/// Symbol selector for read_file
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct OpenSymbolArgs {
    #[schemars(description = "Exact symbol id to open")]
    pub symbol_id: Option<String>,
    #[schemars(description = "Exact symbol label to open")]
    pub symbol_label: Option<String>,
    #[schemars(description = "Direct span start, 1-based inclusive")]
    pub start_line: Option<u32>,
    #[schemars(description = "Direct span end, 1-based inclusive")]
    pub end_line: Option<u32>,
}

/// Arguments for the read_file tool
#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[schemars(description = "Read a file with line-range and symbol-aware options")]
pub struct ReadFileArgs {
    /// Absolute path of the file
    #[validate(length(min = 1, message = "Path cannot be empty"))]
    #[schemars(description = "Absolute path of the file to read")]
    pub path: String,
    #[schemars(description = "First line to read, 1-based inclusive")]
    pub start_line: Option<u32>,
    #[schemars(description = "Last line to read, 1-based inclusive")]
    pub end_line: Option<u32>,
    #[serde(default)]
    #[schemars(description = "Read mode: plain (default) or annotated")]
    pub mode: ReadFileMode,
    #[schemars(description = "Open a symbol's span instead of an explicit range")]
    pub open_symbol: Option<OpenSymbolArgs>,
}

/// Resolve modes for file_outline
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutlineResolveMode {
    #[default]
    Outline,
    Exact,
}

/// Arguments for the file_outline tool
#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[schemars(description = "Sidecar-backed symbol outline of one file")]
pub struct FileOutlineArgs {
    /// Absolute path of the codebase root
    #[validate(length(min = 1, message = "Path cannot be empty"))]
    #[schemars(description = "Absolute path of the codebase root")]
    pub path: String,
    /// File to outline, relative to the codebase root
    #[validate(length(min = 1, message = "File cannot be empty"))]
    #[schemars(description = "File path relative to the codebase root")]
    pub file: String,
    #[schemars(description = "Restrict to symbols overlapping this start line")]
    pub start_line: Option<u32>,
    #[schemars(description = "Restrict to symbols overlapping this end line")]
    pub end_line: Option<u32>,
    #[schemars(description = "Maximum symbols returned (up to 500)")]
    pub limit_symbols: Option<usize>,
    #[serde(default)]
    #[schemars(description = "outline (default) lists symbols; exact resolves one selector")]
    pub resolve_mode: OutlineResolveMode,
    #[schemars(description = "Exact symbol id, required for exact mode")]
    pub symbol_id_exact: Option<String>,
    #[schemars(description = "Exact symbol label, alternative exact selector")]
    pub symbol_label_exact: Option<String>,
}

/// Arguments for the call_graph tool
#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[schemars(description = "Heuristic call-graph query around one symbol")]
pub struct CallGraphArgs {
    /// Absolute path of the codebase root
    #[validate(length(min = 1, message = "Path cannot be empty"))]
    #[schemars(description = "Absolute path of the codebase root")]
    pub path: String,
    /// Symbol reference: id, label, name, or path#name
    #[validate(length(min = 1, message = "Symbol reference cannot be empty"))]
    #[schemars(description = "Symbol id, exact label, bare name, or path#name")]
    pub symbol_ref: String,
    #[serde(default)]
    #[schemars(description = "Traversal direction: callers, callees, or both (default)")]
    pub direction: Direction,
    #[serde(default = "default_depth")]
    #[schemars(description = "Traversal depth, 1..=3")]
    pub depth: usize,
    #[serde(default = "default_edge_limit")]
    #[schemars(description = "Maximum edges in the subgraph")]
    pub limit: usize,
}

/// Arguments for the list_codebases tool
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[schemars(description = "List every tracked codebase with status and metadata")]
pub struct ListCodebasesArgs {}

fn default_depth() -> usize {
    1
}

fn default_edge_limit() -> usize {
    50
}

fn validate_absolute_path(path: &str) -> Result<(), validator::ValidationError> {
    if !std::path::Path::new(path).is_absolute() {
        return Err(validator::ValidationError::new("path_not_absolute"));
    }
    if path.contains("..") {
        return Err(validator::ValidationError::new("path_traversal"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manage_index_args_parse_with_defaults() {
        let args: ManageIndexArgs = serde_json::from_str(
            r#"{ "action": "create", "path": "/repo" }"#,
        )
        .unwrap();
        assert_eq!(args.action, ManageIndexAction::Create);
        assert!(!args.force);
        assert_eq!(args.splitter, SplitterKind::Ast);
        assert!(args.custom_extensions.is_empty());
    }

    #[test]
    fn search_defaults_follow_the_documented_contract() {
        let args: SearchCodebaseArgs = serde_json::from_str(
            r#"{ "path": "/repo", "query": "find auth" }"#,
        )
        .unwrap();
        assert_eq!(args.scope, SearchScope::Runtime);
        assert_eq!(args.result_mode, ResultMode::Grouped);
        assert_eq!(args.group_by, GroupBy::Symbol);
        assert_eq!(args.ranking_mode, RankingMode::AutoChangedFirst);
        assert!(args.limit.is_none());
    }

    #[test]
    fn relative_paths_fail_validation() {
        let args: ManageIndexArgs = serde_json::from_str(
            r#"{ "action": "status", "path": "relative/path" }"#,
        )
        .unwrap();
        assert!(args.validate().is_err());
    }
}
