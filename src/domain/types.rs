//! Core domain model for the Satori indexing service
//!
//! Shared types for the chunk pipeline, the vector store schema, the
//! per-codebase lifecycle state, and the search surface. Everything that is
//! persisted or crosses the tool boundary serializes as camelCase JSON.

use serde::{Deserialize, Serialize};

/// Reserved file extension of the index-completion marker document.
/// Every filter expression the engine sends must exclude it.
pub const MARKER_FILE_EXTENSION: &str = ".satori-marker";

/// Reserved relative path of the completion marker document.
pub const MARKER_RELATIVE_PATH: &str = ".satori/index-completion";

/// Reserved id of the completion marker document.
pub const MARKER_DOCUMENT_ID: &str = "satori-index-completion";

/// Metadata kind tag carried by the completion marker payload.
pub const MARKER_KIND: &str = "satori_index_completion_v1";

/// A dense embedding vector with its provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Embedding {
    /// The embedding vector values
    pub vector: Vec<f32>,
    /// Name of the model that generated this embedding
    pub model: String,
    /// Dimensionality of the embedding vector
    pub dimensions: usize,
}

/// Languages the chunk pipeline understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Markdown,
    Json,
    Yaml,
    Toml,
    Unknown,
}

impl Language {
    /// Map a file extension to its canonical language id
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyi" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "mts" | "cts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "cs" => Language::CSharp,
            "md" | "markdown" => Language::Markdown,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "toml" => Language::Toml,
            _ => Language::Unknown,
        }
    }

    /// Canonical lowercase language id, as stored in document metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Markdown => "markdown",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rust" => Ok(Language::Rust),
            "python" => Ok(Language::Python),
            "javascript" => Ok(Language::JavaScript),
            "typescript" => Ok(Language::TypeScript),
            "go" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "c" => Ok(Language::C),
            "cpp" => Ok(Language::Cpp),
            "csharp" => Ok(Language::CSharp),
            "markdown" => Ok(Language::Markdown),
            "json" => Ok(Language::Json),
            "yaml" => Ok(Language::Yaml),
            "toml" => Ok(Language::Toml),
            _ => Ok(Language::Unknown),
        }
    }
}

/// A contiguous slice of source text produced by the splitter pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// The chunk text
    pub content: String,
    /// Starting line, 1-based inclusive
    pub start_line: u32,
    /// Ending line, 1-based inclusive
    pub end_line: u32,
    /// Language of the source file
    pub language: Language,
    /// Absolute file path at build time
    pub file_path: String,
    /// Enclosing scope labels, outermost first; at most two entries of
    /// at most 120 characters each
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadcrumbs: Option<Vec<String>>,
    /// Innermost scope label, when the chunk sits inside a named scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_label: Option<String>,
    /// Deterministic symbol id derived from path, span, and label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
}

/// Persisted record in the vector store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorDocument {
    /// Stable id derived from relative path, span, and content
    pub id: String,
    /// Dense embedding
    pub vector: Vec<f32>,
    /// The chunk text
    pub content: String,
    /// Path relative to the codebase root, forward slashes
    pub relative_path: String,
    /// Starting line, 1-based inclusive
    pub start_line: u32,
    /// Ending line, 1-based inclusive
    pub end_line: u32,
    /// File extension including the leading dot
    pub file_extension: String,
    /// Carried-through chunk metadata; the completion marker stores its own
    /// payload here instead
    pub metadata: serde_json::Value,
}

/// Metadata carried on every regular chunk document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub codebase_path: String,
    pub language: String,
    pub chunk_index: usize,
    /// ISO-8601 UTC timestamp of the inserting batch
    pub indexed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadcrumbs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_label: Option<String>,
}

/// Payload of the reserved completion-marker document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMarker {
    pub kind: String,
    pub codebase_path: String,
    pub fingerprint: IndexFingerprint,
    pub indexed_files: usize,
    pub total_chunks: usize,
    pub completed_at: String,
    pub run_id: String,
}

impl CompletionMarker {
    /// Parse a marker payload from document metadata, rejecting malformed
    /// or differently-tagged payloads.
    pub fn from_metadata(value: &serde_json::Value) -> Option<Self> {
        let marker: Self = serde_json::from_value(value.clone()).ok()?;
        if marker.kind == MARKER_KIND {
            Some(marker)
        } else {
            None
        }
    }
}

/// Index schema version; hybrid adds the sparse vector field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    #[serde(rename = "dense_v3")]
    DenseV3,
    #[serde(rename = "hybrid_v3")]
    HybridV3,
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DenseV3 => write!(f, "dense_v3"),
            Self::HybridV3 => write!(f, "hybrid_v3"),
        }
    }
}

/// The compatibility tuple binding an index to the runtime that built it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct IndexFingerprint {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub vector_store_provider: String,
    pub schema_version: SchemaVersion,
}

impl IndexFingerprint {
    /// Two fingerprints are compatible iff every field is equal
    pub fn is_compatible(&self, other: &IndexFingerprint) -> bool {
        self == other
    }

    /// Render as `provider/model/dim/store/schema` for gate messages
    pub fn render(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.embedding_provider,
            self.embedding_model,
            self.embedding_dimension,
            self.vector_store_provider,
            self.schema_version
        )
    }
}

/// How the recorded fingerprint came to be
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FingerprintSource {
    #[serde(rename = "verified")]
    Verified,
    /// Migrated from a pre-fingerprint snapshot format
    #[serde(rename = "assumed_v2")]
    AssumedV2,
}

/// Why an index entry was demoted to `requires_reindex`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReindexReason {
    LegacyUnverifiedFingerprint,
    FingerprintMismatch,
    MissingFingerprint,
}

impl std::fmt::Display for ReindexReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyUnverifiedFingerprint => write!(f, "legacy_unverified_fingerprint"),
            Self::FingerprintMismatch => write!(f, "fingerprint_mismatch"),
            Self::MissingFingerprint => write!(f, "missing_fingerprint"),
        }
    }
}

/// Terminal outcome of an index build
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexBuildOutcome {
    Completed,
    LimitReached,
}

/// Per-codebase lifecycle state; exactly one variant at any time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status")]
pub enum CodebaseStatus {
    #[serde(rename = "indexing", rename_all = "camelCase")]
    Indexing { indexing_percentage: f32 },
    #[serde(rename = "indexed", rename_all = "camelCase")]
    Indexed {
        indexed_files: usize,
        total_chunks: usize,
        index_status: IndexBuildOutcome,
    },
    #[serde(rename = "sync_completed", rename_all = "camelCase")]
    SyncCompleted {
        added: usize,
        removed: usize,
        modified: usize,
        total_changes: usize,
    },
    #[serde(rename = "indexfailed", rename_all = "camelCase")]
    IndexFailed {
        error_message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_attempted_percentage: Option<f32>,
    },
    #[serde(rename = "requires_reindex", rename_all = "camelCase")]
    RequiresReindex {
        message: String,
        reindex_reason: ReindexReason,
    },
}

impl CodebaseStatus {
    /// Wire name of the status, matching the serde tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::Indexing { .. } => "indexing",
            Self::Indexed { .. } => "indexed",
            Self::SyncCompleted { .. } => "sync_completed",
            Self::IndexFailed { .. } => "indexfailed",
            Self::RequiresReindex { .. } => "requires_reindex",
        }
    }

    /// Whether the codebase may serve search queries in this state
    pub fn is_searchable(&self) -> bool {
        matches!(self, Self::Indexed { .. } | Self::SyncCompleted { .. })
    }
}

/// Reference to a call-graph sidecar, stored in the lifecycle entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SidecarInfo {
    pub path: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub built_at: String,
    pub fingerprint: IndexFingerprint,
}

/// A tracked codebase: lifecycle status plus optional metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodebaseInfo {
    #[serde(flatten)]
    pub status: CodebaseStatus,
    /// ISO-8601 timestamp of the last transition or metadata update
    pub last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_fingerprint: Option<IndexFingerprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_source: Option<FingerprintSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_graph_sidecar: Option<SidecarInfo>,
    /// Sorted unique relative paths that went into the index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_manifest: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_rules_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_control_signature: Option<String>,
}

impl CodebaseInfo {
    pub fn new(status: CodebaseStatus) -> Self {
        Self {
            status,
            last_updated: chrono::Utc::now().to_rfc3339(),
            index_fingerprint: None,
            fingerprint_source: None,
            call_graph_sidecar: None,
            index_manifest: None,
            ignore_rules_version: None,
            ignore_control_signature: None,
        }
    }
}

/// Outcome of the fingerprint access gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Allowed,
    Denied {
        reason: ReindexReason,
        message: String,
    },
}

/// Access-gate result: whether the call may proceed and whether the
/// lifecycle entry changed as a side effect
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    pub outcome: GateOutcome,
    pub changed: bool,
}

impl AccessDecision {
    pub fn allowed(changed: bool) -> Self {
        Self {
            outcome: GateOutcome::Allowed,
            changed,
        }
    }

    pub fn denied(reason: ReindexReason, message: String, changed: bool) -> Self {
        Self {
            outcome: GateOutcome::Denied { reason, message },
            changed,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self.outcome, GateOutcome::Allowed)
    }
}

/// Changes applied by one incremental sync pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl SyncChanges {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    pub fn changed_files(&self) -> Vec<String> {
        let mut files = self.added.clone();
        files.extend(self.modified.iter().cloned());
        files
    }
}

/// Result of a synchronizer scan, including partial-scan diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
    /// Number of files whose content had to be re-hashed this run
    pub hashed_count: usize,
    /// True when at least one directory could not be enumerated
    pub partial_scan: bool,
    /// Relative prefixes of directories that could not be enumerated
    pub unscanned_dir_prefixes: Vec<String>,
}

impl ChangeReport {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }
}

/// Final statistics of an index build
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub indexed_files: usize,
    pub total_chunks: usize,
    pub status: IndexBuildOutcome,
}

/// One semantic search result projected from a vector-store hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub content: String,
    pub relative_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadcrumbs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_label: Option<String>,
}

/// Fields a filter condition can address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Language,
    RelativePath,
    FileExtension,
}

/// One condition in a conjunctive filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCond {
    Eq(FilterField, String),
    Ne(FilterField, String),
    PathPrefix(String),
    NotPathPrefix(String),
    PathContains(String),
    NotPathContains(String),
    ExtIn(Vec<String>),
    ExtNotIn(Vec<String>),
}

/// Conjunction of filter conditions applied to every search request.
/// Adapters render or evaluate it; the engine always appends the
/// completion-marker exclusion before dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpr {
    pub all: Vec<FilterCond>,
}

impl FilterExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, cond: FilterCond) -> Self {
        self.all.push(cond);
        self
    }

    pub fn push(&mut self, cond: FilterCond) {
        self.all.push(cond);
    }

    /// Whether a document passes every condition
    pub fn matches(&self, relative_path: &str, file_extension: &str, language: &str) -> bool {
        self.all.iter().all(|cond| match cond {
            FilterCond::Eq(FilterField::Language, v) => language == v,
            FilterCond::Eq(FilterField::RelativePath, v) => relative_path == v,
            FilterCond::Eq(FilterField::FileExtension, v) => file_extension == v,
            FilterCond::Ne(FilterField::Language, v) => language != v,
            FilterCond::Ne(FilterField::RelativePath, v) => relative_path != v,
            FilterCond::Ne(FilterField::FileExtension, v) => file_extension != v,
            FilterCond::PathPrefix(p) => relative_path.starts_with(p.as_str()),
            FilterCond::NotPathPrefix(p) => !relative_path.starts_with(p.as_str()),
            FilterCond::PathContains(p) => relative_path.contains(p.as_str()),
            FilterCond::NotPathContains(p) => !relative_path.contains(p.as_str()),
            FilterCond::ExtIn(exts) => exts.iter().any(|e| e == file_extension),
            FilterCond::ExtNotIn(exts) => exts.iter().all(|e| e != file_extension),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_compatibility_is_field_equality() {
        let a = IndexFingerprint {
            embedding_provider: "openai".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimension: 1536,
            vector_store_provider: "milvus".into(),
            schema_version: SchemaVersion::HybridV3,
        };
        let mut b = a.clone();
        assert!(a.is_compatible(&b));
        b.embedding_dimension = 1024;
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn status_serializes_with_wire_tags() {
        let status = CodebaseStatus::IndexFailed {
            error_message: "boom".into(),
            last_attempted_percentage: Some(42.0),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "indexfailed");
        assert_eq!(value["errorMessage"], "boom");

        let status = CodebaseStatus::SyncCompleted {
            added: 1,
            removed: 2,
            modified: 3,
            total_changes: 6,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "sync_completed");
        assert_eq!(value["totalChanges"], 6);
    }

    #[test]
    fn codebase_info_roundtrips_through_json() {
        let mut info = CodebaseInfo::new(CodebaseStatus::Indexed {
            indexed_files: 10,
            total_chunks: 120,
            index_status: IndexBuildOutcome::Completed,
        });
        info.index_manifest = Some(vec!["a.rs".into(), "b.rs".into()]);
        let json = serde_json::to_string(&info).unwrap();
        let back: CodebaseInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }

    #[test]
    fn filter_expr_evaluates_conjunction() {
        let filter = FilterExpr::new()
            .with(FilterCond::Ne(
                FilterField::FileExtension,
                MARKER_FILE_EXTENSION.into(),
            ))
            .with(FilterCond::PathPrefix("src/".into()));
        assert!(filter.matches("src/main.rs", ".rs", "rust"));
        assert!(!filter.matches("tests/main.rs", ".rs", "rust"));
        assert!(!filter.matches("src/x", MARKER_FILE_EXTENSION, "unknown"));
    }

    #[test]
    fn marker_payload_rejects_other_kinds() {
        let value = serde_json::json!({
            "kind": "something_else",
            "codebasePath": "/repo",
            "fingerprint": {
                "embeddingProvider": "openai",
                "embeddingModel": "m",
                "embeddingDimension": 8,
                "vectorStoreProvider": "memory",
                "schemaVersion": "dense_v3"
            },
            "indexedFiles": 1,
            "totalChunks": 2,
            "completedAt": "2026-01-01T00:00:00Z",
            "runId": "r"
        });
        assert!(CompletionMarker::from_metadata(&value).is_none());
    }
}
