//! Call-graph sidecar
//!
//! A per-codebase JSON file describing symbol nodes and heuristic edges
//! derived from chunk metadata. The graph is explicitly heuristic: edges
//! carry confidence scores and unresolved references become notes instead
//! of edges.

pub mod builder;
pub mod manager;
pub mod query;

pub use manager::CallGraphSidecarManager;
pub use query::{CallGraphQuery, Direction, QueryResponse};

use crate::domain::types::IndexFingerprint;
use serde::{Deserialize, Serialize};

/// Sidecar format tag
pub const SIDECAR_FORMAT_V3: &str = "v3";

/// Inclusive 1-based line span
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineSpan {
    pub start: u32,
    pub end: u32,
}

impl LineSpan {
    pub fn union(self, other: LineSpan) -> LineSpan {
        LineSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// One symbol in the graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolNode {
    pub symbol_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_label: Option<String>,
    /// Relative path with forward slashes
    pub file: String,
    pub language: String,
    pub span: LineSpan,
}

/// Edge classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Import,
    Call,
    Dynamic,
}

/// One heuristic edge with its confidence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub confidence: f32,
    pub line: u32,
}

/// Why a reference did not become an edge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    UnresolvedEdge,
    DynamicEdge,
}

/// A recorded unresolved or dynamic reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphNote {
    pub kind: NoteKind,
    pub file: String,
    pub line: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_symbol: Option<String>,
}

/// The persisted sidecar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphSidecar {
    pub format_version: String,
    pub codebase_path: String,
    pub built_at: String,
    pub fingerprint: IndexFingerprint,
    pub nodes: Vec<SymbolNode>,
    pub edges: Vec<SymbolEdge>,
    pub notes: Vec<GraphNote>,
}

impl CallGraphSidecar {
    /// Sort all lists deterministically before writing
    pub fn sort_for_write(&mut self) {
        self.nodes
            .sort_by(|a, b| (a.file.as_str(), a.span.start, &a.symbol_id)
                .cmp(&(b.file.as_str(), b.span.start, &b.symbol_id)));
        self.edges.sort_by(|a, b| {
            (&a.from, &a.to, a.kind as u8, a.line).cmp(&(&b.from, &b.to, b.kind as u8, b.line))
        });
        self.notes.sort_by(|a, b| {
            (&a.file, a.line, &a.name, a.kind as u8).cmp(&(&b.file, b.line, &b.name, b.kind as u8))
        });
    }

    pub fn node(&self, symbol_id: &str) -> Option<&SymbolNode> {
        self.nodes.iter().find(|node| node.symbol_id == symbol_id)
    }
}
