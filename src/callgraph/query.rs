//! Call-graph queries
//!
//! Bounded BFS over the sidecar graph. Adjacency maps are built on demand
//! per query; nodes and edges stay in flat lists and edges never hold node
//! pointers.

use crate::callgraph::{CallGraphSidecar, GraphNote, SymbolEdge, SymbolNode};
use crate::chunking::languages::{call_graph_build_extensions, supports_call_graph_query};
use crate::infrastructure::constants::CALL_GRAPH_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Traversal direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Callers,
    Callees,
    #[default]
    Both,
}

/// One call-graph query
#[derive(Debug, Clone)]
pub struct CallGraphQuery {
    pub symbol_ref: String,
    pub direction: Direction,
    pub depth: usize,
    pub limit: usize,
}

/// Sidecar metadata echoed with every successful response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SidecarMeta {
    pub built_at: String,
    pub node_count: usize,
    pub edge_count: usize,
}

/// The visited subgraph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subgraph {
    pub root: String,
    pub nodes: Vec<SymbolNode>,
    pub edges: Vec<SymbolEdge>,
    pub notes: Vec<GraphNote>,
}

/// Query response: a subgraph, or a structured refusal with hints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<Subgraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<SidecarMeta>,
}

impl QueryResponse {
    pub fn unsupported_language() -> Self {
        Self {
            supported: false,
            reason: Some("unsupported_language".to_string()),
            hints: Some(serde_json::json!({
                "supportedExtensions": call_graph_build_extensions(),
            })),
            graph: None,
            sidecar: None,
        }
    }

    pub fn missing_sidecar(canonical_path: &str) -> Self {
        Self {
            supported: false,
            reason: Some("missing_sidecar".to_string()),
            hints: Some(serde_json::json!({
                "reindex": {
                    "tool": "manage_index",
                    "args": { "action": "reindex", "path": canonical_path },
                }
            })),
            graph: None,
            sidecar: None,
        }
    }

    pub fn missing_symbol() -> Self {
        Self {
            supported: false,
            reason: Some("missing_symbol".to_string()),
            hints: None,
            graph: None,
            sidecar: None,
        }
    }
}

/// Execute a query against a loaded sidecar
pub fn run_query(sidecar: &CallGraphSidecar, query: &CallGraphQuery) -> QueryResponse {
    // A path-shaped symbolRef gates on the file's language first
    if let Some(file) = path_part(&query.symbol_ref) {
        let extension = file.rsplit('.').next().unwrap_or("");
        if !supports_call_graph_query(extension) {
            return QueryResponse::unsupported_language();
        }
    }

    let Some(root) = resolve_symbol(sidecar, &query.symbol_ref) else {
        return QueryResponse::missing_symbol();
    };

    let depth = query.depth.clamp(1, CALL_GRAPH_MAX_DEPTH);
    let limit = query.limit.max(1);

    // Deterministically sorted adjacency, built per query
    let mut outgoing: HashMap<&str, Vec<&SymbolEdge>> = HashMap::new();
    let mut incoming: HashMap<&str, Vec<&SymbolEdge>> = HashMap::new();
    for edge in &sidecar.edges {
        outgoing.entry(edge.from.as_str()).or_default().push(edge);
        incoming.entry(edge.to.as_str()).or_default().push(edge);
    }
    for adjacency in [&mut outgoing, &mut incoming] {
        for edges in adjacency.values_mut() {
            edges.sort_by(|a, b| {
                (&a.from, &a.to, a.kind as u8, a.line).cmp(&(&b.from, &b.to, b.kind as u8, b.line))
            });
        }
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut selected_edges: Vec<SymbolEdge> = Vec::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    visited.insert(root.symbol_id.clone());
    queue.push_back((root.symbol_id.clone(), 0));

    'bfs: while let Some((current, level)) = queue.pop_front() {
        if level >= depth {
            continue;
        }
        let mut neighbors: Vec<(&SymbolEdge, &str)> = Vec::new();
        if matches!(query.direction, Direction::Callees | Direction::Both) {
            if let Some(edges) = outgoing.get(current.as_str()) {
                neighbors.extend(edges.iter().map(|e| (*e, e.to.as_str())));
            }
        }
        if matches!(query.direction, Direction::Callers | Direction::Both) {
            if let Some(edges) = incoming.get(current.as_str()) {
                neighbors.extend(edges.iter().map(|e| (*e, e.from.as_str())));
            }
        }
        for (edge, neighbor) in neighbors {
            if selected_edges.len() >= limit {
                break 'bfs;
            }
            if selected_edges.iter().any(|e| e == edge) {
                continue;
            }
            selected_edges.push(edge.clone());
            if visited.insert(neighbor.to_string()) {
                queue.push_back((neighbor.to_string(), level + 1));
            }
        }
    }

    let nodes: Vec<SymbolNode> = sidecar
        .nodes
        .iter()
        .filter(|node| visited.contains(&node.symbol_id))
        .cloned()
        .collect();
    let notes: Vec<GraphNote> = sidecar
        .notes
        .iter()
        .filter(|note| {
            note.from_symbol
                .as_deref()
                .map(|symbol| visited.contains(symbol))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    QueryResponse {
        supported: true,
        reason: None,
        hints: None,
        graph: Some(Subgraph {
            root: root.symbol_id.clone(),
            nodes,
            edges: selected_edges,
            notes,
        }),
        sidecar: Some(SidecarMeta {
            built_at: sidecar.built_at.clone(),
            node_count: sidecar.nodes.len(),
            edge_count: sidecar.edges.len(),
        }),
    }
}

/// The file path portion of a path-shaped symbol reference
/// (`src/app.py#handler` or `src/app.py`)
pub fn path_part(symbol_ref: &str) -> Option<&str> {
    let candidate = symbol_ref.split('#').next().unwrap_or(symbol_ref);
    if candidate.contains('/') || candidate.contains('.') && !candidate.starts_with("sym_") {
        Some(candidate)
    } else {
        None
    }
}

/// Resolve a symbol reference: exact id, exact label, bare name, or the
/// `path#name` form
fn resolve_symbol<'a>(
    sidecar: &'a CallGraphSidecar,
    symbol_ref: &str,
) -> Option<&'a SymbolNode> {
    if let Some(node) = sidecar.node(symbol_ref) {
        return Some(node);
    }
    if let Some(node) = sidecar
        .nodes
        .iter()
        .find(|node| node.symbol_label.as_deref() == Some(symbol_ref))
    {
        return Some(node);
    }

    let (file, name) = match symbol_ref.split_once('#') {
        Some((file, name)) => (Some(file), name),
        None => (None, symbol_ref),
    };
    let name = name.to_lowercase();
    let mut candidates: Vec<&SymbolNode> = sidecar
        .nodes
        .iter()
        .filter(|node| {
            file.map(|f| node.file == f).unwrap_or(true)
                && node
                    .symbol_label
                    .as_deref()
                    .and_then(crate::chunking::symbols::symbol_name_from_label)
                    .map(|n| n.to_lowercase() == name)
                    .unwrap_or(false)
        })
        .collect();
    candidates.sort_by(|a, b| {
        (a.file.as_str(), a.span.start, &a.symbol_id)
            .cmp(&(b.file.as_str(), b.span.start, &b.symbol_id))
    });
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{EdgeKind, LineSpan, SIDECAR_FORMAT_V3};
    use crate::domain::types::{IndexFingerprint, SchemaVersion};

    fn node(id: &str, file: &str, start: u32) -> SymbolNode {
        SymbolNode {
            symbol_id: id.to_string(),
            symbol_label: Some(format!("function {}()", id)),
            file: file.to_string(),
            language: "typescript".to_string(),
            span: LineSpan {
                start,
                end: start + 5,
            },
        }
    }

    fn edge(from: &str, to: &str) -> SymbolEdge {
        SymbolEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind: EdgeKind::Call,
            confidence: 0.92,
            line: 1,
        }
    }

    fn sidecar() -> CallGraphSidecar {
        CallGraphSidecar {
            format_version: SIDECAR_FORMAT_V3.to_string(),
            codebase_path: "/repo".to_string(),
            built_at: "2026-01-01T00:00:00Z".to_string(),
            fingerprint: IndexFingerprint {
                embedding_provider: "openai".into(),
                embedding_model: "m".into(),
                embedding_dimension: 8,
                vector_store_provider: "memory".into(),
                schema_version: SchemaVersion::HybridV3,
            },
            nodes: vec![
                node("a", "src/a.ts", 1),
                node("b", "src/a.ts", 10),
                node("c", "src/b.ts", 1),
            ],
            edges: vec![edge("a", "b"), edge("b", "c")],
            notes: vec![],
        }
    }

    #[test]
    fn depth_one_limit_one_returns_single_edge() {
        let sidecar = sidecar();
        let response = run_query(
            &sidecar,
            &CallGraphQuery {
                symbol_ref: "a".to_string(),
                direction: Direction::Callees,
                depth: 3,
                limit: 1,
            },
        );
        let graph = response.graph.unwrap();
        assert_eq!(graph.edges.len(), 1);
        // Nodes are the one edge's endpoints plus the query symbol
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn callers_walk_incoming_edges() {
        let sidecar = sidecar();
        let response = run_query(
            &sidecar,
            &CallGraphQuery {
                symbol_ref: "c".to_string(),
                direction: Direction::Callers,
                depth: 2,
                limit: 10,
            },
        );
        let graph = response.graph.unwrap();
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.nodes.len(), 3);
    }

    #[test]
    fn unknown_symbol_is_refused() {
        let sidecar = sidecar();
        let response = run_query(
            &sidecar,
            &CallGraphQuery {
                symbol_ref: "zzz".to_string(),
                direction: Direction::Both,
                depth: 1,
                limit: 1,
            },
        );
        assert!(!response.supported);
        assert_eq!(response.reason.as_deref(), Some("missing_symbol"));
    }

    #[test]
    fn unsupported_extension_is_gated_before_resolution() {
        let sidecar = sidecar();
        let response = run_query(
            &sidecar,
            &CallGraphQuery {
                symbol_ref: "src/main.rs#main".to_string(),
                direction: Direction::Both,
                depth: 1,
                limit: 1,
            },
        );
        assert!(!response.supported);
        assert_eq!(response.reason.as_deref(), Some("unsupported_language"));
    }

    #[test]
    fn path_hash_name_resolves_within_file() {
        let sidecar = sidecar();
        let response = run_query(
            &sidecar,
            &CallGraphQuery {
                symbol_ref: "src/b.ts#c".to_string(),
                direction: Direction::Both,
                depth: 1,
                limit: 10,
            },
        );
        assert!(response.supported);
        assert_eq!(response.graph.unwrap().root, "c");
    }
}
