//! Sidecar graph builder
//!
//! Splits each supported source file through the same AST pipeline as the
//! index, upserts one node per symbol id with the union of its chunk
//! spans, then scans definition bodies line-by-line for import clauses and
//! call sites. Resolution goes through a lowercased name index preferring
//! same-file candidates, then minimum span distance to the call line.

use crate::callgraph::{EdgeKind, GraphNote, LineSpan, NoteKind, SymbolEdge, SymbolNode};
use crate::chunking::languages::call_graph_build_extensions;
use crate::chunking::symbols::symbol_name_from_label;
use crate::chunking::Splitter;
use crate::domain::error::Result;
use crate::domain::types::Language;
use crate::index::ignore::CompiledIgnore;
use crate::infrastructure::paths::normalize_separators;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

/// Confidence table per edge kind and locality
const IMPORT_SAME_FILE: f32 = 0.65;
const IMPORT_CROSS_FILE: f32 = 0.55;
const CALL_SAME_FILE: f32 = 0.92;
const CALL_CROSS_FILE: f32 = 0.78;
const DYNAMIC_SAME_FILE: f32 = 0.72;
const DYNAMIC_CROSS_FILE: f32 = 0.62;

/// Identifiers never treated as call targets
const CALL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "def", "super", "constructor",
    "require", "import", "await", "typeof", "new", "in", "not", "and", "or", "elif", "else",
    "try", "except", "with", "lambda", "yield", "assert", "raise", "print", "len", "str", "int",
    "isinstance", "range", "type",
];

/// Build outcome before sidecar metadata is attached
pub struct BuiltGraph {
    pub nodes: Vec<SymbolNode>,
    pub edges: Vec<SymbolEdge>,
    pub notes: Vec<GraphNote>,
}

/// Build the graph for a codebase root
pub fn build_graph(root: &Path, matcher: &CompiledIgnore) -> Result<BuiltGraph> {
    let splitter = Splitter::default();
    let extensions = call_graph_build_extensions();

    let mut nodes: HashMap<String, SymbolNode> = HashMap::new();
    let mut file_contents: HashMap<String, String> = HashMap::new();

    let mut files = Vec::new();
    collect_files(root, root, matcher, &extensions, &mut files);
    files.sort();

    for relative in &files {
        let abs = root.join(relative);
        let content = match std::fs::read_to_string(&abs) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {}: {}", abs.display(), e);
                continue;
            }
        };
        let ext = relative.rsplit('.').next().unwrap_or("");
        let language = Language::from_extension(ext);
        let chunks = splitter.split_file(&content, language, &abs.to_string_lossy(), relative);

        for chunk in chunks {
            let Some(symbol_id) = chunk.symbol_id else {
                continue;
            };
            let span = LineSpan {
                start: chunk.start_line,
                end: chunk.end_line,
            };
            nodes
                .entry(symbol_id.clone())
                .and_modify(|node| node.span = node.span.union(span))
                .or_insert(SymbolNode {
                    symbol_id,
                    symbol_label: chunk.symbol_label.clone(),
                    file: relative.clone(),
                    language: language.as_str().to_string(),
                    span,
                });
        }
        file_contents.insert(relative.clone(), content);
    }

    let node_list: Vec<SymbolNode> = {
        let mut list: Vec<SymbolNode> = nodes.into_values().collect();
        list.sort_by(|a, b| {
            (a.file.as_str(), a.span.start, &a.symbol_id)
                .cmp(&(b.file.as_str(), b.span.start, &b.symbol_id))
        });
        list
    };
    let name_index = build_name_index(&node_list);

    let mut edges: Vec<SymbolEdge> = Vec::new();
    let mut notes: Vec<GraphNote> = Vec::new();

    for node in &node_list {
        if !is_definition_label(node.symbol_label.as_deref()) {
            continue;
        }
        let Some(content) = file_contents.get(&node.file) else {
            continue;
        };
        scan_node_body(node, content, &node_list, &name_index, &mut edges, &mut notes);
    }

    dedup_edges(&mut edges);
    Ok(BuiltGraph {
        nodes: node_list,
        edges,
        notes,
    })
}

fn collect_files(
    root: &Path,
    dir: &Path,
    matcher: &CompiledIgnore,
    extensions: &[&str],
    out: &mut Vec<String>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map(|rel| normalize_separators(&rel.to_string_lossy()))
            .unwrap_or_default();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if !matcher.is_ignored(&relative, true) {
                collect_files(root, &path, matcher, extensions, out);
            }
        } else if file_type.is_file() && !matcher.is_ignored(&relative, false) {
            let ext = relative.rsplit('.').next().unwrap_or("");
            if extensions.contains(&ext) {
                out.push(relative);
            }
        }
    }
}

/// Lowercased symbol name -> candidate nodes, sorted by file then start line
fn build_name_index(nodes: &[SymbolNode]) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        let Some(label) = node.symbol_label.as_deref() else {
            continue;
        };
        let Some(name) = symbol_name_from_label(label) else {
            continue;
        };
        index.entry(name.to_lowercase()).or_default().push(idx);
    }
    for candidates in index.values_mut() {
        candidates.sort_by(|a, b| {
            let (na, nb) = (&nodes[*a], &nodes[*b]);
            (na.file.as_str(), na.span.start).cmp(&(nb.file.as_str(), nb.span.start))
        });
    }
    index
}

fn is_definition_label(label: Option<&str>) -> bool {
    let Some(label) = label else {
        return false;
    };
    ["class ", "interface ", "function ", "method ", "def "]
        .iter()
        .any(|prefix| {
            label.starts_with(prefix) || label.starts_with(&format!("async {}", prefix))
        })
}

fn import_clause_regexes() -> &'static [Regex; 2] {
    static REGEXES: OnceLock<[Regex; 2]> = OnceLock::new();
    REGEXES.get_or_init(|| {
        [
            Regex::new(r#"import\s*\{([^}]+)\}\s*from\s*['"][^'"]+['"]"#).unwrap(),
            Regex::new(r"from\s+\S+\s+import\s+(.+)").unwrap(),
        ]
    })
}

fn call_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap())
}

fn scan_node_body(
    node: &SymbolNode,
    content: &str,
    nodes: &[SymbolNode],
    name_index: &HashMap<String, Vec<usize>>,
    edges: &mut Vec<SymbolEdge>,
    notes: &mut Vec<GraphNote>,
) {
    let lines: Vec<&str> = content.lines().collect();
    let end = (node.span.end as usize).min(lines.len());
    let start = (node.span.start.saturating_sub(1) as usize).min(end);

    for (offset, line) in lines[start..end].iter().enumerate() {
        let line_no = node.span.start + offset as u32;

        // Import clauses resolve each imported name
        for regex in import_clause_regexes() {
            if let Some(captures) = regex.captures(line) {
                let names = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                for raw in names.split(',') {
                    let name = raw
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
                    if name.is_empty() || name == "*" {
                        continue;
                    }
                    match resolve(name, node, nodes, name_index, line_no) {
                        Some(target) => {
                            let same_file = nodes[target].file == node.file;
                            edges.push(SymbolEdge {
                                from: node.symbol_id.clone(),
                                to: nodes[target].symbol_id.clone(),
                                kind: EdgeKind::Import,
                                confidence: if same_file {
                                    IMPORT_SAME_FILE
                                } else {
                                    IMPORT_CROSS_FILE
                                },
                                line: line_no,
                            });
                        }
                        None => {}
                    }
                }
            }
        }

        // `getattr(` is inherently dynamic
        if line.contains("getattr(") {
            notes.push(GraphNote {
                kind: NoteKind::DynamicEdge,
                file: node.file.clone(),
                line: line_no,
                name: "getattr".to_string(),
                from_symbol: Some(node.symbol_id.clone()),
            });
        }

        for captures in call_regex().captures_iter(line) {
            let Some(m) = captures.get(1) else {
                continue;
            };
            let name = m.as_str();
            if CALL_KEYWORDS.contains(&name) {
                continue;
            }
            // Definition-site matches are not calls
            if is_definition_line(line, name) {
                continue;
            }
            let member_call = line[..m.start()].trim_end().ends_with('.');

            match resolve(name, node, nodes, name_index, line_no) {
                Some(target) => {
                    let same_file = nodes[target].file == node.file;
                    let (kind, confidence) = if member_call {
                        (
                            EdgeKind::Dynamic,
                            if same_file {
                                DYNAMIC_SAME_FILE
                            } else {
                                DYNAMIC_CROSS_FILE
                            },
                        )
                    } else {
                        (
                            EdgeKind::Call,
                            if same_file { CALL_SAME_FILE } else { CALL_CROSS_FILE },
                        )
                    };
                    edges.push(SymbolEdge {
                        from: node.symbol_id.clone(),
                        to: nodes[target].symbol_id.clone(),
                        kind,
                        confidence,
                        line: line_no,
                    });
                }
                None => {
                    notes.push(GraphNote {
                        kind: if member_call {
                            NoteKind::DynamicEdge
                        } else {
                            NoteKind::UnresolvedEdge
                        },
                        file: node.file.clone(),
                        line: line_no,
                        name: name.to_string(),
                        from_symbol: Some(node.symbol_id.clone()),
                    });
                }
            }
        }
    }
}

fn is_definition_line(line: &str, name: &str) -> bool {
    let trimmed = line.trim_start();
    ["def ", "async def ", "function ", "async function ", "class "]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix) && trimmed[prefix.len()..].starts_with(name))
}

/// Resolve a name to a node: same-file candidates first, then minimum
/// span distance to the call line; deterministic tiebreak by file, start
/// line, label, id
fn resolve(
    name: &str,
    from: &SymbolNode,
    nodes: &[SymbolNode],
    name_index: &HashMap<String, Vec<usize>>,
    call_line: u32,
) -> Option<usize> {
    let candidates = name_index.get(&name.to_lowercase())?;
    let candidates: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|idx| nodes[*idx].symbol_id != from.symbol_id)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let same_file: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|idx| nodes[*idx].file == from.file)
        .collect();
    let pool = if same_file.is_empty() {
        candidates
    } else {
        same_file
    };

    pool.into_iter().min_by(|a, b| {
        let (na, nb) = (&nodes[*a], &nodes[*b]);
        let dist_a = na.span.start.abs_diff(call_line);
        let dist_b = nb.span.start.abs_diff(call_line);
        dist_a
            .cmp(&dist_b)
            .then_with(|| na.file.cmp(&nb.file))
            .then_with(|| na.span.start.cmp(&nb.span.start))
            .then_with(|| na.symbol_label.cmp(&nb.symbol_label))
            .then_with(|| na.symbol_id.cmp(&nb.symbol_id))
    })
}

fn dedup_edges(edges: &mut Vec<SymbolEdge>) {
    let mut seen: HashMap<(String, String, EdgeKind), f32> = HashMap::new();
    let mut kept: Vec<SymbolEdge> = Vec::with_capacity(edges.len());
    for edge in edges.drain(..) {
        let key = (edge.from.clone(), edge.to.clone(), edge.kind);
        match seen.get(&key) {
            Some(confidence) if *confidence >= edge.confidence => {}
            _ => {
                seen.insert(key.clone(), edge.confidence);
                kept.retain(|e| (e.from.clone(), e.to.clone(), e.kind) != key);
                kept.push(edge);
            }
        }
    }
    *edges = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ignore::IgnoreState;
    use tempfile::TempDir;

    fn build_fixture(files: &[(&str, &str)]) -> BuiltGraph {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let canonical = dir.path().to_string_lossy().to_string();
        let mut ignore = IgnoreState::new(&[]);
        let matcher = ignore.matcher_for(&canonical).unwrap();
        build_graph(dir.path(), &matcher).unwrap()
    }

    #[test]
    fn same_file_call_produces_high_confidence_edge() {
        let graph = build_fixture(&[(
            "app.py",
            "def helper(x):\n    return x\n\ndef main():\n    return helper(1)\n",
        )]);
        assert_eq!(graph.nodes.len(), 2);
        let edge = graph
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Call)
            .expect("call edge");
        assert!((edge.confidence - CALL_SAME_FILE).abs() < f32::EPSILON);
    }

    #[test]
    fn unresolved_call_becomes_a_note() {
        let graph = build_fixture(&[(
            "app.py",
            "def main():\n    return mystery_function(1)\n",
        )]);
        assert!(graph
            .notes
            .iter()
            .any(|n| n.kind == NoteKind::UnresolvedEdge && n.name == "mystery_function"));
    }

    #[test]
    fn getattr_emits_dynamic_note() {
        let graph = build_fixture(&[(
            "app.py",
            "def main(obj):\n    return getattr(obj, 'x')\n",
        )]);
        assert!(graph
            .notes
            .iter()
            .any(|n| n.kind == NoteKind::DynamicEdge && n.name == "getattr"));
    }

    #[test]
    fn member_call_is_classified_dynamic() {
        let graph = build_fixture(&[(
            "svc.ts",
            "function helper() {\n  return 1;\n}\n\nfunction run(service) {\n  return service.helper();\n}\n",
        )]);
        let edge = graph
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Dynamic)
            .expect("dynamic edge");
        assert!((edge.confidence - DYNAMIC_SAME_FILE).abs() < f32::EPSILON);
    }

    #[test]
    fn keywords_are_never_call_targets() {
        let graph = build_fixture(&[(
            "app.py",
            "def main(x):\n    if (x):\n        print(x)\n    return len(x)\n",
        )]);
        assert!(graph.edges.is_empty());
    }
}
