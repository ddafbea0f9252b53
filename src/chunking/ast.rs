//! AST-driven splitter
//!
//! Walks the tree-sitter parse tree, emitting one chunk per splittable node
//! and maintaining a scope stack so each chunk carries breadcrumbs and a
//! symbol identity. Nodes larger than the chunk budget descend into their
//! children; leaves that are still oversized are emitted whole and
//! subdivided line-by-line afterwards, keeping their breadcrumbs.

use crate::chunking::languages::{grammar_for, splittable_node_kinds};
use crate::chunking::symbols::{scope_label, symbol_id};
use crate::domain::error::{Error, Result};
use crate::domain::types::{Chunk, Language};
use crate::infrastructure::constants::BREADCRUMB_MAX_DEPTH;
use tree_sitter::Node;

/// AST splitter for one language family
pub struct AstSplitter {
    chunk_size: usize,
}

struct SplitContext<'a> {
    source: &'a str,
    language: Language,
    file_path: &'a str,
    normalized_path: &'a str,
    splittable: &'static [&'static str],
}

impl AstSplitter {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Split source text along syntactic boundaries.
    ///
    /// `file_path` is the absolute path recorded on chunks; `normalized_path`
    /// is the forward-slash relative path used for symbol ids.
    pub fn split(
        &self,
        content: &str,
        language: Language,
        file_path: &str,
        normalized_path: &str,
    ) -> Result<Vec<Chunk>> {
        let grammar = grammar_for(language)
            .ok_or_else(|| Error::internal(format!("No grammar for {}", language)))?;

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| Error::internal(format!("Failed to set parser language: {:?}", e)))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| Error::internal("Parsing failed"))?;

        let ctx = SplitContext {
            source: content,
            language,
            file_path,
            normalized_path,
            splittable: splittable_node_kinds(language),
        };

        let mut chunks = Vec::new();
        let mut scope_stack = Vec::new();
        self.visit(&tree.root_node(), &ctx, &mut scope_stack, &mut chunks);
        Ok(chunks)
    }

    /// Depth-first visit. Returns the number of chunks emitted in the
    /// subtree so an oversized splittable node with no splittable
    /// descendants still produces a chunk.
    fn visit(
        &self,
        node: &Node,
        ctx: &SplitContext<'_>,
        scope_stack: &mut Vec<String>,
        out: &mut Vec<Chunk>,
    ) -> usize {
        let label = scope_label(node, ctx.language, ctx.source);
        if let Some(ref l) = label {
            scope_stack.push(l.clone());
        }

        let mut emitted = 0usize;
        let is_splittable = ctx.splittable.contains(&node.kind());
        let text = node.utf8_text(ctx.source.as_bytes()).unwrap_or("");

        if is_splittable && !text.trim().is_empty() && text.chars().count() <= self.chunk_size {
            self.emit(node, text, ctx, scope_stack, out);
            emitted += 1;
        } else {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            for child in &children {
                emitted += self.visit(child, ctx, scope_stack, out);
            }
            // Oversized node with nothing extractable below it: emit whole,
            // line subdivision happens downstream
            if is_splittable && emitted == 0 && !text.trim().is_empty() {
                self.emit(node, text, ctx, scope_stack, out);
                emitted += 1;
            }
        }

        if label.is_some() {
            scope_stack.pop();
        }
        emitted
    }

    fn emit(
        &self,
        node: &Node,
        text: &str,
        ctx: &SplitContext<'_>,
        scope_stack: &[String],
        out: &mut Vec<Chunk>,
    ) {
        let start_line = node.start_position().row as u32 + 1;
        let end_line = node.end_position().row as u32 + 1;

        let breadcrumbs = last_scope_labels(scope_stack);
        let symbol_label = scope_stack.last().cloned();
        let sym = symbol_label
            .as_deref()
            .map(|label| symbol_id(ctx.normalized_path, start_line, end_line, label));

        out.push(Chunk {
            content: text.to_string(),
            start_line,
            end_line,
            language: ctx.language,
            file_path: ctx.file_path.to_string(),
            breadcrumbs,
            symbol_label,
            symbol_id: sym,
        });
    }
}

/// The last two scope labels, deduplicated, outermost first
fn last_scope_labels(stack: &[String]) -> Option<Vec<String>> {
    if stack.is_empty() {
        return None;
    }
    let mut labels: Vec<String> = Vec::with_capacity(BREADCRUMB_MAX_DEPTH);
    for label in stack.iter().rev() {
        if labels.len() == BREADCRUMB_MAX_DEPTH {
            break;
        }
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }
    labels.reverse();
    Some(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_ts(content: &str, chunk_size: usize) -> Vec<Chunk> {
        AstSplitter::new(chunk_size)
            .split(content, Language::TypeScript, "/repo/src/auth.ts", "src/auth.ts")
            .unwrap()
    }

    #[test]
    fn class_method_chunks_carry_breadcrumbs() {
        let source = r#"
class AuthManager {
    async validate(token: string) {
        const decoded = decode(token);
        return decoded !== null;
    }
}
"#;
        let chunks = split_ts(source, 60);
        let method = chunks
            .iter()
            .find(|c| c.symbol_label.as_deref() == Some("async method validate(token: string)"))
            .expect("method chunk");
        assert_eq!(
            method.breadcrumbs.as_deref(),
            Some(
                &[
                    "class AuthManager".to_string(),
                    "async method validate(token: string)".to_string()
                ][..]
            )
        );
        assert!(method.symbol_id.as_deref().unwrap().starts_with("sym_"));
    }

    #[test]
    fn small_class_emits_one_chunk() {
        let source = "class A { f() { return 1; } }\n";
        let chunks = split_ts(source, 2500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].symbol_label.as_deref(), Some("class A"));
    }

    #[test]
    fn python_function_labels_use_def_grammar() {
        let source = "async def handle(req):\n    return req\n";
        let chunks = AstSplitter::new(2500)
            .split(source, Language::Python, "/repo/app.py", "app.py")
            .unwrap();
        assert_eq!(
            chunks[0].symbol_label.as_deref(),
            Some("async def handle(req)")
        );
    }

    #[test]
    fn breadcrumbs_never_exceed_two_entries() {
        let source = r#"
class Outer {
    inner() {
        function nested() {
            function deepest() { return 1; }
            return deepest;
        }
        return nested;
    }
}
"#;
        let chunks = split_ts(source, 40);
        for chunk in &chunks {
            if let Some(crumbs) = &chunk.breadcrumbs {
                assert!(crumbs.len() <= 2);
                for crumb in crumbs {
                    assert!(crumb.chars().count() <= 120);
                }
            }
        }
    }

    #[test]
    fn line_numbers_are_one_based_inclusive() {
        let source = "class A {\n  f() {\n    return 1;\n  }\n}\n";
        let chunks = split_ts(source, 2500);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 5);
    }
}
