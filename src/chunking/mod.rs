//! Chunk pipeline
//!
//! Converts source text into an ordered list of chunks bounded by the
//! configured size budget. The AST path handles languages in the capability
//! table; everything else goes through the generic fallback splitter.
//! Oversized chunks are subdivided line-by-line with their breadcrumbs and
//! symbol metadata preserved, then overlap is applied from the preceding
//! chunk.

pub mod ast;
pub mod fallback;
pub mod languages;
pub mod symbols;

use crate::chunking::ast::AstSplitter;
use crate::chunking::fallback::FallbackSplitter;
use crate::chunking::languages::capabilities_for;
use crate::domain::types::{Chunk, Language};
use crate::infrastructure::constants::{CHUNK_OVERLAP, CHUNK_SIZE};
use serde::{Deserialize, Serialize};

/// Which splitting strategy to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitterKind {
    /// AST splitting with fallback for unsupported languages
    #[default]
    Ast,
    /// Generic character splitting for every file
    Langchain,
}

/// The chunk pipeline
#[derive(Debug, Clone)]
pub struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
    kind: SplitterKind,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP, SplitterKind::Ast)
    }
}

impl Splitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize, kind: SplitterKind) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            kind,
        }
    }

    pub fn with_kind(&self, kind: SplitterKind) -> Self {
        Self { kind, ..self.clone() }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split one file's text into bounded chunks.
    ///
    /// `file_path` is the absolute path recorded on chunks; `normalized_path`
    /// is the forward-slash relative path used for symbol ids.
    pub fn split_file(
        &self,
        content: &str,
        language: Language,
        file_path: &str,
        normalized_path: &str,
    ) -> Vec<Chunk> {
        let ast_supported = self.kind == SplitterKind::Ast
            && capabilities_for(language)
                .map(|caps| caps.ast_splitter)
                .unwrap_or(false);

        let chunks = if ast_supported {
            match AstSplitter::new(self.chunk_size).split(
                content,
                language,
                file_path,
                normalized_path,
            ) {
                Ok(chunks) if !chunks.is_empty() => chunks,
                Ok(_) => self.fallback(content, language, file_path),
                Err(e) => {
                    tracing::debug!("AST split failed for {}: {}", file_path, e);
                    self.fallback(content, language, file_path)
                }
            }
        } else {
            self.fallback(content, language, file_path)
        };

        self.enforce_size(chunks)
    }

    fn fallback(&self, content: &str, language: Language, file_path: &str) -> Vec<Chunk> {
        FallbackSplitter::new(self.chunk_size, self.chunk_overlap).split(
            content,
            language,
            file_path,
        )
    }

    /// Subdivide chunks above the size budget, preserving breadcrumbs and
    /// symbol metadata, then apply overlap between the sub-chunks
    fn enforce_size(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.content.chars().count() <= self.chunk_size {
                out.push(chunk);
            } else {
                out.extend(self.subdivide(chunk));
            }
        }
        out
    }

    fn subdivide(&self, chunk: Chunk) -> Vec<Chunk> {
        let mut pieces: Vec<(u32, u32, String)> = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;
        let mut piece_start = chunk.start_line;
        let mut line_no = chunk.start_line;

        for line in chunk.content.split_inclusive('\n') {
            let line_chars = line.chars().count();
            if buffer_chars > 0 && buffer_chars + line_chars > self.chunk_size {
                let end = line_no.saturating_sub(1).max(piece_start);
                pieces.push((piece_start, end, std::mem::take(&mut buffer)));
                buffer_chars = 0;
                piece_start = line_no;
            }
            if line_chars > self.chunk_size {
                // A single line above the budget: hard-split on char groups
                for group in char_groups(line, self.chunk_size) {
                    pieces.push((line_no, line_no, group.to_string()));
                }
                piece_start = line_no + 1;
            } else {
                buffer.push_str(line);
                buffer_chars += line_chars;
            }
            if line.ends_with('\n') {
                line_no += 1;
            }
        }
        if !buffer.is_empty() {
            pieces.push((piece_start, line_no.min(chunk.end_line), buffer));
        }

        let mut out = Vec::with_capacity(pieces.len());
        let mut previous: Option<String> = None;
        for (start, end, text) in pieces {
            let (content, start_line) = match previous.as_deref() {
                Some(prev) if self.chunk_overlap > 0 => {
                    let tail = tail_chars(prev, self.chunk_overlap);
                    let overlap_newlines = tail.matches('\n').count() as u32;
                    (
                        format!("{}{}", tail, text),
                        start.saturating_sub(overlap_newlines).max(1),
                    )
                }
                _ => (text.clone(), start),
            };
            out.push(Chunk {
                content,
                start_line,
                end_line: end,
                language: chunk.language,
                file_path: chunk.file_path.clone(),
                breadcrumbs: chunk.breadcrumbs.clone(),
                symbol_label: chunk.symbol_label.clone(),
                symbol_id: chunk.symbol_id.clone(),
            });
            previous = Some(text);
        }
        out
    }
}

fn char_groups(text: &str, size: usize) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut start = 0usize;
    let mut count = 0usize;
    for (idx, _) in text.char_indices() {
        if count == size {
            groups.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        groups.push(&text[start..]);
    }
    groups
}

fn tail_chars(text: &str, n: usize) -> &str {
    let total = text.chars().count();
    if total <= n {
        return text;
    }
    let skip = total - n;
    text.char_indices()
        .nth(skip)
        .map(|(idx, _)| &text[idx..])
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_at_exact_budget_is_not_subdivided() {
        let splitter = Splitter::new(20, 5, SplitterKind::Ast);
        let chunk = Chunk {
            content: "x".repeat(20),
            start_line: 1,
            end_line: 1,
            language: Language::Unknown,
            file_path: "/f".into(),
            breadcrumbs: Some(vec!["class A".into()]),
            symbol_label: None,
            symbol_id: None,
        };
        let out = splitter.enforce_size(vec![chunk]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn one_char_over_budget_subdivides_and_keeps_breadcrumbs() {
        let splitter = Splitter::new(20, 5, SplitterKind::Ast);
        let chunk = Chunk {
            content: "x".repeat(21),
            start_line: 1,
            end_line: 1,
            language: Language::Unknown,
            file_path: "/f".into(),
            breadcrumbs: Some(vec!["class A".into(), "method f()".into()]),
            symbol_label: Some("method f()".into()),
            symbol_id: Some("sym_0123456789abcdef".into()),
        };
        let out = splitter.enforce_size(vec![chunk]);
        assert!(out.len() > 1);
        for piece in &out {
            assert_eq!(
                piece.breadcrumbs.as_deref(),
                Some(&["class A".to_string(), "method f()".to_string()][..])
            );
            assert_eq!(piece.symbol_label.as_deref(), Some("method f()"));
        }
    }

    #[test]
    fn subdivision_adjusts_start_lines_for_overlap() {
        let splitter = Splitter::new(16, 6, SplitterKind::Ast);
        let content: String = (0..8).map(|i| format!("line{}\n", i)).collect();
        let chunk = Chunk {
            content,
            start_line: 10,
            end_line: 17,
            language: Language::Unknown,
            file_path: "/f".into(),
            breadcrumbs: None,
            symbol_label: None,
            symbol_id: None,
        };
        let out = splitter.enforce_size(vec![chunk]);
        assert!(out.len() > 1);
        // Overlapped chunks start at or before their natural first line,
        // never below line 1
        for window in out.windows(2) {
            assert!(window[1].start_line >= 1);
            assert!(window[1].start_line <= window[1].end_line);
        }
    }

    #[test]
    fn langchain_kind_bypasses_ast() {
        let splitter = Splitter::new(2500, 300, SplitterKind::Langchain);
        let chunks = splitter.split_file(
            "class A { f() { return 1; } }\n",
            Language::TypeScript,
            "/repo/a.ts",
            "a.ts",
        );
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].symbol_label.is_none());
    }
}
