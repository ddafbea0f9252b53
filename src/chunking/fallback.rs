//! Generic fallback splitter
//!
//! Recursive character splitting over the same size/overlap budget as the
//! AST path, used when a language has no parser or parsing fails. Always
//! emits at least one chunk covering the file.

use crate::domain::types::{Chunk, Language};

const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

/// Recursive character splitter with overlap
#[derive(Debug, Clone)]
pub struct FallbackSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FallbackSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split file content into chunks with computed line spans
    pub fn split(&self, content: &str, language: Language, file_path: &str) -> Vec<Chunk> {
        if content.is_empty() {
            return vec![Chunk {
                content: String::new(),
                start_line: 1,
                end_line: 1,
                language,
                file_path: file_path.to_string(),
                breadcrumbs: None,
                symbol_label: None,
                symbol_id: None,
            }];
        }

        let pieces = self.split_recursive(content, 0, SEPARATORS);
        let mut chunks = Vec::with_capacity(pieces.len());
        let mut previous_text: Option<&str> = None;

        for &(offset, piece) in &pieces {
            let mut start_line = line_at_offset(content, offset);
            let end_line = line_at_offset(content, offset + piece.len().saturating_sub(1));
            let mut text = piece.to_string();

            if let Some(prev) = previous_text {
                let tail = tail_chars(prev, self.chunk_overlap);
                if !tail.is_empty() {
                    let overlap_newlines = tail.matches('\n').count() as u32;
                    start_line = start_line.saturating_sub(overlap_newlines).max(1);
                    text = format!("{}{}", tail, text);
                }
            }

            chunks.push(Chunk {
                content: text,
                start_line,
                end_line,
                language,
                file_path: file_path.to_string(),
                breadcrumbs: None,
                symbol_label: None,
                symbol_id: None,
            });
            previous_text = Some(piece);
        }

        chunks
    }

    /// Split text into contiguous pieces no longer than `chunk_size`,
    /// returning each piece with its byte offset into the original content
    fn split_recursive<'a>(
        &self,
        text: &'a str,
        base_offset: usize,
        separators: &[&str],
    ) -> Vec<(usize, &'a str)> {
        if text.chars().count() <= self.chunk_size {
            return vec![(base_offset, text)];
        }

        let Some((separator, rest)) = separators.split_first() else {
            // No separators left: hard-split on char boundaries
            return self.hard_split(text, base_offset);
        };

        // Collect separator-delimited parts with their offsets, keeping the
        // separator attached to the preceding part so pieces stay contiguous
        let mut parts: Vec<(usize, &str)> = Vec::new();
        let mut cursor = 0usize;
        while cursor < text.len() {
            let next = text[cursor..]
                .find(separator)
                .map(|idx| cursor + idx + separator.len())
                .unwrap_or(text.len());
            parts.push((base_offset + cursor, &text[cursor..next]));
            cursor = next;
        }

        if parts.len() <= 1 {
            return self.split_recursive(text, base_offset, rest);
        }

        // Merge consecutive parts into groups under the size budget
        let mut pieces: Vec<(usize, &str)> = Vec::new();
        let mut group_start: Option<usize> = None;
        let mut group_end = 0usize;
        let mut group_chars = 0usize;

        let flush = |pieces: &mut Vec<(usize, &'a str)>,
                     start: Option<usize>,
                     end: usize,
                     this: &Self,
                     rest: &[&str]| {
            if let Some(start) = start {
                let slice = &text[start - base_offset..end - base_offset];
                if slice.chars().count() > this.chunk_size {
                    pieces.extend(this.split_recursive(slice, start, rest));
                } else {
                    pieces.push((start, slice));
                }
            }
        };

        for (offset, part) in parts {
            let part_chars = part.chars().count();
            if group_start.is_some() && group_chars + part_chars > self.chunk_size {
                flush(&mut pieces, group_start, group_end, self, rest);
                group_start = None;
                group_chars = 0;
            }
            if group_start.is_none() {
                group_start = Some(offset);
            }
            group_end = offset + part.len();
            group_chars += part_chars;
        }
        flush(&mut pieces, group_start, group_end, self, rest);

        pieces
    }

    fn hard_split<'a>(&self, text: &'a str, base_offset: usize) -> Vec<(usize, &'a str)> {
        let mut pieces = Vec::new();
        let mut start = 0usize;
        let mut count = 0usize;
        for (idx, _) in text.char_indices() {
            if count == self.chunk_size {
                pieces.push((base_offset + start, &text[start..idx]));
                start = idx;
                count = 0;
            }
            count += 1;
        }
        if start < text.len() {
            pieces.push((base_offset + start, &text[start..]));
        }
        pieces
    }
}

/// 1-based line number of a byte offset
fn line_at_offset(content: &str, offset: usize) -> u32 {
    let clamped = offset.min(content.len());
    1 + content[..clamped].matches('\n').count() as u32
}

/// Last `n` characters of a string, on char boundaries
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= n {
        return text;
    }
    let skip = total - n;
    let byte_idx = text
        .char_indices()
        .nth(skip)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &text[byte_idx..]
}
