//! Integration tests for the chunk pipeline

use satori::chunking::{Splitter, SplitterKind};
use satori::domain::types::Language;

#[test]
fn oversized_method_keeps_breadcrumbs_across_subdivision() {
    let source = r#"class LargeAuth {
    validate(token: string) {
        const a = 1;
        const b = 2;
        const c = 3;
        const d = 4;
        const e = 5;
        const f = 6;
        const g = 7;
        const h = 8;
        const i = 9;
        const j = 10;
        const k = 11;
        const l = 12;
        return token.length > a;
    }
}
"#;
    let splitter = Splitter::new(80, 10, SplitterKind::Ast);
    let chunks = splitter.split_file(source, Language::TypeScript, "/repo/auth.ts", "auth.ts");

    let method_chunks: Vec<_> = chunks
        .iter()
        .filter(|chunk| {
            chunk.symbol_label.as_deref() == Some("method validate(token: string)")
        })
        .collect();
    assert!(method_chunks.len() > 1, "expected subdivision");
    for chunk in &method_chunks {
        assert_eq!(
            chunk.breadcrumbs.as_deref(),
            Some(
                &[
                    "class LargeAuth".to_string(),
                    "method validate(token: string)".to_string()
                ][..]
            )
        );
        assert!(chunk.symbol_id.is_some());
    }
}

#[test]
fn chunk_ids_are_shared_across_subdivided_pieces() {
    let source = "def big():\n".to_string() + &"    x = 1\n".repeat(40);
    let splitter = Splitter::new(100, 20, SplitterKind::Ast);
    let chunks = splitter.split_file(&source, Language::Python, "/repo/big.py", "big.py");
    assert!(chunks.len() > 1);
    let ids: Vec<_> = chunks.iter().filter_map(|c| c.symbol_id.clone()).collect();
    assert!(!ids.is_empty());
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn unknown_language_falls_back_and_covers_the_file() {
    let source = "some plain text\nwith a few lines\nand nothing parseable\n";
    let splitter = Splitter::default();
    let chunks = splitter.split_file(source, Language::Unknown, "/repo/notes.txt", "notes.txt");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start_line, 1);
    assert!(chunks[0].content.contains("plain text"));
}

#[test]
fn malformed_source_still_produces_chunks() {
    let source = "class {{{ not valid typescript at all ((((\n".repeat(5);
    let splitter = Splitter::default();
    let chunks = splitter.split_file(&source, Language::TypeScript, "/repo/bad.ts", "bad.ts");
    assert!(!chunks.is_empty());
}

#[test]
fn rust_items_get_language_appropriate_labels() {
    let source = r#"
struct Config {
    value: u32,
}

impl Config {
    fn load() -> Self {
        Self { value: 1 }
    }
}

async fn serve(config: Config) -> u32 {
    config.value
}
"#;
    let splitter = Splitter::new(60, 10, SplitterKind::Ast);
    let chunks = splitter.split_file(source, Language::Rust, "/repo/config.rs", "config.rs");
    let labels: Vec<_> = chunks
        .iter()
        .filter_map(|chunk| chunk.symbol_label.as_deref())
        .collect();
    assert!(labels.contains(&"struct Config"));
    assert!(labels.iter().any(|label| label.starts_with("fn load")
        || label.starts_with("impl Config")));
    assert!(labels
        .iter()
        .any(|label| label.starts_with("async fn serve")));
}
