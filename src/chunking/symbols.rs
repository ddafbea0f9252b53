//! Scope labels and deterministic symbol identity
//!
//! Labels describe the enclosing scope of a chunk in a compact,
//! language-specific grammar (`class Name`, `function name(params)`,
//! `async method name(params)`, `def name(args)`). The symbol id is a
//! stable digest of the normalized path, the span, and the label.

use crate::domain::types::Language;
use crate::infrastructure::constants::BREADCRUMB_MAX_LEN;
use sha1::{Digest, Sha1};
use tree_sitter::Node;

/// Deterministic symbol id: `sym_` + 16 hex of
/// SHA-1(`normalizedFilePath:startLine:endLine:symbolLabel`)
pub fn symbol_id(normalized_path: &str, start_line: u32, end_line: u32, label: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{}:{}:{}:{}", normalized_path, start_line, end_line, label).as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("sym_{}", &hex[..16])
}

/// Compact a label: collapse whitespace runs and ellipsize at the
/// breadcrumb width
pub fn compact_label(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= BREADCRUMB_MAX_LEN {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(BREADCRUMB_MAX_LEN - 1).collect();
    format!("{}\u{2026}", truncated)
}

/// Scope label for a node, when the node names a scope worth recording
pub fn scope_label(node: &Node, language: Language, source: &str) -> Option<String> {
    let raw = match language {
        Language::Rust => rust_label(node, source)?,
        Language::Python => python_label(node, source)?,
        Language::JavaScript | Language::TypeScript => ecmascript_label(node, source)?,
        Language::Go => go_label(node, source)?,
        Language::Java | Language::CSharp => java_like_label(node, source)?,
        Language::C | Language::Cpp => c_like_label(node, source)?,
        _ => return None,
    };
    Some(compact_label(&raw))
}

fn field_text<'a>(node: &Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field)
        .and_then(|child| child.utf8_text(source.as_bytes()).ok())
}

fn node_is_async(node: &Node, source: &str) -> bool {
    node.utf8_text(source.as_bytes())
        .map(|text| text.trim_start().starts_with("async"))
        .unwrap_or(false)
}

fn rust_label(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "function_item" => {
            let name = field_text(node, "name", source)?;
            let params = field_text(node, "parameters", source).unwrap_or("()");
            let prefix = if node_is_async(node, source) { "async fn" } else { "fn" };
            Some(format!("{} {}{}", prefix, name, params))
        }
        "struct_item" => Some(format!("struct {}", field_text(node, "name", source)?)),
        "enum_item" => Some(format!("enum {}", field_text(node, "name", source)?)),
        "trait_item" => Some(format!("trait {}", field_text(node, "name", source)?)),
        "impl_item" => {
            let target = field_text(node, "type", source)?;
            Some(format!("impl {}", target))
        }
        "mod_item" => Some(format!("mod {}", field_text(node, "name", source)?)),
        _ => None,
    }
}

fn python_label(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "class_definition" => Some(format!("class {}", field_text(node, "name", source)?)),
        "function_definition" => {
            let name = field_text(node, "name", source)?;
            let params = field_text(node, "parameters", source).unwrap_or("()");
            let prefix = if node_is_async(node, source) { "async def" } else { "def" };
            Some(format!("{} {}{}", prefix, name, params))
        }
        "decorated_definition" => {
            let inner = node.child_by_field_name("definition")?;
            python_label(&inner, source)
        }
        _ => None,
    }
}

fn ecmascript_label(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "class_declaration" => Some(format!("class {}", field_text(node, "name", source)?)),
        "interface_declaration" => {
            Some(format!("interface {}", field_text(node, "name", source)?))
        }
        "enum_declaration" => Some(format!("enum {}", field_text(node, "name", source)?)),
        "type_alias_declaration" => Some(format!("type {}", field_text(node, "name", source)?)),
        "function_declaration" | "generator_function_declaration" => {
            let name = field_text(node, "name", source)?;
            let params = field_text(node, "parameters", source).unwrap_or("()");
            let prefix = if node_is_async(node, source) {
                "async function"
            } else {
                "function"
            };
            Some(format!("{} {}{}", prefix, name, params))
        }
        "method_definition" => {
            let name = field_text(node, "name", source)?;
            let params = field_text(node, "parameters", source).unwrap_or("()");
            let prefix = if node_is_async(node, source) {
                "async method"
            } else {
                "method"
            };
            Some(format!("{} {}{}", prefix, name, params))
        }
        // `export default class Foo` and friends label through the inner node
        "export_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if let Some(label) = ecmascript_label(&child, source) {
                    return Some(label);
                }
            }
            None
        }
        _ => None,
    }
}

fn go_label(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "function_declaration" | "method_declaration" => {
            let name = field_text(node, "name", source)?;
            let params = field_text(node, "parameters", source).unwrap_or("()");
            Some(format!("func {}{}", name, params))
        }
        "type_declaration" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "type_spec" {
                    if let Some(name) = field_text(&child, "name", source) {
                        return Some(format!("type {}", name));
                    }
                }
            }
            None
        }
        _ => None,
    }
}

fn java_like_label(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "class_declaration" => Some(format!("class {}", field_text(node, "name", source)?)),
        "interface_declaration" => {
            Some(format!("interface {}", field_text(node, "name", source)?))
        }
        "enum_declaration" => Some(format!("enum {}", field_text(node, "name", source)?)),
        "struct_declaration" => Some(format!("struct {}", field_text(node, "name", source)?)),
        "namespace_declaration" => {
            Some(format!("namespace {}", field_text(node, "name", source)?))
        }
        "method_declaration" | "constructor_declaration" => {
            let name = field_text(node, "name", source)?;
            let params = field_text(node, "parameters", source).unwrap_or("()");
            Some(format!("method {}{}", name, params))
        }
        _ => None,
    }
}

fn c_like_label(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "function_definition" => {
            let declarator = node.child_by_field_name("declarator")?;
            let text = declarator.utf8_text(source.as_bytes()).ok()?;
            Some(format!("function {}", text))
        }
        "class_specifier" => Some(format!("class {}", field_text(node, "name", source)?)),
        "struct_specifier" => Some(format!("struct {}", field_text(node, "name", source)?)),
        "enum_specifier" => Some(format!("enum {}", field_text(node, "name", source)?)),
        "namespace_definition" => {
            Some(format!("namespace {}", field_text(node, "name", source)?))
        }
        _ => None,
    }
}

/// Extract the bare symbol name from a label, for the call-graph name index.
/// `class AuthManager` -> `AuthManager`; `async method validate(token)` ->
/// `validate`; `def handle(req)` -> `handle`.
pub fn symbol_name_from_label(label: &str) -> Option<String> {
    let mut words = label.split_whitespace().filter(|w| {
        !matches!(
            *w,
            "async"
                | "class"
                | "interface"
                | "enum"
                | "struct"
                | "trait"
                | "impl"
                | "mod"
                | "type"
                | "namespace"
                | "function"
                | "method"
                | "func"
                | "fn"
                | "def"
        )
    });
    let candidate = words.next()?;
    let name: String = candidate
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_id_is_deterministic_and_prefixed() {
        let a = symbol_id("src/auth.ts", 10, 42, "method validate(token)");
        let b = symbol_id("src/auth.ts", 10, 42, "method validate(token)");
        assert_eq!(a, b);
        assert!(a.starts_with("sym_"));
        assert_eq!(a.len(), 4 + 16);
        let c = symbol_id("src/auth.ts", 10, 43, "method validate(token)");
        assert_ne!(a, c);
    }

    #[test]
    fn compact_label_collapses_whitespace_and_ellipsizes() {
        assert_eq!(compact_label("class   Auth\n  Manager"), "class Auth Manager");
        let long = format!("function {}()", "x".repeat(200));
        let compacted = compact_label(&long);
        assert!(compacted.chars().count() <= BREADCRUMB_MAX_LEN);
        assert!(compacted.ends_with('\u{2026}'));
    }

    #[test]
    fn symbol_name_extraction_skips_keywords() {
        assert_eq!(
            symbol_name_from_label("class AuthManager").as_deref(),
            Some("AuthManager")
        );
        assert_eq!(
            symbol_name_from_label("async method validate(token)").as_deref(),
            Some("validate")
        );
        assert_eq!(
            symbol_name_from_label("def handle(req)").as_deref(),
            Some("handle")
        );
        assert_eq!(
            symbol_name_from_label("async fn run(args)").as_deref(),
            Some("run")
        );
    }
}
