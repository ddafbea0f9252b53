//! Single source of truth for language support
//!
//! Maps extensions to canonical language ids and records which capabilities
//! each language carries: AST splitting, call-graph build, call-graph query,
//! and file outline.

use crate::domain::types::Language;

/// Capability row for one language
#[derive(Debug, Clone, Copy)]
pub struct LanguageCapabilities {
    pub language: Language,
    pub extensions: &'static [&'static str],
    pub ast_splitter: bool,
    pub call_graph_build: bool,
    pub call_graph_query: bool,
    pub file_outline: bool,
}

/// The capability table. Call-graph build and query support
/// TypeScript/JavaScript/Python only; file outline uses the same set.
pub const LANGUAGE_TABLE: &[LanguageCapabilities] = &[
    LanguageCapabilities {
        language: Language::Rust,
        extensions: &["rs"],
        ast_splitter: true,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::Python,
        extensions: &["py", "pyi"],
        ast_splitter: true,
        call_graph_build: true,
        call_graph_query: true,
        file_outline: true,
    },
    LanguageCapabilities {
        language: Language::JavaScript,
        extensions: &["js", "mjs", "cjs", "jsx"],
        ast_splitter: true,
        call_graph_build: true,
        call_graph_query: true,
        file_outline: true,
    },
    LanguageCapabilities {
        language: Language::TypeScript,
        extensions: &["ts", "mts", "cts", "tsx"],
        ast_splitter: true,
        call_graph_build: true,
        call_graph_query: true,
        file_outline: true,
    },
    LanguageCapabilities {
        language: Language::Go,
        extensions: &["go"],
        ast_splitter: true,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::Java,
        extensions: &["java"],
        ast_splitter: true,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::C,
        extensions: &["c", "h"],
        ast_splitter: true,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::Cpp,
        extensions: &["cpp", "cc", "cxx", "hpp", "hh"],
        ast_splitter: true,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::CSharp,
        extensions: &["cs"],
        ast_splitter: true,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::Markdown,
        extensions: &["md", "markdown"],
        ast_splitter: false,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::Json,
        extensions: &["json"],
        ast_splitter: false,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::Yaml,
        extensions: &["yaml", "yml"],
        ast_splitter: false,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
    LanguageCapabilities {
        language: Language::Toml,
        extensions: &["toml"],
        ast_splitter: false,
        call_graph_build: false,
        call_graph_query: false,
        file_outline: false,
    },
];

/// Extensions treated as documentation for search scoping
pub const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst"];

/// Capability row for a language, if tracked
pub fn capabilities_for(language: Language) -> Option<&'static LanguageCapabilities> {
    LANGUAGE_TABLE.iter().find(|row| row.language == language)
}

/// Whether files with this extension are ingested at all
pub fn is_indexable_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    LANGUAGE_TABLE
        .iter()
        .any(|row| row.extensions.contains(&ext.as_str()))
        || DOC_EXTENSIONS.contains(&ext.as_str())
}

/// All extensions the index pipeline ingests by default
pub fn indexable_extensions() -> Vec<&'static str> {
    let mut extensions: Vec<&'static str> = LANGUAGE_TABLE
        .iter()
        .flat_map(|row| row.extensions.iter().copied())
        .collect();
    for ext in DOC_EXTENSIONS {
        if !extensions.contains(ext) {
            extensions.push(ext);
        }
    }
    extensions
}

/// Extensions the call-graph builder ingests
pub fn call_graph_build_extensions() -> Vec<&'static str> {
    LANGUAGE_TABLE
        .iter()
        .filter(|row| row.call_graph_build)
        .flat_map(|row| row.extensions.iter().copied())
        .collect()
}

/// Whether the call graph can answer queries about files of this extension
pub fn supports_call_graph_query(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    LANGUAGE_TABLE
        .iter()
        .any(|row| row.call_graph_query && row.extensions.contains(&ext.as_str()))
}

/// Whether `file_outline` covers files of this extension
pub fn supports_file_outline(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    LANGUAGE_TABLE
        .iter()
        .any(|row| row.file_outline && row.extensions.contains(&ext.as_str()))
}

/// Tree-sitter grammar handle for a language, when AST splitting applies
pub fn grammar_for(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        Language::C => Some(tree_sitter_c::LANGUAGE.into()),
        Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
        _ => None,
    }
}

/// Node kinds that produce one chunk each during AST splitting
pub fn splittable_node_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::Rust => &[
            "function_item",
            "struct_item",
            "enum_item",
            "impl_item",
            "trait_item",
            "mod_item",
            "type_item",
            "macro_definition",
        ],
        Language::Python => &[
            "function_definition",
            "class_definition",
            "decorated_definition",
        ],
        Language::JavaScript => &[
            "function_declaration",
            "generator_function_declaration",
            "class_declaration",
            "method_definition",
            "export_statement",
        ],
        Language::TypeScript => &[
            "function_declaration",
            "generator_function_declaration",
            "class_declaration",
            "method_definition",
            "interface_declaration",
            "type_alias_declaration",
            "enum_declaration",
            "export_statement",
        ],
        Language::Go => &[
            "function_declaration",
            "method_declaration",
            "type_declaration",
        ],
        Language::Java => &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
            "method_declaration",
            "constructor_declaration",
        ],
        Language::C => &["function_definition", "struct_specifier", "enum_specifier"],
        Language::Cpp => &[
            "function_definition",
            "class_specifier",
            "struct_specifier",
            "namespace_definition",
        ],
        Language::CSharp => &[
            "class_declaration",
            "interface_declaration",
            "struct_declaration",
            "enum_declaration",
            "method_declaration",
            "namespace_declaration",
        ],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_graph_languages_are_ts_js_py_only() {
        for row in LANGUAGE_TABLE {
            let expected = matches!(
                row.language,
                Language::TypeScript | Language::JavaScript | Language::Python
            );
            assert_eq!(row.call_graph_build, expected, "{}", row.language);
            assert_eq!(row.call_graph_query, expected, "{}", row.language);
            assert_eq!(row.file_outline, expected, "{}", row.language);
        }
    }

    #[test]
    fn extensions_map_back_to_their_language() {
        for row in LANGUAGE_TABLE {
            for ext in row.extensions {
                assert_eq!(Language::from_extension(ext), row.language);
            }
        }
    }

    #[test]
    fn markdown_is_indexable_without_ast_support() {
        assert!(is_indexable_extension("md"));
        assert!(grammar_for(Language::Markdown).is_none());
    }
}
