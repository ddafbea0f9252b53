//! Layered ignore state
//!
//! Three pattern layers combine into one effective matcher per codebase:
//! base patterns (built-in defaults plus constructor- and env-provided),
//! runtime custom patterns added through `manage_index`, and file-based
//! patterns read from the repo root's `.satoriignore` and `.gitignore`.
//! The compiled matcher is cached until any layer changes.

use crate::domain::error::{Error, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Ignore files read from the repo root, in order
const IGNORE_FILE_NAMES: &[&str] = &[".satoriignore", ".gitignore"];

/// Built-in default patterns
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "node_modules/",
    ".git/",
    ".svn/",
    ".hg/",
    "target/",
    "dist/",
    "build/",
    "out/",
    ".venv/",
    "venv/",
    "__pycache__/",
    ".idea/",
    ".vscode/",
    "coverage/",
    "*.min.js",
    "*.map",
    "*.log",
    "*.lock",
    "*.tmp",
    "*.cache",
];

/// A compiled matcher for one codebase
#[derive(Debug)]
pub struct CompiledIgnore {
    gitignore: Gitignore,
}

impl CompiledIgnore {
    fn compile(root: &Path, patterns: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| Error::config(format!("Bad ignore pattern {:?}: {}", pattern, e)))?;
        }
        let gitignore = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build ignore matcher: {}", e)))?;
        Ok(Self { gitignore })
    }

    /// Whether a relative path is ignored. Directories are checked both as
    /// the bare path and as the path with a trailing slash.
    pub fn is_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        if self
            .gitignore
            .matched(relative_path, is_dir)
            .is_ignore()
        {
            return true;
        }
        if is_dir {
            let with_slash = format!("{}/", relative_path.trim_end_matches('/'));
            return self.gitignore.matched(&with_slash, true).is_ignore();
        }
        false
    }
}

/// The three-layer ignore state shared by all codebases
#[derive(Debug)]
pub struct IgnoreState {
    base_patterns: Vec<String>,
    runtime_patterns: Vec<String>,
    file_patterns: HashMap<String, Vec<String>>,
    compiled: HashMap<String, Arc<CompiledIgnore>>,
    rules_version: u64,
}

impl IgnoreState {
    /// Create the state with constructor- and env-provided base patterns
    /// extending the built-in defaults
    pub fn new(extra_base_patterns: &[String]) -> Self {
        let mut base_patterns: Vec<String> = DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        for pattern in extra_base_patterns {
            if !base_patterns.contains(pattern) {
                base_patterns.push(pattern.clone());
            }
        }
        Self {
            base_patterns,
            runtime_patterns: Vec::new(),
            file_patterns: HashMap::new(),
            compiled: HashMap::new(),
            rules_version: 1,
        }
    }

    /// Add runtime custom patterns; invalidates every compiled matcher
    pub fn add_runtime_patterns(&mut self, patterns: &[String]) {
        let mut changed = false;
        for pattern in patterns {
            let trimmed = pattern.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !self.runtime_patterns.iter().any(|p| p == trimmed) {
                self.runtime_patterns.push(trimmed.to_string());
                changed = true;
            }
        }
        if changed {
            self.compiled.clear();
            self.rules_version += 1;
        }
    }

    /// Re-read `.satoriignore`/`.gitignore` at the repo root, replacing the
    /// codebase's file-based layer. Returns the resulting effective list.
    pub fn reload_for_codebase(&mut self, canonical_path: &str) -> Result<Vec<String>> {
        let root = Path::new(canonical_path);
        let mut patterns = Vec::new();
        for name in IGNORE_FILE_NAMES {
            let path = root.join(name);
            if !path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    for line in content.lines() {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        patterns.push(line.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                }
            }
        }
        self.file_patterns
            .insert(canonical_path.to_string(), patterns);
        self.compiled.remove(canonical_path);
        self.rules_version += 1;
        Ok(self.effective_patterns(canonical_path))
    }

    /// The deduplicated union of all three layers for a codebase
    pub fn effective_patterns(&self, canonical_path: &str) -> Vec<String> {
        let mut patterns = Vec::new();
        let empty = Vec::new();
        let layers = [
            &self.base_patterns,
            &self.runtime_patterns,
            self.file_patterns.get(canonical_path).unwrap_or(&empty),
        ];
        for layer in layers {
            for pattern in layer.iter() {
                if !patterns.contains(pattern) {
                    patterns.push(pattern.clone());
                }
            }
        }
        patterns
    }

    /// Compiled matcher for a codebase, building and caching on first use
    pub fn matcher_for(&mut self, canonical_path: &str) -> Result<Arc<CompiledIgnore>> {
        if let Some(matcher) = self.compiled.get(canonical_path) {
            return Ok(Arc::clone(matcher));
        }
        let patterns = self.effective_patterns(canonical_path);
        let matcher = Arc::new(CompiledIgnore::compile(Path::new(canonical_path), &patterns)?);
        self.compiled
            .insert(canonical_path.to_string(), Arc::clone(&matcher));
        Ok(matcher)
    }

    /// Monotonic version of the effective rule set
    pub fn rules_version(&self) -> u64 {
        self.rules_version
    }

    /// Stable digest of the effective pattern list, used to detect
    /// ignore-only churn between reindex attempts
    pub fn control_signature(&self, canonical_path: &str) -> String {
        let mut patterns = self.effective_patterns(canonical_path);
        patterns.sort();
        format!("{:x}", md5::compute(patterns.join("\n").as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_exclude_build_artifacts() {
        let mut state = IgnoreState::new(&[]);
        let matcher = state.matcher_for("/repo").unwrap();
        assert!(matcher.is_ignored("node_modules", true));
        assert!(matcher.is_ignored("target", true));
        assert!(matcher.is_ignored("app.log", false));
        assert!(!matcher.is_ignored("src/main.rs", false));
    }

    #[test]
    fn runtime_patterns_extend_and_invalidate() {
        let mut state = IgnoreState::new(&[]);
        let before = state.matcher_for("/repo").unwrap();
        assert!(!before.is_ignored("generated", true));

        state.add_runtime_patterns(&["generated/".to_string()]);
        let after = state.matcher_for("/repo").unwrap();
        assert!(after.is_ignored("generated", true));
    }

    #[test]
    fn file_layer_uses_repo_root_ignore_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "coverage/**\n# comment\n").unwrap();
        let canonical = dir.path().to_string_lossy().to_string();

        let mut state = IgnoreState::new(&[]);
        let effective = state.reload_for_codebase(&canonical).unwrap();
        assert!(effective.iter().any(|p| p == "coverage/**"));
        assert!(!effective.iter().any(|p| p.starts_with('#')));

        let matcher = state.matcher_for(&canonical).unwrap();
        assert!(matcher.is_ignored("coverage/lcov.info", false));
    }

    #[test]
    fn reload_replaces_previous_file_layer() {
        let dir = TempDir::new().unwrap();
        let canonical = dir.path().to_string_lossy().to_string();
        std::fs::write(dir.path().join(".gitignore"), "old_dir/\n").unwrap();

        let mut state = IgnoreState::new(&[]);
        state.reload_for_codebase(&canonical).unwrap();
        std::fs::write(dir.path().join(".gitignore"), "new_dir/\n").unwrap();
        let effective = state.reload_for_codebase(&canonical).unwrap();

        assert!(effective.iter().any(|p| p == "new_dir/"));
        assert!(!effective.iter().any(|p| p == "old_dir/"));
    }

    #[test]
    fn control_signature_tracks_rule_changes() {
        let dir = TempDir::new().unwrap();
        let canonical = dir.path().to_string_lossy().to_string();
        let mut state = IgnoreState::new(&[]);
        let sig_before = state.control_signature(&canonical);
        state.add_runtime_patterns(&["extra/".to_string()]);
        assert_ne!(sig_before, state.control_signature(&canonical));
    }
}
