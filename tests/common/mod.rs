//! Shared fixtures for integration tests
//!
//! Every test runs against the in-memory vector store and the
//! deterministic null embedder, with all persistent state confined to a
//! temporary directory.

use satori::config::{Config, EmbeddingConfig, EmbeddingProviderKind};
use satori::infrastructure::paths::StatePaths;
use satori::server::{build_state, ServerState};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Test configuration: null embedder, hybrid mode on
pub fn test_config() -> Config {
    Config {
        embedding: EmbeddingConfig {
            provider: EmbeddingProviderKind::Null,
            model: None,
            api_key: None,
            base_url: None,
            dimension: Some(8),
        },
        ..Config::default()
    }
}

/// Build a full server state rooted in a temp state directory
pub async fn test_state(state_dir: &TempDir) -> Arc<ServerState> {
    test_state_with(state_dir, test_config()).await
}

pub async fn test_state_with(state_dir: &TempDir, config: Config) -> Arc<ServerState> {
    let paths = StatePaths::at(state_dir.path().join("satori-state")).unwrap();
    build_state(config, paths).await.unwrap()
}

/// Write a small fixture codebase
pub fn write_fixture(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

/// Extract the JSON payload out of a tool result envelope
pub fn envelope_json(result: &rmcp::model::CallToolResult) -> serde_json::Value {
    let value = serde_json::to_value(result).unwrap();
    let text = value["content"][0]["text"]
        .as_str()
        .expect("text content")
        .to_string();
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}

/// Whether the result envelope is flagged as an error
pub fn is_error(result: &rmcp::model::CallToolResult) -> bool {
    serde_json::to_value(result).unwrap()["isError"]
        .as_bool()
        .unwrap_or(false)
}

/// Canonical path string of a temp dir
pub fn canonical_of(dir: &TempDir) -> String {
    satori::infrastructure::paths::canonical_codebase_path(dir.path()).unwrap()
}

/// Poll the snapshot until the codebase leaves the indexing state
pub async fn wait_until_indexed(state: &Arc<ServerState>, canonical: &str) {
    for _ in 0..200 {
        if let Some(info) = state.snapshots.get_codebase_info(canonical) {
            match info.status {
                satori::CodebaseStatus::Indexing { .. } => {}
                _ => return,
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    panic!("codebase {} never left the indexing state", canonical);
}
