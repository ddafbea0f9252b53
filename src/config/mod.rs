//! Typed runtime configuration
//!
//! One `Config` struct is produced from environment variables at startup;
//! tools and components never read the environment directly.

pub mod capability;

pub use capability::CapabilityResolver;

use crate::infrastructure::constants::{CHUNK_LIMIT, EMBEDDING_BATCH_SIZE, READ_FILE_MAX_LINES};
use serde::{Deserialize, Serialize};

/// Embedding provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    OpenAI,
    VoyageAI,
    /// Deterministic local embedder for tests and offline runs
    Null,
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::VoyageAI => write!(f, "voyageai"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl EmbeddingProviderKind {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "voyageai" => Some(Self::VoyageAI),
            "null" => Some(Self::Null),
            _ => None,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// Model name; empty means the provider default
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub dimension: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAI,
            model: None,
            api_key: None,
            base_url: None,
            dimension: None,
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub address: String,
    pub token: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:19530".to_string(),
            token: None,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    /// Dense + sparse search with rank fusion when true
    pub hybrid_mode: bool,
    /// Optional reranker model name; presence gates the capability flag
    pub reranker_model: Option<String>,
    pub embedding_batch_size: usize,
    pub chunk_limit: usize,
    pub read_file_max_lines: usize,
    pub watcher_enabled: bool,
    pub watcher_debounce_ms: u64,
    /// Extra base-layer ignore patterns from the environment
    pub custom_ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            hybrid_mode: true,
            reranker_model: None,
            embedding_batch_size: EMBEDDING_BATCH_SIZE,
            chunk_limit: CHUNK_LIMIT,
            read_file_max_lines: READ_FILE_MAX_LINES,
            watcher_enabled: true,
            watcher_debounce_ms: 5000,
            custom_ignore_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Build the configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let provider = std::env::var("EMBEDDING_PROVIDER")
            .ok()
            .and_then(|v| EmbeddingProviderKind::from_string(&v))
            .unwrap_or_default();

        let api_key = std::env::var("EMBEDDING_API_KEY")
            .or_else(|_| match provider {
                EmbeddingProviderKind::OpenAI => std::env::var("OPENAI_API_KEY"),
                EmbeddingProviderKind::VoyageAI => std::env::var("VOYAGEAI_API_KEY"),
                EmbeddingProviderKind::Null => Err(std::env::VarError::NotPresent),
            })
            .ok();

        Self {
            embedding: EmbeddingConfig {
                provider,
                model: std::env::var("EMBEDDING_MODEL").ok(),
                api_key,
                base_url: std::env::var("EMBEDDING_BASE_URL").ok(),
                dimension: env_parse("EMBEDDING_DIMENSION"),
            },
            vector_store: VectorStoreConfig {
                address: std::env::var("VECTOR_STORE_ADDRESS")
                    .unwrap_or(defaults.vector_store.address),
                token: std::env::var("VECTOR_STORE_TOKEN").ok(),
            },
            hybrid_mode: env_parse("HYBRID_MODE").unwrap_or(defaults.hybrid_mode),
            reranker_model: std::env::var("RERANKER_MODEL").ok().filter(|v| !v.is_empty()),
            embedding_batch_size: env_parse("EMBEDDING_BATCH_SIZE")
                .filter(|v| *v >= 1)
                .unwrap_or(defaults.embedding_batch_size),
            chunk_limit: env_parse("CHUNK_LIMIT").unwrap_or(defaults.chunk_limit),
            read_file_max_lines: env_parse("READ_FILE_MAX_LINES")
                .filter(|v| *v >= 1)
                .unwrap_or(defaults.read_file_max_lines),
            watcher_enabled: env_parse("WATCHER_ENABLED").unwrap_or(defaults.watcher_enabled),
            watcher_debounce_ms: env_parse("WATCHER_DEBOUNCE_MS")
                .unwrap_or(defaults.watcher_debounce_ms),
            custom_ignore_patterns: std::env::var("CUSTOM_IGNORE_PATTERNS")
                .map(|v| {
                    v.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
