//! Runtime capability resolution
//!
//! Turns the loaded configuration into explicit feature flags that tool
//! schemas and handlers consult. Handlers never inspect the raw config for
//! capability decisions.

use crate::config::{Config, EmbeddingProviderKind};
use crate::infrastructure::constants::{
    SEARCH_DEFAULT_LIMIT, SEARCH_MAX_LIMIT_LOCAL, SEARCH_MAX_LIMIT_REMOTE,
};

/// Where embeddings are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingLocality {
    Local,
    Remote,
}

impl EmbeddingLocality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Rough latency class of the configured stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceProfile {
    Fast,
    Balanced,
}

impl PerformanceProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
        }
    }
}

/// Feature flags derived from the configuration
#[derive(Debug, Clone)]
pub struct CapabilityResolver {
    reranker: bool,
    locality: EmbeddingLocality,
}

impl CapabilityResolver {
    pub fn new(config: &Config) -> Self {
        let locality = match config.embedding.provider {
            EmbeddingProviderKind::Null => EmbeddingLocality::Local,
            EmbeddingProviderKind::OpenAI | EmbeddingProviderKind::VoyageAI => {
                EmbeddingLocality::Remote
            }
        };
        Self {
            reranker: config.reranker_model.is_some(),
            locality,
        }
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker
    }

    pub fn embedding_locality(&self) -> EmbeddingLocality {
        self.locality
    }

    pub fn performance_profile(&self) -> PerformanceProfile {
        match self.locality {
            EmbeddingLocality::Local => PerformanceProfile::Fast,
            EmbeddingLocality::Remote => PerformanceProfile::Balanced,
        }
    }

    pub fn max_search_limit(&self) -> usize {
        match self.locality {
            EmbeddingLocality::Local => SEARCH_MAX_LIMIT_LOCAL,
            EmbeddingLocality::Remote => SEARCH_MAX_LIMIT_REMOTE,
        }
    }

    pub fn default_search_limit(&self) -> usize {
        SEARCH_DEFAULT_LIMIT
    }

    /// Telemetry tag of the form `<locality>_<profile>`
    pub fn telemetry_tag(&self) -> String {
        format!(
            "{}_{}",
            self.locality.as_str(),
            self.performance_profile().as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_provider_caps_search_limit() {
        let config = Config::default();
        let caps = CapabilityResolver::new(&config);
        assert_eq!(caps.embedding_locality(), EmbeddingLocality::Remote);
        assert_eq!(caps.max_search_limit(), SEARCH_MAX_LIMIT_REMOTE);
        assert_eq!(caps.telemetry_tag(), "remote_balanced");
    }

    #[test]
    fn reranker_flag_follows_model_presence() {
        let mut config = Config::default();
        assert!(!CapabilityResolver::new(&config).has_reranker());
        config.reranker_model = Some("rerank-2".to_string());
        assert!(CapabilityResolver::new(&config).has_reranker());
    }
}
