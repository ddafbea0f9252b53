//! VoyageAI embedding provider

use crate::domain::error::{Error, Result};
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::Embedding;
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const DEFAULT_MODEL: &str = "voyage-code-3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// VoyageAI embeddings over the REST API
pub struct VoyageAiEmbeddingProvider {
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl VoyageAiEmbeddingProvider {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        dimension: Option<usize>,
    ) -> Result<Self> {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let dimension = dimension.unwrap_or_else(|| default_dimension(&model));
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::embedding(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key: api_key.trim().to_string(),
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            dimension,
            client,
        })
    }
}

fn default_dimension(model: &str) -> usize {
    match model {
        "voyage-code-3" => 1024,
        "voyage-3-large" => 1024,
        "voyage-4-large" => 1024,
        "voyage-3-lite" => 512,
        _ => 1024,
    }
}

#[async_trait]
impl EmbeddingProvider for VoyageAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::embedding(format!("Request timed out after {:?}", REQUEST_TIMEOUT))
                } else {
                    Error::embedding(format!("HTTP request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "VoyageAI API error {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse response: {}", e)))?;
        let data = body["data"]
            .as_array()
            .ok_or_else(|| Error::embedding("Invalid response format: missing data array"))?;
        if data.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Response data count mismatch: expected {}, got {}",
                texts.len(),
                data.len()
            )));
        }

        data.iter()
            .enumerate()
            .map(|(i, item)| {
                let vector = item["embedding"]
                    .as_array()
                    .ok_or_else(|| {
                        Error::embedding(format!("Invalid embedding format for text {}", i))
                    })?
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect::<Vec<f32>>();
                Ok(Embedding {
                    vector,
                    model: self.model.clone(),
                    dimensions: self.dimension,
                })
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "voyageai"
    }
}
