//! Embedding backends.
//!
//! [`EmbeddingBackend`] is the seam to the external embedding capability.
//! [`HttpEmbedder`] talks to any OpenAI-compatible `/embeddings` endpoint
//! (OpenAI, Ollama, vLLM, LiteLLM, ...). Lazy, once-only setup lives in
//! [`crate::capability`].

use std::sync::OnceLock;

use async_trait::async_trait;
use docsift_core::{DocsiftError, EmbeddingConfig};
use serde::{Deserialize, Serialize};

use crate::similarity::l2_normalize;

/// Something that turns text into a fixed-length vector.
///
/// `initialize` performs one-time setup; failures there are reported as
/// [`DocsiftError::CapabilityUnavailable`]. `embed` failures after setup are
/// [`DocsiftError::Embedding`].
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &str;

    /// One-time setup (credentials check, model load, connectivity check).
    async fn initialize(&self) -> Result<(), DocsiftError>;

    /// Embed a single text. Vectors are mean-pooled and L2-normalized.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocsiftError>;
}

/// Client for an OpenAI-compatible embeddings API.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::embedding::HttpEmbedder;
///
/// let client = HttpEmbedder::new(Some("test-key".into()), "text-embedding-3-small");
/// assert_eq!(client.model(), "text-embedding-3-small");
/// assert_eq!(client.dimensions(), None);
/// ```
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    requires_key: bool,
    dimensions: OnceLock<usize>,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions.get())
            .finish_non_exhaustive()
    }
}

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const PING_TEXT: &str = "ping";

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Create a client for the OpenAI endpoint with the given key and model.
    pub fn new(api_key: Option<String>, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.to_string(),
            requires_key: true,
            dimensions: OnceLock::new(),
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// A missing API key is not an error here; it surfaces from
    /// [`EmbeddingBackend::initialize`] so callers can fall back to keyword
    /// search.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift_core::EmbeddingConfig;
    /// use docsift_retrieval::embedding::HttpEmbedder;
    ///
    /// let config = EmbeddingConfig {
    ///     provider: "ollama".into(),
    ///     model: "nomic-embed-text".into(),
    ///     ..EmbeddingConfig::default()
    /// };
    /// let client = HttpEmbedder::with_config(&config);
    /// assert_eq!(client.base_url(), "http://localhost:11434/v1");
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Self {
        let is_ollama = config.provider.eq_ignore_ascii_case("ollama");
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            if is_ollama {
                OLLAMA_BASE_URL.to_string()
            } else {
                OPENAI_BASE_URL.to_string()
            }
        });

        Self {
            client: reqwest::Client::new(),
            api_key: config.resolve_api_key(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            requires_key: !is_ollama,
            dimensions: OnceLock::new(),
        }
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the endpoint base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Vector dimensionality learned during initialization.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions.get().copied()
    }

    fn build_request(&self, texts: &[&str]) -> EmbedRequest {
        EmbedRequest {
            model: self.model.clone(),
            input: texts.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    async fn request_one(&self, text: &str) -> Result<Vec<f32>, DocsiftError> {
        let request = self.build_request(&[text]);

        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DocsiftError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(DocsiftError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DocsiftError::Embedding(format!("failed to parse response: {e}")))?;

        let first = embed_response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DocsiftError::Embedding("empty response from embedding API".into()))?;

        if first.embedding.is_empty() {
            return Err(DocsiftError::Embedding("embedding API returned an empty vector".into()));
        }

        let mut vector = first.embedding;
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn initialize(&self) -> Result<(), DocsiftError> {
        if self.requires_key && self.api_key.is_none() {
            return Err(DocsiftError::CapabilityUnavailable(
                "embedding API key not found: set embedding.api_key in .docsift.toml or DOCSIFT_EMBEDDING_API_KEY".into(),
            ));
        }

        let sample = self
            .request_one(PING_TEXT)
            .await
            .map_err(|e| DocsiftError::CapabilityUnavailable(e.to_string()))?;

        let dims = *self.dimensions.get_or_init(|| sample.len());
        tracing::debug!(model = %self.model, dims, "embedding endpoint reachable");
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocsiftError> {
        let vector = self.request_one(text).await?;
        if let Some(&expected) = self.dimensions.get() {
            if vector.len() != expected {
                return Err(DocsiftError::Embedding(format!(
                    "expected {expected}-dimensional vector, got {}",
                    vector.len()
                )));
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_format_is_correct() {
        let client = HttpEmbedder::new(Some("test-key".into()), "text-embedding-3-small");
        let request = client.build_request(&["first chunk", "second chunk"]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
        assert_eq!(json["input"][1], "second chunk");
    }

    #[test]
    fn response_parsing_works() {
        let json = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}
            ],
            "model": "text-embedding-3-small"
        }"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn config_base_url_overrides_provider_default() {
        let config = EmbeddingConfig {
            base_url: Some("http://embeddings.internal/v1/".into()),
            api_key: Some("k".into()),
            ..EmbeddingConfig::default()
        };
        let client = HttpEmbedder::with_config(&config);
        assert_eq!(client.base_url(), "http://embeddings.internal/v1");
    }

    #[tokio::test]
    async fn missing_api_key_is_a_capability_error() {
        let client = HttpEmbedder::new(None, "text-embedding-3-small");
        let err = client.initialize().await.unwrap_err();
        assert!(err.is_capability_error());
        assert!(err.to_string().contains("API key"), "{err}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_capability_error() {
        let config = EmbeddingConfig {
            provider: "ollama".into(),
            base_url: Some("http://127.0.0.1:9".into()),
            ..EmbeddingConfig::default()
        };
        let client = HttpEmbedder::with_config(&config);
        let err = client.initialize().await.unwrap_err();
        assert!(err.is_capability_error());
        assert_eq!(client.dimensions(), None);
    }
}
