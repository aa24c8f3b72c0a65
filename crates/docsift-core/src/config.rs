use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DocsiftError;

/// Top-level configuration loaded from `.docsift.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use docsift_core::DocsiftConfig;
///
/// let config = DocsiftConfig::default();
/// assert_eq!(config.retrieval.chunk_size, 2000);
/// assert_eq!(config.retrieval.top_k, 3);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsiftConfig {
    /// Chunking and ranking settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Embedding provider settings for semantic search.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Answer endpoint settings.
    #[serde(default)]
    pub answer: AnswerConfig,
}

impl DocsiftConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Io`] if the file cannot be read, or
    /// [`DocsiftError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docsift_core::DocsiftConfig;
    /// use std::path::Path;
    ///
    /// let config = DocsiftConfig::from_file(Path::new(".docsift.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DocsiftError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift_core::DocsiftConfig;
    ///
    /// let toml = r#"
    /// [retrieval]
    /// top_k = 5
    /// "#;
    /// let config = DocsiftConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.retrieval.top_k, 5);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DocsiftError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Chunking, batching, and ranking configuration.
///
/// # Examples
///
/// ```
/// use docsift_core::RetrievalConfig;
///
/// let config = RetrievalConfig::default();
/// assert_eq!(config.overlap, 400);
/// assert_eq!(config.batch_size, 5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Window size in characters (default: 2000).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between neighbouring windows (default: 400).
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Number of results returned by a search (default: 3).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Chunks embedded concurrently per batch (default: 5).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_chunk_size() -> usize {
    2000
}

fn default_overlap() -> usize {
    400
}

fn default_top_k() -> usize {
    3
}

fn default_batch_size() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            top_k: default_top_k(),
            batch_size: default_batch_size(),
        }
    }
}

impl RetrievalConfig {
    /// Check that chunking terminates and batching makes progress.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::InvalidConfiguration`] if `chunk_size` is zero,
    /// `overlap >= chunk_size`, or `batch_size` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift_core::RetrievalConfig;
    ///
    /// let config = RetrievalConfig { overlap: 2000, ..RetrievalConfig::default() };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), DocsiftError> {
        if self.chunk_size == 0 {
            return Err(DocsiftError::InvalidConfiguration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(DocsiftError::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        if self.batch_size == 0 {
            return Err(DocsiftError::InvalidConfiguration(
                "batch_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the embedding provider used by semantic search.
///
/// # Examples
///
/// ```
/// use docsift_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.init_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider (default: `"openai"`).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name (default: `"text-embedding-3-small"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Custom base URL for an OpenAI-compatible `/embeddings` endpoint.
    pub base_url: Option<String>,
    /// API key for the embedding provider.
    pub api_key: Option<String>,
    /// Upper bound on capability setup, in seconds (default: 30).
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "openai".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_init_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: None,
            api_key: None,
            init_timeout_secs: default_init_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the API key: config value, then `DOCSIFT_EMBEDDING_API_KEY`,
    /// then `OPENAI_API_KEY`.
    /// Blank values are skipped at every step.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        let present = |key: &String| !key.trim().is_empty();
        self.api_key
            .clone()
            .filter(present)
            .or_else(|| env("DOCSIFT_EMBEDDING_API_KEY").filter(present))
            .or_else(|| env("OPENAI_API_KEY").filter(present))
    }
}

/// Configuration for the external answer endpoint.
///
/// # Examples
///
/// ```
/// use docsift_core::AnswerConfig;
///
/// let config = AnswerConfig::default();
/// assert_eq!(config.endpoint, "/api/answer");
/// assert_eq!(config.max_tokens, 600);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// Base URL of the answer server (default: `"http://localhost:3000"`).
    #[serde(default = "default_answer_base_url")]
    pub base_url: String,
    /// Path of the answer route (default: `"/api/answer"`).
    #[serde(default = "default_answer_endpoint")]
    pub endpoint: String,
    /// Generation budget sent with each request (default: 600).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Mood label sent when none is given (default: `"neutral"`).
    #[serde(default = "default_mood")]
    pub mood: String,
    /// HTTP timeout in seconds (default: 120).
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_answer_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_answer_endpoint() -> String {
    "/api/answer".into()
}

fn default_max_tokens() -> u32 {
    600
}

fn default_mood() -> String {
    "neutral".into()
}

fn default_answer_timeout_secs() -> u64 {
    120
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            base_url: default_answer_base_url(),
            endpoint: default_answer_endpoint(),
            max_tokens: default_max_tokens(),
            mood: default_mood(),
            timeout_secs: default_answer_timeout_secs(),
        }
    }
}
