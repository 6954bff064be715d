//! Configuration for the retrieval engine.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::chunker::ChunkConfig;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// LLM configuration for the answer generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "gpt-4o-mini", "llama3-8b-8192")
    pub model: String,

    /// Maximum tokens for response (optional)
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "llama3-8b-8192".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Which embedder backs an index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic feature-hashing embedder, no network.
    Hashing,
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Http,
    /// Local all-MiniLM-L6-v2 (requires the `minilm` feature).
    Minilm,
}

impl FromStr for EmbeddingProvider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "http" | "openai" => Ok(Self::Http),
            "minilm" => Ok(Self::Minilm),
            other => Err(RagError::Config(format!(
                "Unknown embedding provider '{}' (expected hashing, http or minilm)",
                other
            ))),
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Output dimension of the hashing embedder.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            api_base: String::new(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimension: 384,
        }
    }
}

/// Chunking, search and timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
    /// Maximum in-flight embedder calls during a build.
    pub embed_concurrency: usize,
    pub embed_timeout_ms: u64,
    pub generate_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            overlap: 20,
            top_k: 3,
            embed_concurrency: 8,
            embed_timeout_ms: 30_000,
            generate_timeout_ms: 60_000,
        }
    }
}

impl RetrievalConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }
}

/// Evaluation harness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Oldest summaries are rotated out past this many; `None` keeps all.
    pub history_capacity: Option<usize>,
    /// Per-chunk relevance at or above this counts as a hit for precision@k.
    pub relevance_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            history_capacity: None,
            relevance_threshold: 0.5,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_*, EMBEDDING_*, RAG_*)
    /// 2. Config file (~/.config/rust-rag-engine/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML document; missing sections and keys keep their defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(api_base) = env::var("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }
        if let Ok(api_key) = env::var("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(tokens) = parsed_env("LLM_MAX_TOKENS") {
            self.llm.max_tokens = tokens;
        }
        if let Some(temp) = parsed_env("LLM_TEMPERATURE") {
            self.llm.temperature = temp;
        }

        if let Ok(provider) = env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Ok(api_base) = env::var("EMBEDDING_API_BASE") {
            self.embedding.api_base = api_base;
        }
        if let Ok(api_key) = env::var("EMBEDDING_API_KEY") {
            self.embedding.api_key = api_key;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dimension) = parsed_env("EMBEDDING_DIMENSION") {
            self.embedding.dimension = dimension;
        }

        if let Some(chunk_size) = parsed_env("RAG_CHUNK_SIZE") {
            self.retrieval.chunk_size = chunk_size;
        }
        if let Some(overlap) = parsed_env("RAG_CHUNK_OVERLAP") {
            self.retrieval.overlap = overlap;
        }
        if let Some(top_k) = parsed_env("RAG_TOP_K") {
            self.retrieval.top_k = top_k;
        }

        Ok(())
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rust-rag-engine")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate retrieval and evaluation settings.
    pub fn validate(&self) -> Result<()> {
        self.retrieval.chunk_config().validate()?;

        if self.retrieval.top_k == 0 {
            return Err(RagError::invalid_config("retrieval.top_k", 0, "top_k > 0"));
        }
        if self.retrieval.embed_concurrency == 0 {
            return Err(RagError::invalid_config(
                "retrieval.embed_concurrency",
                0,
                "embed_concurrency > 0",
            ));
        }
        self.validate_evaluation()?;
        if self.embedding.provider == EmbeddingProvider::Hashing && self.embedding.dimension == 0 {
            return Err(RagError::invalid_config("embedding.dimension", 0, "dimension > 0"));
        }
        if self.embedding.provider == EmbeddingProvider::Http && self.embedding.api_base.is_empty()
        {
            return Err(RagError::Config(
                "Embedding API base URL is required for the http provider. Set EMBEDDING_API_BASE environment variable or add to config file.".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate only the evaluation settings, for runs that score recorded responses.
    pub fn validate_evaluation(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.evaluation.relevance_threshold) {
            return Err(RagError::invalid_config(
                "evaluation.relevance_threshold",
                self.evaluation.relevance_threshold,
                "a value in [0, 1]",
            ));
        }
        if self.evaluation.history_capacity == Some(0) {
            return Err(RagError::invalid_config(
                "evaluation.history_capacity",
                0,
                "history_capacity > 0",
            ));
        }
        Ok(())
    }

    /// Validate that the generator credentials are present.
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(RagError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(RagError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(RagError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Create a config from explicit LLM values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn parsed_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.api_base.is_empty());
        assert_eq!(config.retrieval.chunk_size, 100);
        assert_eq!(config.retrieval.overlap, 20);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.embedding.dimension, 384);
        assert!(config.evaluation.history_capacity.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_llm_fails_without_required_fields() {
        let config = Config::default();
        assert!(config.validate_llm().is_err());

        let config = Config::with_llm("https://api.example.com", "test-key", "gpt-4o-mini");
        assert!(config.validate_llm().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_chunk_size() {
        let mut config = Config::default();
        config.retrieval.overlap = config.retrieval.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(RagError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_validate_evaluation_ignores_embedding_settings() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProvider::Http;
        config.embedding.api_base.clear();
        assert!(config.validate().is_err());
        assert!(config.validate_evaluation().is_ok());

        config.evaluation.relevance_threshold = 1.5;
        assert!(matches!(
            config.validate_evaluation(),
            Err(RagError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
retrieval:
  chunk_size: 200
  overlap: 50
evaluation:
  history_capacity: 10
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.retrieval.chunk_size, 200);
        assert_eq!(config.retrieval.overlap, 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.evaluation.history_capacity, Some(10));
        assert_eq!(config.llm.max_tokens, 1024);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "llm:\n  api_base: https://api.example.com\n  api_key: k\n  model: m\nembedding:\n  provider: http\n  api_base: https://emb.example.com\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.llm.model, "m");
        assert_eq!(config.embedding.provider, EmbeddingProvider::Http);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Http);
        assert_eq!("minilm".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Minilm);
        assert!("word2vec".parse::<EmbeddingProvider>().is_err());
    }
}
