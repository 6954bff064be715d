//! Error types for the retrieval engine.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while chunking, indexing, searching or evaluating.
#[derive(Error, Debug)]
pub enum RagError {
    /// A chunking, search or evaluator setting violates its constraint.
    #[error("Invalid configuration: {parameter} = {value} (expected {constraint})")]
    InvalidConfiguration {
        parameter: String,
        value: String,
        constraint: String,
    },

    /// A vector does not match the dimension established by the store.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A search was issued before any index was built.
    #[error("Index has not been built yet")]
    IndexNotBuilt,

    /// An operation that needs content received none.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// The external embedder failed or timed out.
    #[error("Embedder failure: {0}")]
    EmbedderFailure(String),

    /// The external generator failed or timed out.
    #[error("Generator failure: {0}")]
    GeneratorFailure(String),

    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The corpus directory does not exist or is not a directory.
    #[error("Corpus path '{0}' does not exist or is not a directory")]
    InvalidCorpusPath(PathBuf),

    /// No documents found in the corpus.
    #[error("No documents found in corpus at '{0}'")]
    EmptyCorpus(PathBuf),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An evaluation worker could not complete.
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid-configuration error naming the offending value.
    pub fn invalid_config(
        parameter: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            parameter: parameter.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Embedder call exceeded its deadline.
    pub fn embedder_timeout(after: Duration) -> Self {
        Self::EmbedderFailure(format!("timed out after {}ms", after.as_millis()))
    }

    /// Generator call exceeded its deadline.
    pub fn generator_timeout(after: Duration) -> Self {
        Self::GeneratorFailure(format!("timed out after {}ms", after.as_millis()))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::LlmParse(err.to_string())
    }
}
