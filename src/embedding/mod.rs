//! Embedders: the external text → vector function the engine depends on.
//!
//! - [`HashingEmbedder`]: deterministic feature hashing, no model or network
//! - [`HttpEmbedder`]: OpenAI-compatible `/v1/embeddings` endpoint
//! - `MiniLmEmbedder`: local all-MiniLM-L6-v2 via candle (`minilm` feature)

mod http;
#[cfg(feature = "minilm")]
mod minilm;

pub use http::HttpEmbedder;
#[cfg(feature = "minilm")]
pub use minilm::MiniLmEmbedder;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A provider that turns text into a fixed-length vector.
///
/// The dimension must stay constant across calls within one index build.
/// Vectors need not be normalized; the engine normalizes them.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "embedder"
    }
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Bag-of-words feature hashing into a fixed number of buckets.
///
/// Each lowercased alphanumeric token adds ±1 to one bucket, the sign taken
/// from the top hash bit. Tokens are hashed with 64-bit FNV-1a, so vectors
/// are identical across platforms and compiler releases. Texts sharing words
/// get positive cosine similarity, which is enough for offline runs and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::invalid_config("dimension", 0, "dimension > 0"));
        }
        Ok(Self { dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed synchronously; [`Embedder::embed`] delegates here.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        vector
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Build the embedder selected by configuration.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(config.clone()))),
        #[cfg(feature = "minilm")]
        EmbeddingProvider::Minilm => Ok(Arc::new(MiniLmEmbedder::load(&config.model)?)),
        #[cfg(not(feature = "minilm"))]
        EmbeddingProvider::Minilm => Err(RagError::Config(
            "The minilm embedding provider requires building with --features minilm".to_string(),
        )),
    }
}
