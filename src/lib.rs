//! Rust RAG Engine - an in-memory retrieval core with an evaluation harness.
//!
//! Documents are split into overlapping word windows, each window is embedded,
//! and queries are answered by cosine top-k search over the unit vectors. The
//! retrieved chunks ground a text generator, and the evaluation layer scores
//! retrieval and generation quality across a test set.
//!
//! # Quick Start
//!
//! ```no_run
//! use rust_rag_engine::{
//!     config::Config,
//!     document::load_corpus,
//!     embedding,
//!     llm::LlmClient,
//!     pipeline::RagPipeline,
//!     retrieval::{BuildOptions, RetrievalEngine},
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let embedder = embedding::from_config(&config.embedding)?;
//!     let engine = Arc::new(RetrievalEngine::new(
//!         embedder,
//!         config.retrieval.chunk_config(),
//!         BuildOptions::default(),
//!     )?);
//!
//!     let documents = load_corpus(Path::new("docs"))?;
//!     engine.build(&documents).await?;
//!
//!     for hit in engine.search("how do vector databases work?", 3).await? {
//!         println!("{} {:.3} {}", hit.rank, hit.similarity_score, hit.chunk.source);
//!     }
//!
//!     let generator = Arc::new(LlmClient::new(config.llm.clone()));
//!     let pipeline = RagPipeline::new(engine, generator, config.retrieval.top_k);
//!     let answer = pipeline.answer("What is RAG?").await?;
//!     println!("{}", answer.response);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Chunker**: fixed-size overlapping word windows with provenance
//! - **EmbeddingStore**: append-only vectors with a fixed dimension
//! - **SimilarityIndex**: bounded-heap top-k with deterministic ties
//! - **RetrievalEngine**: build-then-serve index over an [`Embedder`]
//! - **RagPipeline**: retrieval plus a [`Generator`]
//! - **EvaluationAggregator**: metric evaluators and summary statistics

pub mod chunker;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod llm;
pub mod pipeline;
pub mod retrieval;
pub mod similarity;
pub mod store;

// Re-export commonly used types
pub use chunker::{Chunk, ChunkConfig, Chunker};
pub use config::Config;
pub use document::{Document, MediaType};
pub use embedding::{Embedder, HashingEmbedder};
pub use error::{RagError, Result};
pub use eval::{EvaluationAggregator, EvaluationHistory, EvaluationSummary, TestCase};
pub use llm::{Generator, LlmClient};
pub use pipeline::{BatchQuery, PipelineEvaluation, RagAnswer, RagPipeline};
pub use retrieval::{BuildOptions, RetrievalEngine, RetrievalIndex, SearchResult};
pub use similarity::{ScoredPosition, SimilarityIndex};
pub use store::{Embedding, EmbeddingStore};
