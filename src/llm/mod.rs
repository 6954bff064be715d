//! LLM integration module.
//!
//! Provides the [`Generator`] capability, an OpenAI-compatible client that
//! implements it, and the grounding prompts used for answer generation.

mod client;
mod prompts;

pub use client::{LlmClient, LlmResponse, Message, Role, TokenUsage};
pub use prompts::Prompts;

use crate::error::Result;
use async_trait::async_trait;

/// Produces an answer to `query` grounded in ordered context passages.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String>;
}
