//! Local sentence-transformers embeddings using candle.

use super::Embedder;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;

/// Default model when the configured name is not a sentence-transformers repo.
pub const MINILM_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

fn failure(context: &str, err: impl std::fmt::Display) -> RagError {
    RagError::EmbedderFailure(format!("{}: {}", context, err))
}

struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEncoder {
    fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| failure("failed to create HF Hub API", e))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| failure("failed to get config.json", e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| failure("failed to get tokenizer.json", e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| failure("failed to get model weights", e))?;

        let raw_config =
            std::fs::read_to_string(&config_path).map_err(|e| RagError::io(&config_path, e))?;
        let config: BertConfig =
            serde_json::from_str(&raw_config).map_err(|e| failure("failed to parse config", e))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| failure("failed to load tokenizer", e))?;

        // SAFETY: the weights file is owned by the HF cache and not mutated while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| failure("failed to map model weights", e))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| failure("failed to load BERT", e))?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// Mean-pooled sentence embedding of one text.
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| failure("tokenization failed", e))?;

        let ids = encoding.get_ids().to_vec();
        let mask = encoding.get_attention_mask().to_vec();
        let len = ids.len();
        let types = vec![0u32; len];

        self.forward(ids, mask, types, len)
            .map_err(|e| failure("model forward pass failed", e))
    }

    fn forward(
        &self,
        ids: Vec<u32>,
        mask: Vec<u32>,
        types: Vec<u32>,
        len: usize,
    ) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::from_vec(ids, (1, len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (1, len), &self.device)?;
        let token_type_ids = Tensor::from_vec(types, (1, len), &self.device)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask
            .unsqueeze(2)?
            .to_dtype(output.dtype())?
            .broadcast_as(output.shape())?;
        let summed = (output * &mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let pooled = (summed / counts)?;

        Ok(pooled.squeeze(0)?.to_vec1::<f32>()?)
    }
}

/// all-MiniLM-L6-v2 (or another BERT sentence model) run on the CPU.
///
/// Inference is CPU-bound, so each call runs on the blocking pool.
#[derive(Clone)]
pub struct MiniLmEmbedder {
    encoder: Arc<BertEncoder>,
}

impl MiniLmEmbedder {
    /// Load a sentence-transformers model by Hugging Face id.
    pub fn load(model_id: &str) -> Result<Self> {
        let model_id = if model_id.starts_with("sentence-transformers/") {
            model_id
        } else {
            MINILM_MODEL_ID
        };
        info!(model = model_id, "loading local embedding model");

        Ok(Self {
            encoder: Arc::new(BertEncoder::load(model_id)?),
        })
    }
}

#[async_trait]
impl Embedder for MiniLmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoder = Arc::clone(&self.encoder);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || encoder.encode(&text))
            .await
            .map_err(|e| failure("embedding task failed", e))?
    }

    fn name(&self) -> &str {
        "minilm"
    }
}
