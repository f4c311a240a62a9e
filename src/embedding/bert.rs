use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;

use crate::embedding::{l2_normalize, Embedder};
use crate::errors::{RagError, Result};

/// BERT sentence encoder via Candle (downloads weights on first use).
///
/// Embeddings are mean-pooled over the attention mask and L2-normalized
/// before being returned, so the encoder satisfies the unit-norm contract
/// of [`Embedder`] without callers having to renormalize.
pub struct BertEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    dimension: usize,
}

impl BertEmbedder {
    /// Load model and tokenizer for the given HuggingFace model id.
    pub fn new(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new()
            .map_err(|e| RagError::EmbeddingFailure(format!("hub client: {e}")))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| RagError::EmbeddingFailure(format!("download config: {e}")))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| RagError::EmbeddingFailure(format!("download tokenizer: {e}")))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| RagError::EmbeddingFailure(format!("download weights: {e}")))?;

        let config_contents = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_contents)?;
        let dimension = config.hidden_size;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| RagError::EmbeddingFailure(format!("load tokenizer: {e}")))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], candle_core::DType::F32, &device)
                .map_err(|e| RagError::EmbeddingFailure(format!("load weights: {e}")))?
        };

        let model = BertModel::load(vb, &config)
            .map_err(|e| RagError::EmbeddingFailure(format!("build model: {e}")))?;

        info!(model_id, dimension, "embedding model loaded");

        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device,
            dimension,
        })
    }

    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| RagError::EmbeddingFailure(format!("tokenization: {e}")))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = texts.len();

        // Pad ids and attention masks to a rectangular batch
        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            flat_ids[i * max_len..i * max_len + ids.len()].copy_from_slice(ids);
            flat_mask[i * max_len..i * max_len + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)
            .map_err(embed_err)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)
            .map_err(embed_err)?;

        let token_type_ids = token_ids.zeros_like().map_err(embed_err)?;
        let embeddings = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))
            .map_err(embed_err)?;

        let pooled = Self::mean_pool(&embeddings, &attention_mask)?;

        let mut rows = pooled.to_vec2::<f32>().map_err(embed_err)?;
        for row in rows.iter_mut() {
            l2_normalize(row);
        }

        Ok(rows)
    }

    /// Mean pooling over the sequence dimension, weighted by attention mask
    fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let mask_expanded = attention_mask
            .unsqueeze(2)
            .map_err(embed_err)?
            .expand(embeddings.shape())
            .map_err(embed_err)?
            .to_dtype(embeddings.dtype())
            .map_err(embed_err)?;

        let sum_embeddings = (embeddings * &mask_expanded)
            .map_err(embed_err)?
            .sum(1)
            .map_err(embed_err)?;
        let sum_mask = mask_expanded
            .sum(1)
            .map_err(embed_err)?
            .clamp(1e-9, f64::MAX)
            .map_err(embed_err)?;

        sum_embeddings.broadcast_div(&sum_mask).map_err(embed_err)
    }
}

fn embed_err(e: candle_core::Error) -> RagError {
    RagError::EmbeddingFailure(e.to_string())
}

impl Embedder for BertEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut rows = self.forward_batch(&[text])?;
        rows.pop()
            .ok_or_else(|| RagError::EmbeddingFailure("empty model output".to_string()))
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.forward_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_norm;

    const TEST_MODEL: &str = "moka-ai/m3e-base";

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_encode_is_unit_norm() {
        let embedder = BertEmbedder::new(TEST_MODEL).expect("failed to load model");
        let v = embedder.encode("劳动合同应当以书面形式订立").expect("encode");
        assert_eq!(v.len(), embedder.dimension());
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_encode_batch_matches_single() {
        let embedder = BertEmbedder::new(TEST_MODEL).expect("failed to load model");
        let single = embedder.encode("测试文本").expect("encode");
        let batch = embedder.encode_batch(&["测试文本"]).expect("encode batch");
        for (a, b) in single.iter().zip(batch[0].iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_encode_empty_batch() {
        let embedder = BertEmbedder::new(TEST_MODEL).expect("failed to load model");
        assert!(embedder.encode_batch(&[]).expect("encode").is_empty());
    }
}
