use async_trait::async_trait;
use hf_hub::{api::sync::Api, Repo, RepoType};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::GenerationConfig;
use crate::errors::{RagError, Result};
use crate::generator::{GenerationOptions, Generator};

/// Answer generator backed by the Ollama HTTP API.
///
/// Token counting uses the model family's HuggingFace tokenizer so counts
/// match what the model actually consumes, rather than a character
/// heuristic.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    tokenizer: Tokenizer,
    defaults: GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    /// Build a generator from configuration, downloading the tokenizer on
    /// first use.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| RagError::GenerationFailure(format!("http client: {e}")))?;

        let api = Api::new()
            .map_err(|e| RagError::GenerationFailure(format!("hub client: {e}")))?;
        let repo = api.repo(Repo::new(config.tokenizer_id.clone(), RepoType::Model));
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| RagError::GenerationFailure(format!("download tokenizer: {e}")))?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| RagError::GenerationFailure(format!("load tokenizer: {e}")))?;

        info!(model = %config.model, "generator ready");

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            tokenizer,
            defaults: GenerationOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                stop: Vec::new(),
            },
        })
    }

    /// Configured sampling defaults.
    pub fn defaults(&self) -> &GenerationOptions {
        &self.defaults
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let mut request_options = json!({
            "temperature": options.temperature,
            "num_predict": options.max_tokens,
        });
        if !options.stop.is_empty() {
            request_options["stop"] = json!(options.stop);
        }

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": request_options,
            }))
            .send()
            .await
            .map_err(|e| RagError::GenerationFailure(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RagError::GenerationFailure(format!(
                "ollama returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagError::GenerationFailure(format!("bad response body: {e}")))?;

        let answer = body.response.trim().to_string();
        debug!(chars = answer.len(), "generation complete");
        Ok(answer)
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| RagError::GenerationFailure(format!("tokenization: {e}")))?;
        Ok(encoding.get_ids().len())
    }
}
