//! End-to-end pipeline: retrieve, assemble, generate, count.
//!
//! Each `process` call is stateless across calls; the only state the
//! pipeline holds is the retriever's loaded index and the generator's
//! connection handle. Any failure along the way propagates to the caller;
//! the pipeline never substitutes a placeholder answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::Result;
use crate::generator::{GenerationOptions, Generator};
use crate::prompt::PromptAssembler;
use crate::retriever::{RankedResult, Retriever};

/// Pipeline defaults, resolved once at call entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Documents retrieved per query
    pub top_k: usize,
    /// Similarity floor for retrieval
    pub min_score: f32,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            min_score: 0.5,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Token accounting for one processed query
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub answer_tokens: usize,
    pub total_tokens: usize,
}

/// Result of one `process` call. Created once, consumed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query: String,
    pub retrieved: Vec<RankedResult>,
    pub answer: String,
    pub metadata: TokenUsage,
}

/// Orchestrates retriever, prompt assembler, and generator.
pub struct Pipeline {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    assembler: PromptAssembler,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self::with_config(retriever, generator, PipelineConfig::default())
    }

    pub fn with_config(
        retriever: Arc<Retriever>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            assembler: PromptAssembler::new(),
            config,
        }
    }

    /// Process a single query: retrieve with the configured defaults, build
    /// the prompt (scoring template when `scoring` is set), generate, and
    /// record token counts.
    pub async fn process(&self, query: &str, scoring: bool) -> Result<PipelineResult> {
        let retrieved = self
            .retriever
            .retrieve(query, self.config.top_k, self.config.min_score)?;
        debug!(count = retrieved.len(), "documents retrieved");

        let prompt = self.assembler.assemble(query, &retrieved, scoring);
        let prompt_tokens = self.generator.count_tokens(&prompt)?;

        let options = GenerationOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stop: Vec::new(),
        };
        let answer = self.generator.generate(&prompt, &options).await?;
        let answer_tokens = self.generator.count_tokens(&answer)?;

        info!(
            prompt_tokens,
            answer_tokens,
            retrieved = retrieved.len(),
            "query processed"
        );

        Ok(PipelineResult {
            query: query.to_string(),
            retrieved,
            answer,
            metadata: TokenUsage {
                prompt_tokens,
                answer_tokens,
                total_tokens: prompt_tokens + answer_tokens,
            },
        })
    }

    /// Process queries in input order.
    ///
    /// Fail-fast: the first failing query aborts the whole batch, so a
    /// partial result list is never returned.
    pub async fn batch_process(
        &self,
        queries: &[String],
        scoring: bool,
    ) -> Result<Vec<PipelineResult>> {
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            results.push(self.process(query, scoring).await?);
        }
        Ok(results)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.top_k, 2);
        assert_eq!(config.min_score, 0.5);
        assert_eq!(config.temperature, 0.7);
    }

    #[test]
    fn test_token_usage_serializes() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            answer_tokens: 80,
            total_tokens: 200,
        };
        let value = serde_json::to_value(usage).unwrap();
        assert_eq!(value["total_tokens"], 200);
    }
}
