//! Generation capability.
//!
//! The answer model is an opaque function `prompt -> text` plus a token
//! counter with a fixed, model-specific scheme. It is injected as a trait
//! object so the pipeline can be exercised with a deterministic fake.

mod ollama;

pub use ollama::OllamaGenerator;

use async_trait::async_trait;

use crate::errors::Result;

/// Sampling options, resolved once at call entry from configured defaults.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    /// Stop sequences, if any
    pub stop: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            stop: Vec::new(),
        }
    }
}

/// Opaque text generator. Stateless per call; safe for concurrent use.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Count tokens under the model's tokenization scheme.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}
