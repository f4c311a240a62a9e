use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::errors::{RagError, Result};

/// Top-level configuration, persisted as TOML
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Corpus and index locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Line-delimited JSON knowledge base
    pub knowledge_base: PathBuf,
    /// Directory holding the persisted index artifacts
    pub index_dir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            knowledge_base: PathBuf::from("data/law_qa.jsonl"),
            index_dir: PathBuf::from("data/vectors"),
        }
    }
}

/// Embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// HuggingFace model id for the sentence encoder
    pub model_id: String,
    /// Batch size for ingestion-time encoding
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "moka-ai/m3e-base".to_string(),
            batch_size: 32,
        }
    }
}

/// Retrieval defaults, used when the caller does not override them
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of documents returned per query
    pub top_k: usize,
    /// Minimum similarity; hits below this are dropped
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            min_score: 0.5,
        }
    }
}

/// Generation model settings and sampling defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL for the Ollama API
    pub base_url: String,
    /// Model name, e.g. "qwen2.5:7b-instruct"
    pub model: String,
    /// HuggingFace tokenizer id used for token counting
    pub tokenizer_id: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            tokenizer_id: "Qwen/Qwen2.5-7B-Instruct".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl Config {
    /// Load configuration from file, creating the default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RagError::Config(format!("failed to parse config file: {e}")))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("failed to serialize config: {e}")))?;

        fs::write(&config_path, toml_string)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Config("could not determine home directory".to_string()))?;

        Ok(home.join(".lexrag").join("config.toml"))
    }
}
