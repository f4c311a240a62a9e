//! Error types for the lexrag retrieval engine.
//!
//! Every failure mode the core can hit has its own variant so callers can
//! match on the kind instead of parsing messages. The core never downgrades
//! a failure into a degraded result.

use thiserror::Error;

/// Main error type for retrieval and answer assembly
#[derive(Error, Debug)]
pub enum RagError {
    /// Retrieval attempted before an index was built or restored
    #[error("Vector index not loaded; build or restore an index first")]
    IndexNotLoaded,

    /// Embedding dimension inconsistency between index and query/model
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller asked for a non-positive number of results
    #[error("Invalid top_k: {top_k} (must be >= 1)")]
    InvalidTopK { top_k: usize },

    /// Score floor is not a finite number
    #[error("Invalid min_score: {min_score} (must be finite)")]
    InvalidScoreRange { min_score: f32 },

    /// The embedding capability failed
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// The generation capability errored or timed out
    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    /// A corpus line failed to parse; ingestion aborts rather than skipping
    #[error("Ingestion format error at line {line}: {reason}")]
    IngestionFormat { line: usize, reason: String },

    /// Persisted index artifacts are missing, truncated, or inconsistent
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RagError>;
