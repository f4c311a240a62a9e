//! lexrag - semantic retrieval and answer assembly over a legal Q&A corpus.
//!
//! The crate encodes corpus records into unit-norm dense vectors, serves
//! approximate-nearest-neighbor queries from a flat inner-product index with
//! score thresholding and candidate over-fetch, and assembles the surviving
//! passages into a bounded prompt for a downstream generator.
//!
//! # Architecture
//!
//! - [`corpus`]: document records, normalization, canonical text
//! - [`embedding`] / [`generator`]: opaque model capabilities behind traits
//! - [`index`]: flat inner-product index with exact persist/restore
//! - [`retriever`]: over-fetch, score floor, ranking
//! - [`pipeline`]: retrieve -> assemble -> generate with token bookkeeping

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod errors;
pub mod generator;
pub mod index;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

// Re-export commonly used types
pub use config::Config;
pub use errors::{RagError, Result};
pub use pipeline::{Pipeline, PipelineResult};
pub use retriever::{RankedResult, Retriever};
