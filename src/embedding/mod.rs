//! Embedding capability.
//!
//! The embedding model is an opaque function `text -> fixed-length vector`.
//! It is injected as a trait object so tests can substitute a deterministic
//! fake. Implementations must return unit-norm vectors; similarity is
//! computed as an inner product standing in for cosine similarity.

mod bert;

pub use bert::BertEmbedder;

use crate::errors::Result;

/// Opaque sentence encoder. Deterministic per model.
pub trait Embedder: Send + Sync {
    /// Encode one text into a unit-norm vector.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode many texts. Output order matches input order.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Fixed output dimension.
    fn dimension(&self) -> usize;
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Euclidean norm of a vector.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}
