use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::embedding::{l2_normalize, Embedder};
use crate::errors::Result;
use crate::index::VectorIndex;

/// Batch-encodes canonical texts into a [`VectorIndex`].
///
/// Batching is a throughput optimization only; results are identical to
/// encoding one text at a time.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            batch_size: 32,
            show_progress: false,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Draw a terminal progress bar while encoding (ingestion CLI).
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Encode all texts and build the index. Vectors are renormalized after
    /// encoding so the unit-norm invariant holds even if the embedder does
    /// not guarantee it.
    pub fn build(&self, texts: Vec<String>) -> Result<VectorIndex> {
        info!(count = texts.len(), "encoding corpus");

        let progress = if self.show_progress {
            let bar = ProgressBar::new(texts.len() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40}] {pos}/{len} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message("encoding");
            Some(bar)
        } else {
            None
        };

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let mut encoded = self.embedder.encode_batch(&refs)?;
            for vector in encoded.iter_mut() {
                l2_normalize(vector);
            }
            vectors.append(&mut encoded);
            if let Some(bar) = &progress {
                bar.inc(batch.len() as u64);
            }
        }

        if let Some(bar) = &progress {
            bar.finish_with_message("encoded");
        }

        VectorIndex::build(texts, vectors)
    }
}
