//! Flat inner-product vector index.
//!
//! Holds N vectors and a parallel list of N canonical texts; position `i` in
//! both refers to the same logical document, and the pairing survives
//! persistence in order. Search is exact brute force: with a corpus of a few
//! tens of thousands of documents a scan is faster than maintaining an
//! approximate structure, and it makes results bit-for-bit reproducible.
//!
//! The index is immutable after build. Concurrent searches share it behind
//! an `Arc`; a rebuild produces a new instance that replaces the old one.

mod builder;

pub use builder::IndexBuilder;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::errors::{RagError, Result};

const INDEX_MAGIC: &[u8; 4] = b"LXIX";
const INDEX_FILE: &str = "index.bin";
const TEXTS_FILE: &str = "texts.json";

/// Immutable flat index over unit-norm embedding vectors.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    /// Row-major storage, `len * dimension` floats
    vectors: Vec<f32>,
    texts: Vec<String>,
}

impl VectorIndex {
    /// Build an index from co-indexed texts and vectors.
    ///
    /// Fails with [`RagError::DimensionMismatch`] when vectors disagree on
    /// length, and with [`RagError::CorruptIndex`] when the text and vector
    /// counts differ.
    pub fn build(texts: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if texts.len() != vectors.len() {
            return Err(RagError::CorruptIndex(format!(
                "{} texts but {} vectors",
                texts.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        let mut flat = Vec::with_capacity(vectors.len() * dimension);
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            flat.extend_from_slice(vector);
        }

        Ok(Self {
            dimension,
            vectors: flat,
            texts,
        })
    }

    /// Return the `k` entries with the highest inner product against `query`,
    /// sorted by similarity descending. Ties break toward the lower original
    /// index, so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..self.texts.len())
            .map(|i| {
                let row = &self.vectors[i * self.dimension..(i + 1) * self.dimension];
                let score = row.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
                (i, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Canonical text for a stored vector position.
    pub fn text(&self, index: usize) -> Option<&str> {
        self.texts.get(index).map(String::as_str)
    }

    /// Raw vector for a stored position (tests and diagnostics).
    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        if self.dimension == 0 {
            return None;
        }
        self.vectors
            .chunks_exact(self.dimension)
            .nth(index)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Write the two co-located artifacts: a binary vector blob and the
    /// ordered text list. They are only valid together.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let mut writer = BufWriter::new(File::create(dir.join(INDEX_FILE))?);
        writer.write_all(INDEX_MAGIC)?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.texts.len() as u32).to_le_bytes())?;
        for value in &self.vectors {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;

        let texts_writer = BufWriter::new(File::create(dir.join(TEXTS_FILE))?);
        serde_json::to_writer(texts_writer, &self.texts)?;

        info!(count = self.texts.len(), dir = %dir.display(), "index persisted");
        Ok(())
    }

    /// Load a persisted index, verifying magic, sizes, and that the vector
    /// and text counts agree.
    pub fn restore(dir: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(dir.join(INDEX_FILE))?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != INDEX_MAGIC {
            return Err(RagError::CorruptIndex("bad magic in index.bin".to_string()));
        }

        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let dimension = u32::from_le_bytes(word) as usize;
        reader.read_exact(&mut word)?;
        let count = u32::from_le_bytes(word) as usize;

        // Header values are untrusted; reject sizes that cannot describe a
        // real artifact before doing arithmetic with them.
        let expected_bytes = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                RagError::CorruptIndex(format!(
                    "implausible header: {count} vectors of dimension {dimension}"
                ))
            })?;

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        if payload.len() != expected_bytes {
            return Err(RagError::CorruptIndex(format!(
                "expected {} vector bytes, found {}",
                expected_bytes,
                payload.len()
            )));
        }

        let vectors: Vec<f32> = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let texts_reader = BufReader::new(File::open(dir.join(TEXTS_FILE))?);
        let texts: Vec<String> = serde_json::from_reader(texts_reader)?;

        if texts.len() != count {
            return Err(RagError::CorruptIndex(format!(
                "index.bin has {} vectors but texts.json has {} texts",
                count,
                texts.len()
            )));
        }

        info!(count, dimension, dir = %dir.display(), "index restored");
        Ok(Self {
            dimension,
            vectors,
            texts,
        })
    }
}
