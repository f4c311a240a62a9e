use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::corpus::{normalize_text, DocumentRecord};
use crate::errors::{RagError, Result};

/// Loads the line-delimited JSON knowledge base.
///
/// A malformed line fails the whole ingestion. Skipping bad lines would
/// silently shrink the corpus and desynchronize it from any previously
/// persisted index.
pub struct CorpusLoader {
    file_path: PathBuf,
}

impl CorpusLoader {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// Parse every line into a [`DocumentRecord`], normalizing the question
    /// and answer fields. Blank lines are not tolerated.
    pub fn load(&self) -> Result<Vec<DocumentRecord>> {
        let file = File::open(&self.file_path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let record = Self::parse_line(&line, line_no + 1)?;
            records.push(record);
        }

        info!(
            count = records.len(),
            path = %self.file_path.display(),
            "corpus loaded"
        );
        Ok(records)
    }

    fn parse_line(line: &str, line_no: usize) -> Result<DocumentRecord> {
        let mut record: DocumentRecord =
            serde_json::from_str(line).map_err(|e| RagError::IngestionFormat {
                line: line_no,
                reason: e.to_string(),
            })?;

        record.input = normalize_text(&record.input);
        record.output = normalize_text(&record.output);
        Ok(record)
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}
