//! Retriever: query encoding, over-fetch, score floor, ranking.
//!
//! Composes the embedding capability with the vector index. The index lives
//! behind an `RwLock<Option<Arc<..>>>`: a rebuild installs a fresh instance
//! with an atomic swap, and searches run against the snapshot they took, so
//! an in-flight query is never affected by a concurrent rebuild.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::corpus::normalize_text;
use crate::embedding::{l2_normalize, Embedder};
use crate::errors::{RagError, Result};
use crate::index::VectorIndex;

/// Over-fetch cap: never examine more candidates than this, regardless of
/// the requested result count.
const MAX_CANDIDATES: usize = 10;

/// A single search hit, produced fresh per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    /// Canonical text of the matched document
    pub text: String,
    /// Inner-product similarity against the query vector
    pub score: f32,
    /// Position in the vector index
    pub index: usize,
}

/// A hit with its 1-based rank after final sort and truncation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub rank: usize,
    pub text: String,
    pub score: f32,
    pub index: usize,
}

/// Display form of a result: rank, text, score rounded to 4 decimal places,
/// and metadata only when explicitly requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedResult {
    pub rank: usize,
    pub text: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// Round a similarity score to 4 decimal places for display.
pub fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

/// Convert ranked results into the formatted output contract.
pub fn format_results(results: &[RankedResult], include_metadata: bool) -> Vec<FormattedResult> {
    results
        .iter()
        .map(|r| FormattedResult {
            rank: r.rank,
            text: r.text.clone(),
            score: round_score(r.score),
            metadata: if include_metadata {
                Some(serde_json::json!({ "index": r.index }))
            } else {
                None
            },
        })
        .collect()
}

/// Semantic retriever over the legal corpus.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl Retriever {
    /// Create a retriever with no index loaded yet.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: RwLock::new(None),
        }
    }

    /// Create a retriever over an already-built index.
    pub fn with_index(embedder: Arc<dyn Embedder>, index: VectorIndex) -> Self {
        let retriever = Self::new(embedder);
        retriever.install(index);
        retriever
    }

    /// Restore a persisted index and install it.
    pub fn load(&self, dir: &Path) -> Result<()> {
        let index = VectorIndex::restore(dir)?;
        self.install(index);
        Ok(())
    }

    /// Atomically replace the active index. Searches holding the previous
    /// snapshot finish against it undisturbed.
    pub fn install(&self, index: VectorIndex) {
        let count = index.len();
        *self.index.write().expect("index lock poisoned") = Some(Arc::new(index));
        info!(count, "index installed");
    }

    pub fn is_loaded(&self) -> bool {
        self.index.read().expect("index lock poisoned").is_some()
    }

    fn snapshot(&self) -> Result<Arc<VectorIndex>> {
        self.index
            .read()
            .expect("index lock poisoned")
            .clone()
            .ok_or(RagError::IndexNotLoaded)
    }

    /// Retrieve the `top_k` most similar documents scoring at least
    /// `min_score` (inclusive floor).
    ///
    /// The query is normalized exactly like corpus texts, encoded, and
    /// defensively renormalized. More candidates than `top_k` are fetched
    /// (`min(top_k * 3, 10)`) so the score floor does not starve the result
    /// set; survivors are sorted by score descending (ties keep index order)
    /// and truncated.
    ///
    /// A finite `min_score` outside `[-1, 1]` is accepted and simply filters
    /// vacuously; only non-finite floors are rejected.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RankedResult>> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK { top_k });
        }
        if !min_score.is_finite() {
            return Err(RagError::InvalidScoreRange { min_score });
        }

        let index = self.snapshot()?;

        let normalized = normalize_text(query);
        let mut query_vector = self.embedder.encode(&normalized)?;
        l2_normalize(&mut query_vector);

        let candidates = top_k.saturating_mul(3).min(MAX_CANDIDATES);
        let raw = index.search(&query_vector, candidates)?;

        let mut hits: Vec<RetrievalHit> = raw
            .into_iter()
            .filter(|(_, score)| *score >= min_score)
            .map(|(idx, score)| RetrievalHit {
                text: index.text(idx).unwrap_or_default().to_string(),
                score,
                index: idx,
            })
            .collect();

        // Index search already orders by (score desc, index asc); the stable
        // sort keeps that order authoritative after filtering.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        let results: Vec<RankedResult> = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RankedResult {
                rank: i + 1,
                text: hit.text,
                score: hit.score,
                index: hit.index,
            })
            .collect();

        debug!(query = %normalized, count = results.len(), "retrieval complete");
        Ok(results)
    }

    /// Retrieve using configured defaults for `top_k` and `min_score`.
    pub fn retrieve_with(
        &self,
        query: &str,
        config: &crate::config::RetrievalConfig,
    ) -> Result<Vec<RankedResult>> {
        self.retrieve(query, config.top_k, config.min_score)
    }

    /// Retrieve one result set per query, preserving input order.
    ///
    /// Fail-fast: the first failing query aborts the batch. Callers that
    /// want per-item isolation can loop over [`Retriever::retrieve`].
    pub fn batch_retrieve(
        &self,
        queries: &[String],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<Vec<RankedResult>>> {
        queries
            .iter()
            .map(|q| self.retrieve(q, top_k, min_score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Embedder returning preset vectors keyed by (normalized) text.
    struct FixedEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        dimension: usize,
    }

    impl FixedEmbedder {
        fn new(dimension: usize, entries: &[(&str, &[f32])]) -> Self {
            Self {
                vectors: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                dimension,
            }
        }
    }

    impl Embedder for FixedEmbedder {
        fn encode(&self, text: &str) -> Result<Vec<f32>> {
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| RagError::EmbeddingFailure(format!("no vector for {text:?}")))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn unit(v: &[f32]) -> Vec<f32> {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }

    /// Index over four 2-d documents at known angles from the x axis.
    fn angled_retriever() -> Retriever {
        let docs: Vec<(String, Vec<f32>)> = [0.0f32, 30.0, 60.0, 90.0]
            .iter()
            .enumerate()
            .map(|(i, deg)| {
                let rad = deg.to_radians();
                (format!("doc-{i}"), vec![rad.cos(), rad.sin()])
            })
            .collect();

        let index = VectorIndex::build(
            docs.iter().map(|(t, _)| t.clone()).collect(),
            docs.iter().map(|(_, v)| v.clone()).collect(),
        )
        .unwrap();

        let embedder = FixedEmbedder::new(2, &[("query", &[1.0, 0.0])]);
        Retriever::with_index(Arc::new(embedder), index)
    }

    #[test]
    fn test_retrieve_ranked_descending() {
        let retriever = angled_retriever();
        let results = retriever.retrieve("query", 3, 0.0).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].index, 0);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
            assert_eq!(pair[0].rank + 1, pair[1].rank);
        }
    }

    #[test]
    fn test_retrieve_score_floor_inclusive() {
        let retriever = angled_retriever();
        // doc-1 sits at 30 degrees: score = cos(30°)
        let boundary = 30.0f32.to_radians().cos();

        let at_floor = retriever.retrieve("query", 4, boundary).unwrap();
        assert_eq!(at_floor.len(), 2);

        let above_floor = retriever
            .retrieve("query", 4, boundary + 1e-4)
            .unwrap();
        assert_eq!(above_floor.len(), 1);
    }

    #[test]
    fn test_retrieve_high_floor_returns_empty_not_error() {
        let retriever = angled_retriever();
        let results = retriever.retrieve("query", 2, 0.9999).unwrap();
        assert_eq!(results.len(), 1); // only the exact match survives

        let none = retriever.retrieve("query", 2, 1.5).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_retrieve_truncates_to_top_k() {
        let retriever = angled_retriever();
        let results = retriever.retrieve("query", 2, -1.0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].rank, 2);
    }

    #[test]
    fn test_retrieve_idempotent() {
        let retriever = angled_retriever();
        let first = retriever.retrieve("query", 3, 0.1).unwrap();
        let second = retriever.retrieve("query", 3, 0.1).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.rank, b.rank);
            assert_eq!(a.score, b.score);
        }
    }

    #[test]
    fn test_retrieve_huge_top_k_does_not_overflow() {
        let retriever = angled_retriever();
        let results = retriever.retrieve("query", usize::MAX, -1.0).unwrap();
        // Candidate count saturates at the over-fetch cap
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_retrieve_invalid_top_k() {
        let retriever = angled_retriever();
        let err = retriever.retrieve("query", 0, 0.5).unwrap_err();
        assert!(matches!(err, RagError::InvalidTopK { top_k: 0 }));
    }

    #[test]
    fn test_retrieve_non_finite_floor_rejected() {
        let retriever = angled_retriever();
        let err = retriever.retrieve("query", 2, f32::NAN).unwrap_err();
        assert!(matches!(err, RagError::InvalidScoreRange { .. }));
    }

    #[test]
    fn test_retrieve_before_load_fails() {
        let embedder = FixedEmbedder::new(2, &[("query", &[1.0, 0.0])]);
        let retriever = Retriever::new(Arc::new(embedder));
        let err = retriever.retrieve("query", 2, 0.5).unwrap_err();
        assert!(matches!(err, RagError::IndexNotLoaded));
    }

    #[test]
    fn test_retrieve_normalizes_query() {
        // The embedder only knows the normalized form; extra whitespace in
        // the raw query must not reach it.
        let retriever = angled_retriever();
        let results = retriever.retrieve("  query \n", 1, 0.0).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_overfetch_capped_at_ten() {
        // 12 near-identical documents; top_k = 5 asks for min(15, 10) = 10
        // candidates, so at most 10 can clear the floor even though all 12
        // would.
        let texts: Vec<String> = (0..12).map(|i| format!("doc-{i}")).collect();
        let vectors: Vec<Vec<f32>> = (0..12).map(|_| vec![1.0, 0.0]).collect();
        let index = VectorIndex::build(texts, vectors).unwrap();
        let embedder = FixedEmbedder::new(2, &[("query", &[1.0, 0.0])]);
        let retriever = Retriever::with_index(Arc::new(embedder), index);

        let results = retriever.retrieve("query", 5, 0.0).unwrap();
        assert_eq!(results.len(), 5);
        // Ties over-fetched in index order: candidates are exactly 0..10
        assert!(results.iter().all(|r| r.index < 10));
    }

    #[test]
    fn test_overfetch_absorbs_floor_losses() {
        // Six documents, only three clear the floor; top_k = 2 over-fetches
        // six candidates, so filtering still leaves enough to fill the set.
        let index = VectorIndex::build(
            (0..6).map(|i| format!("doc-{i}")).collect(),
            vec![
                unit(&[1.0, 0.0]),
                unit(&[1.0, 0.2]),
                unit(&[1.0, 0.4]),
                unit(&[0.0, 1.0]),
                unit(&[-0.2, 1.0]),
                unit(&[-1.0, 0.0]),
            ],
        )
        .unwrap();
        let embedder = FixedEmbedder::new(2, &[("query", &[1.0, 0.0])]);
        let retriever = Retriever::with_index(Arc::new(embedder), index);

        let results = retriever.retrieve("query", 2, 0.8).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.score >= 0.8));
    }

    #[test]
    fn test_floor_starved_result_shorter_than_top_k() {
        let retriever = angled_retriever();
        // Only doc-0 and doc-1 clear cos(45°); top_k asks for 3
        let floor = 45.0f32.to_radians().cos();
        let results = retriever.retrieve("query", 3, floor).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_retrieve_with_configured_defaults() {
        let retriever = angled_retriever();
        let config = crate::config::RetrievalConfig::default();
        let results = retriever.retrieve_with("query", &config).unwrap();
        // defaults: top_k = 2, min_score = 0.5
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.score >= 0.5));
    }

    #[test]
    fn test_batch_retrieve_preserves_order() {
        let index = VectorIndex::build(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let embedder = FixedEmbedder::new(
            2,
            &[("first", &[1.0, 0.0]), ("second", &[0.0, 1.0])],
        );
        let retriever = Retriever::with_index(Arc::new(embedder), index);

        let batches = retriever
            .batch_retrieve(&["first".to_string(), "second".to_string()], 1, 0.5)
            .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].text, "a");
        assert_eq!(batches[1][0].text, "b");
    }

    #[test]
    fn test_batch_retrieve_fail_fast() {
        let retriever = angled_retriever();
        let err = retriever
            .batch_retrieve(&["query".to_string(), "unknown".to_string()], 1, 0.0)
            .unwrap_err();
        assert!(matches!(err, RagError::EmbeddingFailure(_)));
    }

    #[test]
    fn test_install_swaps_index() {
        let retriever = angled_retriever();
        let replacement = VectorIndex::build(
            vec!["only".to_string()],
            vec![vec![1.0, 0.0]],
        )
        .unwrap();
        retriever.install(replacement);

        let results = retriever.retrieve("query", 4, 0.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "only");
    }

    #[test]
    fn test_format_results_rounds_scores() {
        let results = vec![RankedResult {
            rank: 1,
            text: "doc".to_string(),
            score: 0.812_345_6,
            index: 0,
        }];

        let formatted = format_results(&results, false);
        assert_eq!(formatted[0].score, 0.8123);
        assert!(formatted[0].metadata.is_none());

        let with_meta = format_results(&results, true);
        assert_eq!(with_meta[0].metadata, Some(serde_json::json!({ "index": 0 })));
    }
}
