//! Hybrid retrieval
//!
//! Weighted Reciprocal Rank Fusion of the dense and lexical retrievers.

use crate::retrieval::{assign_ranks, clamp_top_k, Retriever, SearchResult};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Default dense contribution
pub const DEFAULT_DENSE_WEIGHT: f32 = 0.6;
/// Default lexical contribution
pub const DEFAULT_LEXICAL_WEIGHT: f32 = 0.4;
/// Standard RRF constant
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Minimum lexical candidate pool
const MIN_LEXICAL_FETCH: usize = 6;

/// Hybrid retriever combining a dense and a lexical retriever with weighted RRF
pub struct HybridRetriever {
    dense: Arc<dyn Retriever>,
    lexical: Arc<dyn Retriever>,
    dense_weight: f32,
    lexical_weight: f32,
    /// RRF constant (typically 60)
    rrf_k: f32,
    /// Number of documents behind both retrievers
    corpus_size: usize,
}

/// Accumulated fusion state for one document
struct Fused {
    result: SearchResult,
    score: f32,
    first_seen: usize,
}

impl HybridRetriever {
    /// Create a new hybrid retriever with the default 0.6/0.4 weighting
    pub fn new(dense: Arc<dyn Retriever>, lexical: Arc<dyn Retriever>, corpus_size: usize) -> Self {
        Self {
            dense,
            lexical,
            dense_weight: DEFAULT_DENSE_WEIGHT,
            lexical_weight: DEFAULT_LEXICAL_WEIGHT,
            rrf_k: DEFAULT_RRF_K,
            corpus_size,
        }
    }

    /// Set the dense and lexical weights
    pub fn with_weights(mut self, dense_weight: f32, lexical_weight: f32) -> Self {
        self.dense_weight = dense_weight;
        self.lexical_weight = lexical_weight;
        self
    }

    /// Set the RRF constant
    pub fn with_rrf_k(mut self, rrf_k: f32) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    /// Run one sub-retriever; a failure counts as an empty list
    fn fetch(retriever: &dyn Retriever, query: &str, fetch_k: usize) -> Vec<SearchResult> {
        match retriever.retrieve(query, fetch_k) {
            Ok(results) => {
                tracing::debug!(
                    "Retriever '{}' returned {} results",
                    retriever.name(),
                    results.len()
                );
                results
            }
            Err(e) => {
                tracing::warn!("Retriever '{}' failed, ignoring it: {:#}", retriever.name(), e);
                Vec::new()
            }
        }
    }

    /// Apply weighted Reciprocal Rank Fusion
    ///
    /// score(d) = Σ weight_i / (k + rank_i(d)). Ties keep the order in which
    /// documents were first seen across the lists, in list order.
    fn reciprocal_rank_fusion(&self, results_lists: Vec<(f32, Vec<SearchResult>)>) -> Vec<SearchResult> {
        let mut fused: HashMap<usize, Fused> = HashMap::new();
        let mut seen = 0;

        for (weight, results) in results_lists {
            for (idx, result) in results.into_iter().enumerate() {
                // Recompute rank from position so sub-retriever ranks don't have to be trusted
                let contribution = weight / (self.rrf_k + (idx + 1) as f32);

                fused
                    .entry(result.doc_id)
                    .and_modify(|entry| entry.score += contribution)
                    .or_insert_with(|| {
                        seen += 1;
                        Fused {
                            result,
                            score: contribution,
                            first_seen: seen,
                        }
                    });
            }
        }

        let mut final_results: Vec<Fused> = fused.into_values().collect();
        final_results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.first_seen.cmp(&b.first_seen))
        });

        final_results
            .into_iter()
            .map(|entry| {
                let mut result = entry.result;
                result.score = entry.score;
                result
            })
            .collect()
    }
}

impl Retriever for HybridRetriever {
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let limit = clamp_top_k(top_k, self.corpus_size);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let lexical_k = (2 * limit).max(MIN_LEXICAL_FETCH).min(self.corpus_size);

        let dense_results = Self::fetch(self.dense.as_ref(), query, limit);
        let lexical_results = Self::fetch(self.lexical.as_ref(), query, lexical_k);

        let mut fused_results = self.reciprocal_rank_fusion(vec![
            (self.dense_weight, dense_results),
            (self.lexical_weight, lexical_results),
        ]);

        fused_results.truncate(limit);
        assign_ranks(&mut fused_results);

        Ok(fused_results)
    }

    fn name(&self) -> &str {
        "hybrid"
    }
}
