//! Retrieval engines
//!
//! Implements dense (HNSW), sparse (BM25), and hybrid retrieval, plus the
//! query expansion and fallback stages that wrap them.

use crate::data::RecipeDocument;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod dense;
pub mod expansion;
pub mod fallback;
pub mod hybrid;
pub mod sparse;

// Re-exports
pub use dense::*;
pub use expansion::*;
pub use fallback::*;
pub use hybrid::*;
pub use sparse::*;

/// Search result with document and relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document ID (corpus position)
    pub doc_id: usize,
    /// The matched recipe
    pub document: RecipeDocument,
    /// Relevance score (higher is better)
    pub score: f32,
    /// Rank in the result list (1-indexed)
    pub rank: usize,
}

/// Index metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Model name used for embeddings
    pub model_name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Number of documents indexed
    pub num_documents: usize,
    /// Index creation timestamp
    pub created_at: String,
}

/// Trait for retrieval engines
pub trait Retriever: Send + Sync {
    /// Retrieve the top-k most relevant documents for a query.
    ///
    /// `top_k` is clamped by the implementation; out-of-range values never fail.
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>>;

    /// Get the name of this retriever
    fn name(&self) -> &str;
}

/// Clamp a requested result count to `[1, available]`; 0 when nothing is available
pub fn clamp_top_k(requested: usize, available: usize) -> usize {
    requested.max(1).min(available)
}

/// Assign 1-indexed ranks in list order
pub(crate) fn assign_ranks(results: &mut [SearchResult]) {
    for (idx, result) in results.iter_mut().enumerate() {
        result.rank = idx + 1;
    }
}
