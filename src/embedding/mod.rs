//! Embedding generation and storage
//!
//! Provides the trait-based embedding interface, the hashed-token and Gemini
//! backends, and the SQLite store that persists document vectors.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod backends;
pub mod store;

// Re-exports
pub use backends::*;
pub use store::*;

/// Represents an embedding vector
pub type Embedding = Vec<f32>;

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model name or path
    pub model_name: String,
    /// Whether to normalize embeddings
    pub normalize: bool,
    /// Batch size for document embedding
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "models/text-embedding-004".to_string(),
            normalize: true,
            batch_size: 64,
        }
    }
}

/// Trait for embedding models
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed multiple texts in batch
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Normalize an embedding vector (L2 normalization)
pub fn normalize_embedding(embedding: &mut Embedding) {
    let norm = l2_norm(embedding);

    if norm > 0.0 {
        for val in embedding.iter_mut() {
            *val /= norm;
        }
    }
}

pub fn l2_norm(embedding: &[f32]) -> f32 {
    embedding.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Calculate cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a > 0.0 && norm_b > 0.0 {
        dot_product / (norm_a * norm_b)
    } else {
        0.0
    }
}
