//! Embedding backend implementations
//!
//! `token` is an offline hashed bag-of-words embedder; `gemini` calls the
//! Google Generative Language embedding endpoint.

use crate::embedding::{normalize_embedding, Embedder, Embedding, EmbeddingConfig};
use anyhow::Result;
use std::hash::Hasher;
use std::sync::Arc;
use twox_hash::XxHash64;

pub mod gemini;

pub use gemini::GeminiEmbedder;

/// Default dimension for the token embedder
pub const DEFAULT_TOKEN_DIMENSION: usize = 384;

/// Simple token-based embedder (bags of hashed tokens with TF weighting).
/// Needs no model or network, so it doubles as the offline backend.
///
/// Token buckets come from seeded XxHash64, so vectors persisted by one build
/// stay comparable with query vectors from any other.
pub struct TokenEmbedder {
    config: EmbeddingConfig,
    dimension: usize,
}

impl TokenEmbedder {
    /// Create a new token-based embedder
    pub fn new(config: EmbeddingConfig, dimension: usize) -> Self {
        Self {
            config,
            dimension: dimension.max(1),
        }
    }

    /// Generate embeddings based on token hashing
    fn generate_embedding(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0; self.dimension];

        let tokens: Vec<String> = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();

        if tokens.is_empty() {
            return embedding;
        }

        for token in &tokens {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let idx = (hasher.finish() as usize) % self.dimension;
            embedding[idx] += 1.0;
        }

        let total_tokens = tokens.len() as f32;
        for val in embedding.iter_mut() {
            *val /= total_tokens;
        }

        if self.config.normalize {
            normalize_embedding(&mut embedding);
        }

        embedding
    }
}

impl Embedder for TokenEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.generate_embedding(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|&text| self.generate_embedding(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Create an embedder based on backend name
pub fn create_embedder(backend: &str, config: EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match backend {
        "token" => {
            let config = EmbeddingConfig {
                model_name: format!("token-{}", DEFAULT_TOKEN_DIMENSION),
                ..config
            };
            Ok(Arc::new(TokenEmbedder::new(config, DEFAULT_TOKEN_DIMENSION)))
        }
        "gemini" => Ok(Arc::new(GeminiEmbedder::from_env(config)?)),
        _ => anyhow::bail!("Unknown embedding backend: {} (expected token or gemini)", backend),
    }
}
