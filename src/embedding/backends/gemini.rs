//! Gemini embedding backend
//!
//! Calls `embedContent` / `batchEmbedContents` on the Google Generative
//! Language API. Any transport or API failure surfaces as
//! [`RagError::EmbeddingService`].

use crate::embedding::{normalize_embedding, Embedder, Embedding, EmbeddingConfig};
use crate::error::RagError;
use crate::utils::{api_key_from_env, transport_error, GEMINI_API_BASE, GEMINI_API_KEY_HEADER};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// text-embedding-004 output size
const GEMINI_EMBEDDING_DIMENSION: usize = 768;

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<ContentEmbedding>,
}

/// Embedder backed by the Gemini embedding endpoint
pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    config: EmbeddingConfig,
}

impl GeminiEmbedder {
    pub fn new(api_key: String, config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RagError::EmbeddingService(transport_error(e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            config,
        })
    }

    /// Point the client at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create an embedder using the key from `GOOGLE_API_KEY`
    pub fn from_env(config: EmbeddingConfig) -> Result<Self> {
        Self::new(api_key_from_env()?, config)
    }

    fn model_path(&self) -> String {
        if self.config.model_name.starts_with("models/") {
            self.config.model_name.clone()
        } else {
            format!("models/{}", self.config.model_name)
        }
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, method: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}:{}", self.base_url, self.model_path(), method);

        let response = self
            .client
            .post(&url)
            .header(GEMINI_API_KEY_HEADER, self.api_key.as_str())
            .json(body)
            .send()
            .map_err(|e| RagError::EmbeddingService(transport_error(e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(RagError::EmbeddingService(format!("HTTP {}: {}", status, detail)).into());
        }

        Ok(response
            .json::<R>()
            .map_err(|e| RagError::EmbeddingService(format!("invalid response: {}", transport_error(e))))?)
    }

    fn finish(&self, mut embedding: Embedding) -> Embedding {
        if self.config.normalize {
            normalize_embedding(&mut embedding);
        }
        embedding
    }
}

impl Embedder for GeminiEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let model = self.model_path();
        let request = EmbedRequest {
            model: &model,
            content: Content {
                parts: [Part { text }],
            },
        };

        let response: EmbedResponse = self.post("embedContent", &request)?;
        Ok(self.finish(response.embedding.values))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let model = self.model_path();
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.batch_size.max(1)) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|&text| EmbedRequest {
                        model: &model,
                        content: Content {
                            parts: [Part { text }],
                        },
                    })
                    .collect(),
            };

            let response: BatchEmbedResponse = self.post("batchEmbedContents", &request)?;
            if response.embeddings.len() != batch.len() {
                return Err(RagError::EmbeddingService(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                ))
                .into());
            }

            embeddings.extend(response.embeddings.into_iter().map(|e| self.finish(e.values)));
            tracing::debug!("Embedded {}/{} documents", embeddings.len(), texts.len());
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        GEMINI_EMBEDDING_DIMENSION
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
