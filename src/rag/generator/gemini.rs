//! Gemini text generation backend
//!
//! Calls `generateContent` on the Google Generative Language API. Failures
//! surface as [`RagError::GenerationService`].

use super::{Generator, GeneratorConfig, SamplingParams};
use crate::error::RagError;
use crate::utils::{api_key_from_env, transport_error, GEMINI_API_BASE, GEMINI_API_KEY_HEADER};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig<'a>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Text of the first candidate
    fn into_text(self) -> Result<String> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| RagError::GenerationService("response has no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(RagError::GenerationService(format!("empty answer (finish reason: {})", reason)).into());
        }

        Ok(text)
    }
}

/// Generator backed by a Gemini chat model
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    config: GeneratorConfig,
}

impl GeminiGenerator {
    pub fn new(api_key: String, config: GeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::GenerationService(transport_error(e)))?;

        tracing::info!("Using Gemini generator: {}", config.model_id);

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

    /// Create a generator using the key from `GOOGLE_API_KEY`
    pub fn from_env(config: GeneratorConfig) -> Result<Self> {
        Self::new(api_key_from_env()?, config)
    }

    fn endpoint(&self) -> String {
        let model = self.config.model_id.trim_start_matches("models/");
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

impl Generator for GeminiGenerator {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_output_tokens: params.max_output_tokens,
                stop_sequences: (!params.stop_sequences.is_empty()).then_some(params.stop_sequences.as_slice()),
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(GEMINI_API_KEY_HEADER, self.api_key.as_str())
            .json(&request)
            .send()
            .map_err(|e| RagError::GenerationService(transport_error(e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(RagError::GenerationService(format!("HTTP {}: {}", status, detail)).into());
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| RagError::GenerationService(format!("invalid response: {}", transport_error(e))))?;

        body.into_text()
    }

    fn model_name(&self) -> &str {
        &self.config.model_id
    }
}
