//! Configuration for text generators
//!
//! Model selection plus the sampling parameters sent with each request.

use serde::{Deserialize, Serialize};

/// Configuration for the answer generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Backend name ("gemini" or "echo")
    pub backend: String,

    /// Gemini model identifier
    pub model_id: String,

    /// Sampling parameters
    pub sampling: SamplingParams,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: "gemini".to_string(),
            model_id: "gemini-1.5-flash".to_string(),
            sampling: SamplingParams::default(),
            timeout_secs: 60,
        }
    }
}

impl GeneratorConfig {
    /// Create a new generator config with the given model ID
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            ..Default::default()
        }
    }

    /// Set the backend
    pub fn with_backend(mut self, backend: &str) -> Self {
        self.backend = backend.to_string();
        self
    }

    /// Set the maximum output tokens
    pub fn with_max_output_tokens(mut self, max_tokens: usize) -> Self {
        self.sampling.max_output_tokens = max_tokens;
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.sampling.temperature = temperature;
        self
    }
}

/// Sampling parameters for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Temperature (higher = more random, lower = more deterministic)
    /// Range: 0.0 to 2.0, default: 0.2
    pub temperature: f32,

    /// Top-p (nucleus sampling), left to the service when unset
    pub top_p: Option<f32>,

    /// Upper bound on generated tokens
    pub max_output_tokens: usize,

    /// Stop sequences - generation stops when any of these are produced
    pub stop_sequences: Vec<String>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: None,
            max_output_tokens: 1024,
            stop_sequences: vec![],
        }
    }
}
