//! Generator module for text generation
//!
//! Trait-based abstraction over the answer-writing language model. The
//! Gemini backend calls the hosted API; the echo backend is offline.

pub mod config;
pub mod gemini;

pub use config::{GeneratorConfig, SamplingParams};
pub use gemini::GeminiGenerator;

use anyhow::Result;
use std::sync::Arc;

/// Trait for text generation models
pub trait Generator: Send + Sync {
    /// Generate a response given a prompt
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Offline generator that answers with the retrieved context.
///
/// Lets the CLI run without an API key.
pub struct EchoGenerator;

impl Generator for EchoGenerator {
    fn generate(&self, prompt: &str, _params: &SamplingParams) -> Result<String> {
        Ok(prompt.to_string())
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Factory function for creating generators
pub fn create_generator(config: GeneratorConfig) -> Result<Arc<dyn Generator>> {
    match config.backend.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::from_env(config)?)),
        "echo" => Ok(Arc::new(EchoGenerator)),
        other => anyhow::bail!("Unknown generator backend: {} (expected gemini or echo)", other),
    }
}
