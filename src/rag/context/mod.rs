//! Context building for RAG prompts
//!
//! Assembles retrieved recipes into the prompt context and formats the
//! final answer with its sources.

mod builder;
mod templates;

pub use builder::{ContextBuilder, Synthesis};
pub use templates::{PromptTemplates, DEFAULT_TEMPLATE};
