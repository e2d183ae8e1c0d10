//! RAG (Retrieval-Augmented Generation) Pipeline
//!
//! Answers recipe questions from the indexed corpus.
//!
//! # Architecture
//!
//! ```text
//! User Query
//!     │
//!     ▼
//! ┌─────────────┐
//! │  Fallback   │  ← expanded query → hybrid fusion (dense + BM25),
//! │  Cascade    │    widened query, then substring scan
//! └─────────────┘
//!     │
//!     ▼ RecipeDocuments
//! ┌─────────────┐
//! │   Context   │  ← Formats retrieved recipes into prompt + sources
//! │   Builder   │
//! └─────────────┘
//!     │
//!     ▼ Formatted Prompt
//! ┌─────────────┐
//! │  Generator  │  ← Gemini
//! └─────────────┘
//!     │
//!     ▼
//! RagResponse (answer + sources)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use recipe_rag::rag::{RagConfig, RecipeAssistant};
//!
//! let assistant = RecipeAssistant::get_or_init(RagConfig::default())?;
//! let response = assistant.ask("tavuk, biber, domates ile ne yapabilirim?");
//!
//! println!("{}", response.answer);
//! ```

pub mod context;
pub mod generator;
pub mod pipeline;
pub mod query;

// Re-exports for convenience
pub use context::{ContextBuilder, Synthesis};
pub use generator::{create_generator, EchoGenerator, GeminiGenerator, Generator, GeneratorConfig, SamplingParams};
pub use pipeline::{RagConfig, RecipeAssistant};
pub use query::{RagResponse, Source};
