//! # recipe-rag
//!
//! A retrieval-augmented recipe assistant.
//!
//! ## Overview
//!
//! Given a free-text query describing available ingredients or a desired dish,
//! the assistant retrieves relevant recipes from an indexed corpus and asks a
//! language model for a concise answer grounded in them, with source links.
//!
//! - Recipe ingestion and normalization
//! - Bilingual (Turkish/English) query synonym expansion
//! - Dense and sparse retrieval (HNSW + BM25)
//! - Weighted rank fusion with a staged fallback cascade
//! - Grounded answer synthesis with source attribution
//!
//! ## Architecture
//!
//! - `data` - Recipe records, normalization and dataset loading
//! - `embedding` - Embedding backends and the persisted vector store
//! - `retrieval` - Dense, sparse, hybrid retrieval, expansion and fallback
//! - `rag` - Context building, generation and the assistant pipeline
//! - `cli` - Command-line interface
//! - `utils` - Common utilities

pub mod cli;
pub mod data;
pub mod embedding;
pub mod error;
pub mod rag;
pub mod retrieval;
pub mod utils;

// Re-export commonly used types
pub use anyhow::{Error, Result};
pub use error::RagError;
