//! Classified failures of the assistant.
//!
//! Most of the crate returns `anyhow::Result`; these variants are wrapped in
//! `anyhow::Error` where a caller needs to know which collaborator failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// No loading strategy produced a corpus
    #[error("recipe dataset unavailable: {0}")]
    DataSource(String),

    /// The external embedding service failed
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The external generative model failed
    #[error("generation service error: {0}")]
    GenerationService(String),

    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_downcast_through_anyhow() {
        let err: anyhow::Error = RagError::DataSource("no file".into()).into();
        let err = err.context("Failed to build corpus");

        let root = err.downcast_ref::<RagError>();
        assert!(matches!(root, Some(RagError::DataSource(_))));
    }
}
