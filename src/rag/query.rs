//! RAG response types
//!
//! Defines what the assistant hands back to its caller.

use crate::retrieval::RetrievalStage;
use serde::{Deserialize, Serialize};

/// Source recipe reference in a response
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Source {
    /// Recipe title ("Source" when the record had none)
    pub title: String,
    /// Link to the original recipe
    pub link: String,
}

impl Source {
    /// Create a new source reference
    pub fn new(title: &str, link: &str) -> Self {
        Self {
            title: title.to_string(),
            link: link.to_string(),
        }
    }

    /// Markdown list item for this source
    pub fn to_markdown(&self) -> String {
        format!("- [{}]({})", self.title, self.link)
    }
}

/// Response from the recipe assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// Generated answer, with the sources block appended
    pub answer: String,
    /// Linked recipes used as context, sorted and deduplicated
    pub sources: Vec<Source>,
    /// Raw context sent to the LLM (for debugging)
    pub context: String,
    /// Retrieval stage that produced the context
    pub stage: RetrievalStage,
    /// Retrieval time in milliseconds
    pub retrieval_time_ms: u64,
    /// Generation time in milliseconds
    pub generation_time_ms: u64,
}

impl RagResponse {
    /// Get total processing time in milliseconds
    pub fn total_time_ms(&self) -> u64 {
        self.retrieval_time_ms + self.generation_time_ms
    }
}

impl std::fmt::Display for RagResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.answer)?;
        writeln!(
            f,
            "\n[stage={}, retrieval={}ms, generation={}ms, total={}ms]",
            self.stage,
            self.retrieval_time_ms,
            self.generation_time_ms,
            self.total_time_ms()
        )?;
        Ok(())
    }
}
