//! Context builder for RAG prompts
//!
//! Turns the retrieved recipes into the context block and source list,
//! and post-processes the generated answer.

use crate::data::RecipeDocument;
use crate::rag::query::Source;
use anyhow::Result;
use std::collections::BTreeSet;

use super::templates::{PromptTemplates, DEFAULT_TEMPLATE};

/// Generation request and sources for one query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    /// Filled prompt template
    pub prompt: String,
    /// Document contents separated by a blank line
    pub context: String,
    /// Linked documents, deduplicated and sorted
    pub sources: Vec<Source>,
}

/// Builds context from retrieved documents for LLM prompts
pub struct ContextBuilder {
    templates: PromptTemplates,
    template_name: String,
}

impl ContextBuilder {
    /// Create a new context builder with default templates
    pub fn new() -> Self {
        Self {
            templates: PromptTemplates::default(),
            template_name: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Create a context builder with custom templates
    pub fn with_templates(templates: PromptTemplates, template_name: &str) -> Self {
        if !templates.contains(template_name) {
            tracing::warn!("Unknown prompt template '{}', using '{}'", template_name, DEFAULT_TEMPLATE);
        }
        Self {
            templates,
            template_name: template_name.to_string(),
        }
    }

    /// Build the prompt, context block and source list, keeping the received order
    pub fn synthesize(&self, query: &str, documents: &[RecipeDocument]) -> Synthesis {
        let context = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let sources: BTreeSet<Source> = documents
            .iter()
            .filter_map(|d| {
                let link = d.source_link.as_deref()?;
                Some(Source::new(d.display_title(), link))
            })
            .collect();

        Synthesis {
            prompt: self.format_prompt(query, &context),
            context,
            sources: sources.into_iter().collect(),
        }
    }

    /// Fill the configured template. Placeholders are substituted in one
    /// pass, so braces inside the query or recipe text are left alone.
    pub fn format_prompt(&self, query: &str, context: &str) -> String {
        let template = self.templates.get(&self.template_name);
        let mut prompt = String::with_capacity(template.len() + query.len() + context.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            prompt.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{query}") {
                prompt.push_str(query);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{context}") {
                prompt.push_str(context);
                rest = after;
            } else {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
        prompt.push_str(rest);

        prompt
    }

    /// Produce the final answer text.
    ///
    /// A failed generation is replaced by a visible error line; sources are
    /// appended either way.
    pub fn finish(&self, answer: Result<String>, sources: &[Source]) -> String {
        let mut text = match answer {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::warn!("Answer generation failed: {:#}", e);
                format!("⚠️ Answer generation failed: {}", e)
            }
        };

        if !sources.is_empty() {
            let list: Vec<String> = sources.iter().map(Source::to_markdown).collect();
            text.push_str("\n\n**Sources:**\n");
            text.push_str(&list.join("\n"));
        }

        text
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
