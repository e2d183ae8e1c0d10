//! Recipe ingestion
//!
//! This module turns raw dataset records into immutable [`RecipeDocument`]s
//! and collects them into the [`Corpus`] shared by every index.

use serde::{Deserialize, Serialize};

pub mod loaders;
pub mod normalizer;

// Re-exports for convenience
pub use loaders::*;
pub use normalizer::*;

/// A normalized recipe, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDocument {
    /// Position of the recipe in the corpus
    pub id: usize,
    /// Recipe name
    pub title: String,
    /// Ingredients joined into a single line
    pub ingredients_text: String,
    /// Steps joined into a single string
    pub steps_text: String,
    /// Free-text description, empty when the source has none
    pub description: String,
    /// Link to the original recipe
    pub source_link: Option<String>,
    /// Canonical indexable text
    pub content: String,
}

/// Fields recovered from a document's `content`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFields {
    pub title: String,
    pub ingredients: String,
    pub steps: String,
    pub description: Option<String>,
}

impl RecipeDocument {
    /// Re-extract the labelled fields from a content string.
    ///
    /// Lines that carry no label continue the previous field, so multi-line
    /// steps survive the round trip.
    pub fn parse_content(content: &str) -> ContentFields {
        #[derive(Clone, Copy)]
        enum Label {
            Title,
            Ingredients,
            Steps,
            Description,
        }

        let mut fields = ContentFields::default();
        let mut current = None;

        for line in content.split('\n') {
            if let Some(rest) = line.strip_prefix(TITLE_LABEL) {
                fields.title = rest.to_string();
                current = Some(Label::Title);
            } else if let Some(rest) = line.strip_prefix(INGREDIENTS_LABEL) {
                fields.ingredients = rest.to_string();
                current = Some(Label::Ingredients);
            } else if let Some(rest) = line.strip_prefix(STEPS_LABEL) {
                fields.steps = rest.to_string();
                current = Some(Label::Steps);
            } else if let Some(rest) = line.strip_prefix(DESCRIPTION_LABEL) {
                fields.description = Some(rest.to_string());
                current = Some(Label::Description);
            } else if let Some(label) = current {
                let field = match label {
                    Label::Title => &mut fields.title,
                    Label::Ingredients => &mut fields.ingredients,
                    Label::Steps => &mut fields.steps,
                    Label::Description => fields.description.get_or_insert_with(String::new),
                };
                field.push('\n');
                field.push_str(line);
            }
        }

        fields
    }

    /// Display title, falling back to a generic label
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Source"
        } else {
            &self.title
        }
    }
}

/// Ordered, immutable collection of recipes
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<RecipeDocument>,
}

impl Corpus {
    /// Normalize raw records into a corpus, keeping at most `sample_size`
    pub fn from_records(records: Vec<RawRecipe>, sample_size: Option<usize>) -> Self {
        let limit = sample_size.unwrap_or(usize::MAX);
        let documents = records
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(id, raw)| normalize(id, raw))
            .collect();

        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&RecipeDocument> {
        self.documents.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecipeDocument> {
        self.documents.iter()
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a RecipeDocument;
    type IntoIter = std::slice::Iter<'a, RecipeDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
