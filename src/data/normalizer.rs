//! Raw record normalization
//!
//! Upstream recipe records are loosely shaped: any field may be missing, and
//! ingredients/steps arrive either as one string or as a list of strings.
//! Everything downstream only sees the strict [`RecipeDocument`].

use crate::data::RecipeDocument;
use serde::{Deserialize, Serialize};

pub const TITLE_LABEL: &str = "Title: ";
pub const INGREDIENTS_LABEL: &str = "Ingredients: ";
pub const STEPS_LABEL: &str = "Steps: ";
pub const DESCRIPTION_LABEL: &str = "Description: ";

/// Delimiter for list-valued ingredients
pub const INGREDIENT_DELIMITER: &str = ", ";
/// Delimiter for list-valued steps
pub const STEP_DELIMITER: &str = "\n";

/// A field that is either a single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    /// Flatten into one trimmed string, dropping blank list items
    pub fn join(&self, delimiter: &str) -> String {
        match self {
            TextOrList::Text(text) => text.trim().to_string(),
            TextOrList::List(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(delimiter),
        }
    }
}

impl From<&str> for TextOrList {
    fn from(text: &str) -> Self {
        TextOrList::Text(text.to_string())
    }
}

impl From<Vec<&str>> for TextOrList {
    fn from(items: Vec<&str>) -> Self {
        TextOrList::List(items.into_iter().map(str::to_string).collect())
    }
}

/// A recipe record as it appears in the upstream dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecipe {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ingredients: Option<TextOrList>,
    #[serde(default)]
    pub steps: Option<TextOrList>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Build the canonical content string.
///
/// The field order is part of the lexical scoring contract and must not change
/// within a deployment.
pub fn format_content(title: &str, ingredients: &str, steps: &str, description: &str) -> String {
    let mut content = format!(
        "{TITLE_LABEL}{title}\n{INGREDIENTS_LABEL}{ingredients}\n{STEPS_LABEL}{steps}"
    );
    if !description.is_empty() {
        content.push('\n');
        content.push_str(DESCRIPTION_LABEL);
        content.push_str(description);
    }
    content
}

/// Convert one raw record into a [`RecipeDocument`]. Never fails.
pub fn normalize(id: usize, raw: RawRecipe) -> RecipeDocument {
    let title = trimmed(raw.name.as_deref());
    let ingredients_text = raw
        .ingredients
        .as_ref()
        .map(|v| v.join(INGREDIENT_DELIMITER))
        .unwrap_or_default();
    let steps_text = raw
        .steps
        .as_ref()
        .map(|v| v.join(STEP_DELIMITER))
        .unwrap_or_default();
    let description = trimmed(raw.description.as_deref());
    let source_link = Some(trimmed(raw.link.as_deref())).filter(|link| !link.is_empty());

    let content = format_content(&title, &ingredients_text, &steps_text, &description);

    RecipeDocument {
        id,
        title,
        ingredients_text,
        steps_text,
        description,
        source_link,
        content,
    }
}
