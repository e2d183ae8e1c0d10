//! Prompt templates for recipe answers
//!
//! Templates use `{query}` and `{context}` placeholders.

use std::collections::HashMap;

/// Name of the template used when none is configured
pub const DEFAULT_TEMPLATE: &str = "recipe";

/// Prompt templates keyed by name
pub struct PromptTemplates {
    templates: HashMap<String, String>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        let mut templates = HashMap::new();

        templates.insert(
            DEFAULT_TEMPLATE.to_string(),
            concat!(
                "You are a recipe assistant. Using the user's question and the recipe excerpts below, ",
                "write a short, clear and practical answer. Include an ingredient list and step-by-step ",
                "instructions when useful. Answer in the language of the question and do not mention ",
                "recipes that don't fit.\n\n",
                "# Question\n{query}\n\n",
                "# Relevant Recipes\n{context}\n"
            )
            .to_string(),
        );

        // Turkish variant
        templates.insert(
            "recipe_tr".to_string(),
            concat!(
                "Sen bir tarif asistanısın. Kullanıcının sorusunu ve aşağıdaki tarif içeriklerini ",
                "kullanarak kısa, net ve uygulanabilir bir yanıt üret. Gerekirse malzeme listesi ve ",
                "adım adım talimat ver. Yanıtın Türkçe olsun.\n\n",
                "# Kullanıcı Sorusu\n{query}\n\n",
                "# İlgili Tarif İçerikleri\n{context}\n"
            )
            .to_string(),
        );

        Self { templates }
    }
}

impl PromptTemplates {
    /// Get a template by name, falling back to the recipe template
    pub fn get(&self, name: &str) -> &str {
        self.templates
            .get(name)
            .or_else(|| self.templates.get(DEFAULT_TEMPLATE))
            .map(|s| s.as_str())
            .unwrap_or("{query}\n\n{context}")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}
