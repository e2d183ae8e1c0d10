//! Query normalization and bilingual synonym expansion
//!
//! Queries arrive in Turkish or English. Each token is widened with its
//! equivalents from a static food-term table so both retrievers see both
//! languages.

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};

/// Characters treated as token separators
const SEPARATORS: [char; 6] = [',', ';', '/', '+', '|', '&'];

/// Conjunctions that only join ingredients ("domates ve biber", "rice and beans")
const CONJUNCTIONS: [&str; 2] = ["ve", "and"];

/// Groups of interchangeable terms. Every member expands to the whole group.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["domates", "tomato", "tomatoes"],
    &["tavuk", "chicken"],
    &["biber", "pepper", "peppers"],
    &["soğan", "sogan", "onion", "onions"],
    &["sarımsak", "sarimsak", "garlic"],
    &["patates", "potato", "potatoes"],
    &["patlıcan", "patlican", "eggplant", "aubergine"],
    &["kabak", "zucchini", "courgette"],
    &["havuç", "havuc", "carrot", "carrots"],
    &["pirinç", "pirinc", "rice"],
    &["mercimek", "lentil", "lentils"],
    &["nohut", "chickpea", "chickpeas"],
    &["fasulye", "bean", "beans"],
    &["yumurta", "egg", "eggs"],
    &["süt", "sut", "milk"],
    &["yoğurt", "yogurt", "yoghurt"],
    &["peynir", "cheese"],
    &["tereyağı", "tereyagi", "butter"],
    &["un", "flour"],
    &["şeker", "seker", "sugar"],
    &["tuz", "salt"],
    &["et", "meat"],
    &["dana", "beef"],
    &["kuzu", "lamb"],
    &["kıyma", "kiyma", "mince"],
    &["balık", "balik", "fish"],
    &["makarna", "pasta"],
    &["ekmek", "bread"],
    &["limon", "lemon"],
    &["elma", "apple", "apples"],
    &["ıspanak", "ispanak", "spinach"],
    &["mantar", "mushroom", "mushrooms"],
    &["çorba", "corba", "soup"],
    &["salata", "salad"],
    &["tatlı", "tatli", "dessert"],
    &["kek", "cake"],
    &["tarif", "recipe"],
    &["malzeme", "ingredient", "ingredients"],
];

static DEFAULT_TABLE: Lazy<SynonymTable> = Lazy::new(|| SynonymTable::from_groups(SYNONYM_GROUPS));

/// Bidirectional term → equivalents mapping with case-insensitive lookup
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: HashMap<String, BTreeSet<String>>,
}

impl SynonymTable {
    /// Build a table where each term maps to the other members of its group
    pub fn from_groups(groups: &[&[&str]]) -> Self {
        let mut entries: HashMap<String, BTreeSet<String>> = HashMap::new();

        for group in groups {
            let members: Vec<String> = group.iter().map(|term| term.to_lowercase()).collect();
            for term in &members {
                let synonyms = entries.entry(term.clone()).or_default();
                synonyms.extend(members.iter().filter(|other| *other != term).cloned());
            }
        }

        Self { entries }
    }

    /// The built-in Turkish/English food table
    pub fn global() -> &'static SynonymTable {
        &DEFAULT_TABLE
    }

    /// Synonyms of `term`, if it is in the table
    pub fn lookup(&self, term: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(&term.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a free-text query into lower-case tokens
pub fn tokenize(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase().replace(&SEPARATORS[..], " ");

    lowered
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty() && !CONJUNCTIONS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Expand a query with the built-in synonym table
pub fn expand(query: &str) -> String {
    expand_with(query, SynonymTable::global())
}

/// Expand a query: tokens plus all their synonyms, sorted and deduplicated
pub fn expand_with(query: &str, table: &SynonymTable) -> String {
    let mut terms = BTreeSet::new();

    for token in tokenize(query) {
        if let Some(synonyms) = table.lookup(&token) {
            terms.extend(synonyms.iter().cloned());
        }
        terms.insert(token);
    }

    terms.into_iter().collect::<Vec<_>>().join(" ")
}
