//! Staged retrieval fallback
//!
//! Fusion over the expanded query, then over the expanded query widened with
//! generic recipe terms, then a plain substring scan of the corpus. Each
//! stage only runs while the accumulated result is under-filled.

use crate::data::{Corpus, RecipeDocument};
use crate::retrieval::{expand, tokenize, Retriever};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Fallback cascade settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Stop once this many documents are collected
    pub min_results: usize,
    /// Generic terms appended to the expanded query in the second stage
    pub generic_suffix: String,
    /// Leading query tokens that must all appear in a scanned document
    pub required_tokens: usize,
    /// Maximum matches collected by the substring scan
    pub scan_limit: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            min_results: 1,
            generic_suffix: "recipe ingredients steps tarif malzeme".to_string(),
            required_tokens: 2,
            scan_limit: 5,
        }
    }
}

/// The stage that last contributed documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStage {
    /// Fusion over the synonym-expanded query
    Expanded,
    /// Fusion over the expanded query plus generic recipe terms
    Widened,
    /// Substring scan over the raw query tokens
    SubstringScan,
    /// Every stage came back empty
    Exhausted,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetrievalStage::Expanded => "expanded",
            RetrievalStage::Widened => "widened",
            RetrievalStage::SubstringScan => "substring-scan",
            RetrievalStage::Exhausted => "exhausted",
        };
        write!(f, "{}", name)
    }
}

/// Documents produced by the cascade
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub documents: Vec<RecipeDocument>,
    pub stage: RetrievalStage,
}

impl FallbackOutcome {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Runs the fused retriever and, when it comes back short, the relaxed stages
pub struct FallbackCascade {
    fused: Arc<dyn Retriever>,
    corpus: Arc<Corpus>,
    config: FallbackConfig,
}

impl FallbackCascade {
    pub fn new(fused: Arc<dyn Retriever>, corpus: Arc<Corpus>, config: FallbackConfig) -> Self {
        Self {
            fused,
            corpus,
            config,
        }
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Retrieve up to `top_k` documents for a raw user query. Never fails;
    /// exhausting every stage yields an empty outcome.
    pub fn retrieve_with_fallback(&self, raw_query: &str, top_k: usize) -> FallbackOutcome {
        let mut collected = Collected::with_capacity(top_k.max(1));
        let mut stage = RetrievalStage::Exhausted;

        let expanded = expand(raw_query);
        if expanded.is_empty() {
            tracing::debug!("Query {:?} has no terms, skipping fusion stages", raw_query);
        } else {
            let widened = format!("{} {}", expanded, self.config.generic_suffix);
            let fusion_stages = [
                (RetrievalStage::Expanded, expanded.as_str()),
                (RetrievalStage::Widened, widened.as_str()),
            ];

            for (fusion_stage, query) in fusion_stages {
                if collected.is_satisfied(self.config.min_results) {
                    break;
                }
                if collected.extend(self.fuse(query, top_k)) > 0 {
                    stage = fusion_stage;
                }
                tracing::debug!("Stage {}: {} documents collected", fusion_stage, collected.len());
            }
        }

        if !collected.is_satisfied(self.config.min_results) {
            let matches = substring_scan(
                &self.corpus,
                raw_query,
                self.config.required_tokens,
                self.config.scan_limit,
            );
            if collected.extend(matches) > 0 {
                stage = RetrievalStage::SubstringScan;
            }
            tracing::debug!(
                "Stage {}: {} documents collected",
                RetrievalStage::SubstringScan,
                collected.len()
            );
        }

        FallbackOutcome {
            documents: collected.documents,
            stage,
        }
    }

    fn fuse(&self, query: &str, top_k: usize) -> Vec<RecipeDocument> {
        match self.fused.retrieve(query, top_k) {
            Ok(results) => results.into_iter().map(|r| r.document).collect(),
            Err(e) => {
                tracing::warn!("Retriever '{}' failed: {:#}", self.fused.name(), e);
                Vec::new()
            }
        }
    }
}

/// Documents in arrival order, without duplicates, at most `capacity` of them
struct Collected {
    documents: Vec<RecipeDocument>,
    seen: HashSet<usize>,
    capacity: usize,
}

impl Collected {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            documents: Vec::new(),
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Append unseen documents until full, returning how many were added
    fn extend(&mut self, documents: Vec<RecipeDocument>) -> usize {
        let before = self.documents.len();
        for document in documents {
            if self.documents.len() >= self.capacity {
                break;
            }
            if self.seen.insert(document.id) {
                self.documents.push(document);
            }
        }
        self.documents.len() - before
    }

    /// Enough documents collected, or no room for more
    fn is_satisfied(&self, min_results: usize) -> bool {
        self.documents.len() >= min_results.min(self.capacity)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Scan the corpus for documents containing the raw query tokens.
///
/// A single-token query needs that token; longer queries need their first
/// `required_tokens` tokens. Matches are returned in corpus order.
pub fn substring_scan(
    corpus: &Corpus,
    raw_query: &str,
    required_tokens: usize,
    limit: usize,
) -> Vec<RecipeDocument> {
    let tokens = tokenize(raw_query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let required = &tokens[..required_tokens.max(1).min(tokens.len())];

    corpus
        .iter()
        .filter(|document| {
            let content = document.content.to_lowercase();
            required.iter().all(|token| content.contains(token.as_str()))
        })
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawRecipe;
    use crate::retrieval::SearchResult;
    use std::sync::Mutex;

    /// Answers with the first scripted entry whose key occurs in the query
    struct ScriptedRetriever {
        corpus: Arc<Corpus>,
        answers: Vec<(&'static str, Vec<usize>)>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedRetriever {
        fn new(corpus: Arc<Corpus>, answers: Vec<(&'static str, Vec<usize>)>) -> Self {
            Self {
                corpus,
                answers,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl Retriever for ScriptedRetriever {
        fn retrieve(&self, query: &str, top_k: usize) -> anyhow::Result<Vec<SearchResult>> {
            self.queries.lock().unwrap().push(query.to_string());

            let ids = self
                .answers
                .iter()
                .find(|(needle, _)| query.contains(needle))
                .map(|(_, ids)| ids.clone())
                .unwrap_or_default();

            Ok(ids
                .into_iter()
                .take(top_k)
                .enumerate()
                .map(|(idx, doc_id)| SearchResult {
                    doc_id,
                    document: self.corpus.get(doc_id).unwrap().clone(),
                    score: 1.0,
                    rank: idx + 1,
                })
                .collect())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn corpus() -> Arc<Corpus> {
        let records = [
            ("Tomato Soup", "tomato, onion"),
            ("Chicken Pilaf", "chicken, rice"),
            ("Stuffed Peppers", "pepper, rice, tomato"),
        ]
        .iter()
        .map(|(name, ingredients)| RawRecipe {
            name: Some(name.to_string()),
            ingredients: Some((*ingredients).into()),
            ..Default::default()
        })
        .collect();
        Arc::new(Corpus::from_records(records, None))
    }

    fn titles(outcome: &FallbackOutcome) -> Vec<&str> {
        outcome.documents.iter().map(|d| d.title.as_str()).collect()
    }

    #[test]
    fn test_first_stage_hit_stops_cascade() {
        let corpus = corpus();
        let fused = Arc::new(ScriptedRetriever::new(corpus.clone(), vec![("chicken", vec![1])]));
        let cascade = FallbackCascade::new(fused.clone(), corpus, FallbackConfig::default());

        let outcome = cascade.retrieve_with_fallback("tavuk", 4);

        assert_eq!(titles(&outcome), vec!["Chicken Pilaf"]);
        assert_eq!(outcome.stage, RetrievalStage::Expanded);
        assert_eq!(fused.queries(), vec!["chicken tavuk"]);
    }

    #[test]
    fn test_widened_stage_appends_generic_terms() {
        let corpus = corpus();
        let fused = Arc::new(ScriptedRetriever::new(
            corpus.clone(),
            vec![("kinoa recipe", vec![2])],
        ));
        let cascade = FallbackCascade::new(fused.clone(), corpus, FallbackConfig::default());

        let outcome = cascade.retrieve_with_fallback("kinoa", 4);

        assert_eq!(outcome.stage, RetrievalStage::Widened);
        assert_eq!(titles(&outcome), vec!["Stuffed Peppers"]);
        assert_eq!(
            fused.queries(),
            vec!["kinoa", "kinoa recipe ingredients steps tarif malzeme"]
        );
    }

    #[test]
    fn test_substring_scan_stage() {
        let corpus = corpus();
        let fused = Arc::new(ScriptedRetriever::new(corpus.clone(), vec![]));
        let cascade = FallbackCascade::new(fused, corpus, FallbackConfig::default());

        let outcome = cascade.retrieve_with_fallback("Rice, TOMATO and onion", 4);

        assert_eq!(outcome.stage, RetrievalStage::SubstringScan);
        assert_eq!(titles(&outcome), vec!["Stuffed Peppers"]);
    }

    #[test]
    fn test_exhausted_is_not_an_error() {
        let corpus = corpus();
        let fused = Arc::new(ScriptedRetriever::new(corpus.clone(), vec![]));
        let cascade = FallbackCascade::new(fused, corpus, FallbackConfig::default());

        let outcome = cascade.retrieve_with_fallback("kinoa", 4);
        assert!(outcome.is_empty());
        assert_eq!(outcome.stage, RetrievalStage::Exhausted);
    }

    #[test]
    fn test_empty_query_skips_fusion() {
        let corpus = corpus();
        let fused = Arc::new(ScriptedRetriever::new(corpus.clone(), vec![("", vec![0])]));
        let cascade = FallbackCascade::new(fused.clone(), corpus, FallbackConfig::default());

        let outcome = cascade.retrieve_with_fallback(" ?, ve ", 4);
        assert!(outcome.is_empty());
        assert!(fused.queries().is_empty());
    }

    #[test]
    fn test_min_results_fills_without_duplicates() {
        let corpus = corpus();
        let fused = Arc::new(ScriptedRetriever::new(
            corpus.clone(),
            vec![("recipe", vec![1, 2]), ("rice", vec![2])],
        ));
        let config = FallbackConfig {
            min_results: 3,
            ..Default::default()
        };
        let cascade = FallbackCascade::new(fused, corpus, config);

        let outcome = cascade.retrieve_with_fallback("rice", 4);

        assert_eq!(titles(&outcome), vec!["Stuffed Peppers", "Chicken Pilaf"]);
        assert_eq!(outcome.stage, RetrievalStage::Widened);
    }

    #[test]
    fn test_substring_scan_rules() {
        let corpus = corpus();

        // Single token must appear anywhere
        let hits = substring_scan(&corpus, "rice", 2, 5);
        assert_eq!(hits.len(), 2);

        // Only the first two tokens are required
        let hits = substring_scan(&corpus, "tomato onion kinoa", 2, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Tomato Soup");

        // Capped, corpus order
        let hits = substring_scan(&corpus, "title", 2, 2);
        assert_eq!(hits.iter().map(|d| d.id).collect::<Vec<_>>(), vec![0, 1]);

        assert!(substring_scan(&corpus, "", 2, 5).is_empty());
        assert!(substring_scan(&Corpus::default(), "rice", 2, 5).is_empty());
    }

    #[test]
    fn test_cascade_never_exceeds_top_k() {
        let corpus = corpus();
        let fused = Arc::new(ScriptedRetriever::new(
            corpus.clone(),
            vec![("recipe", vec![0, 2]), ("rice", vec![1, 2])],
        ));
        let config = FallbackConfig {
            min_results: 3,
            ..Default::default()
        };
        let cascade = FallbackCascade::new(fused.clone(), corpus, config);

        let outcome = cascade.retrieve_with_fallback("rice", 2);

        assert_eq!(titles(&outcome), vec!["Chicken Pilaf", "Stuffed Peppers"]);
        assert_eq!(outcome.stage, RetrievalStage::Expanded);
        assert_eq!(fused.queries().len(), 1);

        // Zero still returns a single document
        assert_eq!(cascade.retrieve_with_fallback("rice", 0).documents.len(), 1);
    }

    #[test]
    fn test_substring_scan_default_cap() {
        let records = (0..8)
            .map(|i| RawRecipe {
                name: Some(format!("Pilav {}", i)),
                ingredients: Some("rice, butter".into()),
                ..Default::default()
            })
            .collect();
        let corpus = Arc::new(Corpus::from_records(records, None));
        let fused = Arc::new(ScriptedRetriever::new(corpus.clone(), vec![]));
        let config = FallbackConfig {
            generic_suffix: String::new(),
            ..Default::default()
        };
        let cascade = FallbackCascade::new(fused, corpus, config);

        let outcome = cascade.retrieve_with_fallback("butter", 10);
        assert_eq!(outcome.stage, RetrievalStage::SubstringScan);
        assert_eq!(
            outcome.documents.iter().map(|d| d.id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );

        let outcome = cascade.retrieve_with_fallback("kinoa", 10);
        assert!(outcome.is_empty());
        assert_eq!(outcome.stage, RetrievalStage::Exhausted);
    }
}
