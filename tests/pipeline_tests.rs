//! End-to-end tests for the recipe assistant
//!
//! Run offline with the token embedder and test generators.

use anyhow::Result;
use recipe_rag::data::{Corpus, RawRecipe};
use recipe_rag::embedding::{Embedder, Embedding, EmbeddingConfig, TokenEmbedder, DEFAULT_TOKEN_DIMENSION};
use recipe_rag::rag::{EchoGenerator, Generator, GeneratorConfig, RagConfig, RecipeAssistant, SamplingParams};
use recipe_rag::retrieval::{FallbackConfig, RetrievalStage};
use recipe_rag::RagError;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Token embedder that counts corpus (batch) and query calls separately
struct CountingEmbedder {
    inner: TokenEmbedder,
    batch_calls: AtomicUsize,
    query_calls: AtomicUsize,
    fail_queries: bool,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: TokenEmbedder::new(EmbeddingConfig::default(), DEFAULT_TOKEN_DIMENSION),
            batch_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            fail_queries: false,
        }
    }

    /// Embeds documents but fails every query, like an unavailable service
    fn failing_queries() -> Self {
        Self {
            fail_queries: true,
            ..Self::new()
        }
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(RagError::EmbeddingService("503 Service Unavailable".to_string()).into());
        }
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _prompt: &str, _params: &SamplingParams) -> Result<String> {
        Err(RagError::GenerationService("quota exceeded".to_string()).into())
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

fn recipe(name: &str, ingredients: &str, steps: &str, link: Option<&str>) -> RawRecipe {
    RawRecipe {
        name: Some(name.to_string()),
        ingredients: Some(ingredients.into()),
        steps: Some(steps.into()),
        description: None,
        link: link.map(str::to_string),
    }
}

fn corpus() -> Arc<Corpus> {
    Arc::new(Corpus::from_records(
        vec![
            recipe("Tomato Soup", "tomato, onion", "boil, blend", Some("https://example.com/soup")),
            recipe("Chicken Pilaf", "chicken, rice, butter", "fry the rice, add stock", Some("https://example.com/pilaf")),
            recipe("Shepherd Salad", "tomato, cucumber, pepper, onion", "chop and mix", None),
        ],
        None,
    ))
}

fn config(index_dir: &Path) -> RagConfig {
    RagConfig::default()
        .with_index_dir(index_dir)
        .with_embedding_backend("token")
        .with_generator(GeneratorConfig::default().with_backend("echo"))
}

fn titles(documents: &[recipe_rag::data::RecipeDocument]) -> Vec<&str> {
    documents.iter().map(|d| d.title.as_str()).collect()
}

#[test]
fn test_turkish_query_finds_english_recipe() {
    let dir = tempdir().unwrap();
    let corpus = Arc::new(Corpus::from_records(
        vec![recipe("Tomato Soup", "tomato, onion", "boil, blend", None)],
        None,
    ));

    let assistant = RecipeAssistant::from_parts(
        corpus,
        Arc::new(CountingEmbedder::new()),
        Arc::new(EchoGenerator),
        config(&dir.path().join("index")),
    )
    .unwrap();

    let outcome = assistant.search("domates", 4);

    assert_eq!(titles(&outcome.documents), vec!["Tomato Soup"]);
    assert_eq!(outcome.stage, RetrievalStage::Expanded);
}

#[test]
fn test_ask_returns_answer_with_sources() {
    let dir = tempdir().unwrap();
    let assistant = RecipeAssistant::from_parts(
        corpus(),
        Arc::new(CountingEmbedder::new()),
        Arc::new(EchoGenerator),
        config(&dir.path().join("index")),
    )
    .unwrap();

    let response = assistant.ask("tavuk ve pirinç");

    assert!(response.context.contains("Title: Chicken Pilaf"));
    assert!(response
        .sources
        .iter()
        .any(|s| s.title == "Chicken Pilaf" && s.link == "https://example.com/pilaf"));
    assert!(response.answer.contains("**Sources:**"));
    assert!(response.answer.contains("tavuk ve pirinç"));
}

#[test]
fn test_empty_corpus_still_answers() {
    let dir = tempdir().unwrap();
    let assistant = RecipeAssistant::from_parts(
        Arc::new(Corpus::default()),
        Arc::new(CountingEmbedder::new()),
        Arc::new(EchoGenerator),
        config(&dir.path().join("index")),
    )
    .unwrap();

    let outcome = assistant.search("domates", 4);
    assert!(outcome.is_empty());
    assert_eq!(outcome.stage, RetrievalStage::Exhausted);

    let response = assistant.ask("domates");
    assert!(!response.answer.is_empty());
    assert!(response.sources.is_empty());
    assert!(response.context.is_empty());
}

#[test]
fn test_persisted_index_skips_embedding() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("index");

    let first = Arc::new(CountingEmbedder::new());
    RecipeAssistant::from_parts(corpus(), first.clone(), Arc::new(EchoGenerator), config(&index_dir)).unwrap();
    assert_eq!(first.batch_calls.load(Ordering::SeqCst), 1);

    let second = Arc::new(CountingEmbedder::new());
    let assistant =
        RecipeAssistant::from_parts(corpus(), second.clone(), Arc::new(EchoGenerator), config(&index_dir)).unwrap();

    assert_eq!(second.batch_calls.load(Ordering::SeqCst), 0);
    assert!(!assistant.search("chicken", 2).is_empty());
}

#[test]
fn test_generation_failure_keeps_sources() {
    let dir = tempdir().unwrap();
    let assistant = RecipeAssistant::from_parts(
        corpus(),
        Arc::new(CountingEmbedder::new()),
        Arc::new(FailingGenerator),
        config(&dir.path().join("index")),
    )
    .unwrap();

    let response = assistant.ask("tomato soup");

    assert!(response.answer.starts_with("⚠️ Answer generation failed:"));
    assert!(response.answer.contains("quota exceeded"));
    assert!(response.answer.contains("- [Tomato Soup](https://example.com/soup)"));
    assert!(!response.sources.is_empty());
}

#[test]
fn test_embedding_failure_falls_back_to_lexical() {
    let dir = tempdir().unwrap();
    let embedder = Arc::new(CountingEmbedder::failing_queries());
    let assistant = RecipeAssistant::from_parts(
        corpus(),
        embedder.clone(),
        Arc::new(EchoGenerator),
        config(&dir.path().join("index")),
    )
    .unwrap();

    let outcome = assistant.search("cucumber", 4);

    assert!(embedder.query_calls.load(Ordering::SeqCst) > 0);
    assert_eq!(titles(&outcome.documents), vec!["Shepherd Salad"]);
    assert_eq!(outcome.stage, RetrievalStage::Expanded);
}

#[test]
fn test_unmatched_query_relaxes_in_stages() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("index");

    // "cucu" is not a BM25 term; the generic suffix matches the field labels
    let assistant = RecipeAssistant::from_parts(
        corpus(),
        Arc::new(CountingEmbedder::failing_queries()),
        Arc::new(EchoGenerator),
        config(&index_dir),
    )
    .unwrap();
    let outcome = assistant.search("cucu", 4);
    assert_eq!(outcome.stage, RetrievalStage::Widened);
    assert_eq!(outcome.documents.len(), 3);

    // Without a suffix only the substring scan can find it
    let fallback = FallbackConfig {
        generic_suffix: String::new(),
        ..Default::default()
    };
    let assistant = RecipeAssistant::from_parts(
        corpus(),
        Arc::new(CountingEmbedder::failing_queries()),
        Arc::new(EchoGenerator),
        config(&index_dir).with_fallback(fallback),
    )
    .unwrap();
    let outcome = assistant.search("cucu", 4);
    assert_eq!(titles(&outcome.documents), vec!["Shepherd Salad"]);
    assert_eq!(outcome.stage, RetrievalStage::SubstringScan);
}

#[test]
fn test_top_k_is_clamped() {
    let dir = tempdir().unwrap();
    let assistant = RecipeAssistant::from_parts(
        corpus(),
        Arc::new(CountingEmbedder::new()),
        Arc::new(EchoGenerator),
        config(&dir.path().join("index")),
    )
    .unwrap();

    assert_eq!(assistant.search("tomato onion rice", 100).documents.len(), 3);
    assert_eq!(assistant.search("tomato", 0).documents.len(), 1);
}

#[test]
fn test_initialize_from_dataset_file() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("recipes.jsonl");
    let mut file = std::fs::File::create(&dataset).unwrap();
    writeln!(
        file,
        r#"{{"name":"Menemen","ingredients":["egg","tomato","pepper"],"steps":["saute peppers","add eggs"],"link":"https://example.com/menemen"}}"#
    )
    .unwrap();
    writeln!(file, r#"{{"name":"Ayran","ingredients":"yogurt, water, salt","steps":"whisk"}}"#).unwrap();

    let config = config(&dir.path().join("index"))
        .with_dataset_path(&dataset)
        .with_top_k(1);
    let assistant = RecipeAssistant::initialize(config).unwrap();

    assert_eq!(assistant.corpus().len(), 2);

    let response = assistant.ask("yumurta");
    assert!(response.context.starts_with("Title: Menemen"));
    assert_eq!(response.sources.len(), 1);
}

#[test]
fn test_initialize_missing_dataset_is_data_source_error() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("index")).with_dataset_path(dir.path().join("missing"));

    let err = RecipeAssistant::initialize(config).err().unwrap();
    assert!(matches!(err.downcast_ref::<RagError>(), Some(RagError::DataSource(_))));
}

#[test]
fn test_build_index_then_rebuild() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("recipes.json");
    std::fs::write(&dataset, r#"[{"name":"Menemen"},{"name":"Ayran"},{"name":"Pilav"}]"#).unwrap();

    let config = config(&dir.path().join("index")).with_dataset_path(&dataset);

    let metadata = RecipeAssistant::build_index(&config, false).unwrap();
    assert_eq!(metadata.num_documents, 3);
    assert_eq!(metadata.dimension, DEFAULT_TOKEN_DIMENSION);

    let rebuilt = RecipeAssistant::build_index(&config.clone().with_sample_size(2), true).unwrap();
    assert_eq!(rebuilt.num_documents, 2);
}

#[test]
fn test_get_or_init_is_process_wide() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("recipes.json");
    std::fs::write(&dataset, r#"[{"name":"Menemen","ingredients":"egg"}]"#).unwrap();

    let config = config(&dir.path().join("index")).with_dataset_path(&dataset);

    let first = RecipeAssistant::get_or_init(config.clone()).unwrap();
    let second = RecipeAssistant::get_or_init(config.with_top_k(9)).unwrap();

    assert!(std::ptr::eq(first, second));
    assert_eq!(second.config().top_k, 4);
}
