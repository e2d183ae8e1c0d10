//! RAG Pipeline orchestration
//!
//! Wires the corpus, both indexes, the fallback cascade and the generator
//! into a [`RecipeAssistant`] that answers free-text recipe questions.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::data::{load_corpus, Corpus};
use crate::embedding::{create_embedder, Embedder, EmbeddingConfig};
use crate::retrieval::{
    Bm25Retriever, FallbackCascade, FallbackConfig, FallbackOutcome, HnswConfig, HnswRetriever,
    HybridRetriever, IndexMetadata, Retriever, DEFAULT_DENSE_WEIGHT, DEFAULT_LEXICAL_WEIGHT,
    DEFAULT_RRF_K,
};
use crate::utils::default_index_dir;

use super::context::{ContextBuilder, PromptTemplates, DEFAULT_TEMPLATE};
use super::generator::{create_generator, Generator, GeneratorConfig};
use super::query::RagResponse;

static ASSISTANT: OnceCell<RecipeAssistant> = OnceCell::new();

/// Configuration for the recipe assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Number of documents to retrieve
    pub top_k: usize,

    /// Keep only the first N records of the dataset
    pub sample_size: Option<usize>,

    /// Weight of the dense retriever in rank fusion
    pub dense_weight: f32,

    /// Weight of the lexical retriever in rank fusion
    pub lexical_weight: f32,

    /// RRF constant
    pub rrf_k: f32,

    /// Dataset file or directory
    pub dataset_path: PathBuf,

    /// Persisted dense index location (defaults to the user cache)
    pub index_dir: Option<PathBuf>,

    /// Embedding backend ("gemini" or "token")
    pub embedding_backend: String,

    /// Embedding settings
    pub embedding: EmbeddingConfig,

    /// Fallback cascade settings
    pub fallback: FallbackConfig,

    /// Generator settings
    pub generator: GeneratorConfig,

    /// Prompt template to use
    pub template_name: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            sample_size: None,
            dense_weight: DEFAULT_DENSE_WEIGHT,
            lexical_weight: DEFAULT_LEXICAL_WEIGHT,
            rrf_k: DEFAULT_RRF_K,
            dataset_path: PathBuf::from("data"),
            index_dir: None,
            embedding_backend: "gemini".to_string(),
            embedding: EmbeddingConfig::default(),
            fallback: FallbackConfig::default(),
            generator: GeneratorConfig::default(),
            template_name: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl RagConfig {
    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Reject settings no query could run with
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        let weights = [self.dense_weight, self.lexical_weight];
        if !weights.iter().all(|w| w.is_finite() && *w >= 0.0) {
            anyhow::bail!("Fusion weights must be finite and non-negative");
        }
        if !(self.rrf_k.is_finite() && self.rrf_k > 0.0) {
            anyhow::bail!("rrf_k must be finite and positive");
        }
        Ok(())
    }

    /// Configured index directory, or the default cache location
    pub fn resolve_index_dir(&self) -> Result<PathBuf> {
        match &self.index_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_index_dir(),
        }
    }

    /// Set top_k
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the sample size
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = Some(sample_size);
        self
    }

    /// Set the fusion weights
    pub fn with_weights(mut self, dense_weight: f32, lexical_weight: f32) -> Self {
        self.dense_weight = dense_weight;
        self.lexical_weight = lexical_weight;
        self
    }

    /// Set the dataset path
    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = path.into();
        self
    }

    /// Set the index directory
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Set the embedding backend
    pub fn with_embedding_backend(mut self, backend: &str) -> Self {
        self.embedding_backend = backend.to_string();
        self
    }

    /// Set the generator config
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    /// Set the fallback settings
    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set template name
    pub fn with_template(mut self, template: &str) -> Self {
        self.template_name = template.to_string();
        self
    }
}

/// Recipe question-answering assistant
///
/// Orchestrates the full RAG workflow:
/// 1. Expand the query and run the fallback cascade over fused retrieval
/// 2. Build context and sources from the retrieved recipes
/// 3. Generate an answer and append the sources
pub struct RecipeAssistant {
    corpus: Arc<Corpus>,
    cascade: FallbackCascade,
    generator: Arc<dyn Generator>,
    context_builder: ContextBuilder,
    config: RagConfig,
}

impl RecipeAssistant {
    /// Load the dataset, open or build the indexes and connect the configured backends
    pub fn initialize(config: RagConfig) -> Result<Self> {
        config.validate()?;

        let corpus = Arc::new(load_corpus(&config.dataset_path, config.sample_size)?);
        let embedder = create_embedder(&config.embedding_backend, config.embedding.clone())?;
        let generator = create_generator(config.generator.clone())?;

        Self::from_parts(corpus, embedder, generator, config)
    }

    /// Process-wide assistant, built on first use. Later calls ignore `config`.
    pub fn get_or_init(config: RagConfig) -> Result<&'static RecipeAssistant> {
        ASSISTANT.get_or_try_init(|| Self::initialize(config))
    }

    /// Assemble an assistant from an already loaded corpus and explicit backends
    pub fn from_parts(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: RagConfig,
    ) -> Result<Self> {
        let index_dir = config.resolve_index_dir()?;
        let dense = HnswRetriever::build_or_load(&index_dir, corpus.clone(), embedder, HnswConfig::default())?;
        let lexical = Bm25Retriever::build(corpus.clone())?;

        let hybrid = HybridRetriever::new(Arc::new(dense), Arc::new(lexical), corpus.len())
            .with_weights(config.dense_weight, config.lexical_weight)
            .with_rrf_k(config.rrf_k);

        let cascade = FallbackCascade::new(
            Arc::new(hybrid) as Arc<dyn Retriever>,
            corpus.clone(),
            config.fallback.clone(),
        );

        tracing::info!(
            "Recipe assistant ready: {} recipes, generator {}",
            corpus.len(),
            generator.model_name()
        );

        Ok(Self {
            corpus,
            cascade,
            generator,
            context_builder: ContextBuilder::with_templates(PromptTemplates::default(), &config.template_name),
            config,
        })
    }

    /// Build (or with `rebuild`, recompute) the persisted dense index only
    pub fn build_index(config: &RagConfig, rebuild: bool) -> Result<IndexMetadata> {
        config.validate()?;

        let corpus = Arc::new(load_corpus(&config.dataset_path, config.sample_size)?);
        let embedder = create_embedder(&config.embedding_backend, config.embedding.clone())?;
        let index_dir = config.resolve_index_dir()?;

        let dense = if rebuild {
            HnswRetriever::rebuild(&index_dir, corpus, embedder, HnswConfig::default())?
        } else {
            HnswRetriever::build_or_load(&index_dir, corpus, embedder, HnswConfig::default())?
        };

        Ok(dense.metadata().clone())
    }

    /// Retrieve documents for a query, running the fallback stages as needed
    pub fn search(&self, query: &str, top_k: usize) -> FallbackOutcome {
        self.cascade.retrieve_with_fallback(query, top_k)
    }

    /// Answer a question. Retrieval and generation failures are reported in
    /// the answer text, never as an `Err`.
    pub fn ask(&self, query: &str) -> RagResponse {
        let retrieval_start = Instant::now();
        let outcome = self.search(query, self.config.top_k);
        let retrieval_time_ms = retrieval_start.elapsed().as_millis() as u64;

        tracing::debug!(
            "Retrieved {} documents for {:?} (stage: {})",
            outcome.documents.len(),
            query,
            outcome.stage
        );

        let synthesis = self.context_builder.synthesize(query, &outcome.documents);

        let generation_start = Instant::now();
        let answer = self
            .generator
            .generate(&synthesis.prompt, &self.config.generator.sampling);
        let generation_time_ms = generation_start.elapsed().as_millis() as u64;

        RagResponse {
            answer: self.context_builder.finish(answer, &synthesis.sources),
            sources: synthesis.sources,
            context: synthesis.context,
            stage: outcome.stage,
            retrieval_time_ms,
            generation_time_ms,
        }
    }

    /// Get the corpus
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Get the generator reference
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Get the config
    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}
