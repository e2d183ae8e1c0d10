//! Command-line interface
//!
//! Provides CLI commands for index, search, and ask. The pipeline is
//! blocking, so each command runs it on the tokio blocking pool.

use crate::rag::{RagConfig, RecipeAssistant};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Options shared by every command; flags override the config file
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dataset file or directory (JSONL, JSON or CSV)
    #[arg(short, long, global = true)]
    pub dataset: Option<PathBuf>,

    /// Persisted dense index directory
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    /// Keep only the first N recipes
    #[arg(long, global = true)]
    pub sample_size: Option<usize>,

    /// Embedding backend: gemini or token
    #[arg(long, global = true)]
    pub embedding_backend: Option<String>,

    /// Generator backend: gemini or echo
    #[arg(long, global = true)]
    pub generator_backend: Option<String>,

    /// Prompt template: recipe or recipe_tr
    #[arg(long, global = true)]
    pub template: Option<String>,

    /// Sampling temperature for answer generation
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Upper bound on generated answer tokens
    #[arg(long, global = true)]
    pub max_output_tokens: Option<usize>,
}

impl ConfigArgs {
    /// Load the config file (or defaults) and apply flag overrides
    pub fn resolve(&self) -> Result<RagConfig> {
        let mut config = match &self.config {
            Some(path) => RagConfig::from_file(path)?,
            None => RagConfig::default(),
        };

        if let Some(dataset) = &self.dataset {
            config.dataset_path = dataset.clone();
        }
        if let Some(index_dir) = &self.index_dir {
            config.index_dir = Some(index_dir.clone());
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = Some(sample_size);
        }
        if let Some(backend) = &self.embedding_backend {
            config.embedding_backend = backend.clone();
        }
        if let Some(backend) = &self.generator_backend {
            config.generator.backend = backend.clone();
        }
        if let Some(template) = &self.template {
            config = config.with_template(template);
        }
        if let Some(temperature) = self.temperature {
            config.generator = config.generator.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_output_tokens {
            config.generator = config.generator.with_max_output_tokens(max_tokens);
        }

        Ok(config)
    }
}

/// Run blocking pipeline work off the async runtime
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Pipeline task panicked")?
}

/// Execute the index command - build or rebuild the persisted dense index
pub async fn index(config: RagConfig, rebuild: bool) -> Result<()> {
    tracing::info!("Starting index build");
    tracing::info!("  Dataset: {:?}", config.dataset_path);
    tracing::info!("  Embedding backend: {}", config.embedding_backend);
    tracing::info!("  Rebuild: {}", rebuild);

    let index_dir = config.resolve_index_dir()?;
    let metadata = run_blocking(move || RecipeAssistant::build_index(&config, rebuild)).await?;

    println!("\nIndex Summary:");
    println!("  Documents: {}", metadata.num_documents);
    println!("  Model: {}", metadata.model_name);
    println!("  Dimension: {}", metadata.dimension);
    println!("  Created: {}", metadata.created_at);
    println!("  Directory: {:?}", index_dir);

    Ok(())
}

/// Execute the search command - retrieval only, no generation
pub async fn search(mut config: RagConfig, query: String, top_k: Option<usize>) -> Result<()> {
    if let Some(top_k) = top_k {
        config.top_k = top_k;
    }
    // Search never generates
    config.generator.backend = "echo".to_string();

    tracing::info!("Starting search");
    tracing::info!("  Query: {}", query);
    tracing::info!("  Top-k: {}", config.top_k);

    let query_text = query.clone();
    let outcome = run_blocking(move || {
        let assistant = RecipeAssistant::get_or_init(config)?;
        Ok(assistant.search(&query_text, assistant.config().top_k))
    })
    .await?;

    println!("\nQuery: {}", query);
    println!("Stage: {}", outcome.stage);
    println!("Found {} results:\n", outcome.documents.len());

    for (idx, document) in outcome.documents.iter().enumerate() {
        println!("Rank {}: {} (id: {})", idx + 1, document.display_title(), document.id);
        if let Some(link) = &document.source_link {
            println!("  Link: {}", link);
        }
        println!(
            "  Ingredients: {}",
            document.ingredients_text.chars().take(200).collect::<String>()
        );
        println!();
    }

    Ok(())
}

/// Execute the ask command - retrieve and generate an answer
pub async fn ask(mut config: RagConfig, query: String, top_k: Option<usize>, verbose: bool) -> Result<()> {
    if let Some(top_k) = top_k {
        config.top_k = top_k;
    }

    tracing::info!("Starting ask");
    tracing::info!("  Query: {}", query);

    let response = run_blocking(move || {
        let assistant = RecipeAssistant::get_or_init(config)?;
        Ok(assistant.ask(&query))
    })
    .await?;

    if verbose {
        println!("{}", response);
        println!("--- Context ---\n{}", response.context);
    } else {
        println!("{}", response.answer);
    }

    Ok(())
}
