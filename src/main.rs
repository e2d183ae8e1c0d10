use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recipe_rag::cli::{self, ConfigArgs};

#[derive(Parser)]
#[command(name = "recipe-rag")]
#[command(about = "Recipe assistant with hybrid retrieval over a recipe corpus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed the corpus and persist the dense index
    Index {
        /// Discard an existing index and embed everything again
        #[arg(long)]
        rebuild: bool,
    },

    /// Retrieve recipes for a query without generating an answer
    Search {
        /// Query text (Turkish or English)
        query: String,

        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Ask the assistant a question
    Ask {
        /// Question text (Turkish or English)
        query: String,

        /// Number of recipes used as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Also print timing and the retrieved context
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipe_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.config.resolve()?;

    match cli.command {
        Commands::Index { rebuild } => {
            cli::index(config, rebuild).await?;
        }

        Commands::Search { query, top_k } => {
            cli::search(config, query, top_k).await?;
        }

        Commands::Ask {
            query,
            top_k,
            verbose,
        } => {
            cli::ask(config, query, top_k, verbose).await?;
        }
    }

    Ok(())
}
