use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tourism_rag::commands::{
    SearchOptions, clear_cache, list_categories, load_config, run_category, run_search, run_setup,
    show_stats, show_status,
};
use tourism_rag::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "tourism-rag")]
#[command(about = "Semantic retrieval over a tourism corpus for RAG chatbots")]
#[command(version)]
struct Cli {
    /// Corpus JSON file to use instead of the configured one
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding provider, corpus and retrieval defaults
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load the corpus and build or restore embeddings and the index
    Setup {
        /// Ignore cached embeddings and index
        #[arg(long)]
        rebuild: bool,
    },
    /// Search the corpus with a free-text query
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum cosine similarity, between 0 and 1
        #[arg(long)]
        threshold: Option<f32>,
        /// Only return records of this exact category
        #[arg(long)]
        category: Option<String>,
        /// Character budget for the rendered context
        #[arg(long)]
        max_chars: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records of one category in corpus order
    Category {
        name: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the categories present in the corpus
    Categories,
    /// Show corpus and index statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check provider, corpus and cache health
    Status,
    /// Delete cached embeddings and index for the corpus
    ClearCache,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { show } = cli.command {
        if show {
            show_config()?;
        } else {
            run_interactive_config()?;
        }
        return Ok(());
    }

    let config = load_config(cli.corpus)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Setup { rebuild } => {
            run_setup(&config, rebuild)?;
        }
        Commands::Search {
            query,
            top_k,
            threshold,
            category,
            max_chars,
            json,
        } => {
            let options = SearchOptions {
                query,
                top_k,
                threshold,
                category,
                max_chars,
                json,
            };
            run_search(&config, &options)?;
        }
        Commands::Category { name, top_k, json } => {
            run_category(&config, &name, top_k, json)?;
        }
        Commands::Categories => {
            list_categories(&config)?;
        }
        Commands::Stats { json } => {
            show_stats(&config, json)?;
        }
        Commands::Status => {
            show_status(&config)?;
        }
        Commands::ClearCache => {
            clear_cache(&config)?;
        }
    }

    Ok(())
}
