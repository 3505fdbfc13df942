use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::cache::CacheManager;
use crate::config::{Config, ProviderKind};
use crate::corpus::Corpus;
use crate::embeddings::{EmbeddingProvider, OllamaClient, build_provider};
use crate::retrieval::{EngineOptions, RetrievalEngine, SearchParams, format_for_context};

/// Options for a one-off query from the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub query: String,
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
    pub category: Option<String>,
    pub max_chars: Option<usize>,
    pub json: bool,
}

/// Load the configuration, pointing it at `corpus` when given
#[inline]
pub fn load_config(corpus: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(path) = corpus {
        info!("Using corpus override {}", path.display());
        config.corpus.path = Some(path);
    }
    Ok(config)
}

/// Build the provider and engine from `config` and run setup
#[inline]
pub fn setup_engine(config: &Config, force_rebuild: bool) -> Result<RetrievalEngine> {
    let provider = build_provider(config)?;
    let options = EngineOptions {
        force_rebuild,
        ..EngineOptions::from_config(config)
    };

    let mut engine = RetrievalEngine::new(provider, options);
    engine
        .setup()
        .with_context(|| format!("Failed to set up retrieval over {}", config.corpus_path().display()))?;
    Ok(engine)
}

#[inline]
pub fn run_setup(config: &Config, rebuild: bool) -> Result<()> {
    let engine = setup_engine(config, rebuild)?;
    let stats = engine.stats();

    println!("✅ Retrieval engine ready");
    println!("   📚 Records: {}", stats.record_count);
    println!("   🏷️  Categories: {}", stats.categories.len());
    println!("   🤖 Model: {}", stats.model);
    if let Some(dimension) = stats.embedding_dimension {
        println!("   🔢 Dimension: {}", dimension);
    }
    println!(
        "   🧮 Embeddings: {}",
        if stats.embeddings_cached {
            "loaded from cache"
        } else {
            "computed"
        }
    );
    println!(
        "   🔍 Index: {}",
        if stats.index_cached {
            "restored from cache"
        } else {
            "built"
        }
    );
    if let Some(dir) = &stats.cache_dir {
        println!("   💾 Cache: {}", dir.display());
    }

    Ok(())
}

#[inline]
pub fn run_search(config: &Config, options: &SearchOptions) -> Result<()> {
    let mut retrieval = config.retrieval.clone();
    if let Some(top_k) = options.top_k {
        retrieval.set_top_k(top_k)?;
    }
    if let Some(threshold) = options.threshold {
        retrieval.set_threshold(threshold)?;
    }

    let engine = setup_engine(config, false)?;

    let mut params = SearchParams::default()
        .with_top_k(retrieval.top_k)
        .with_threshold(retrieval.threshold);
    if let Some(category) = &options.category {
        params = params.with_category(category.clone());
    }

    let results = engine
        .try_search(&options.query, &params)
        .context("Search failed")?;

    if options.json {
        print_json(&results)?;
    } else {
        let max_chars = options.max_chars.unwrap_or(retrieval.max_context_chars);
        println!("{}", format_for_context(&results, max_chars));
    }

    Ok(())
}

#[inline]
pub fn run_category(config: &Config, category: &str, top_k: usize, json: bool) -> Result<()> {
    let engine = setup_engine(config, false)?;
    let results = engine.search_by_category(category, top_k);

    if json {
        print_json(&results)?;
    } else if results.is_empty() {
        println!("No places found in category '{}'.", category);
        let known = engine.categories();
        if !known.is_empty() {
            println!(
                "Known categories: {}",
                known.into_iter().collect::<Vec<_>>().join(", ")
            );
        }
    } else {
        println!(
            "{}",
            format_for_context(&results, config.retrieval.max_context_chars)
        );
    }

    Ok(())
}

#[inline]
pub fn list_categories(config: &Config) -> Result<()> {
    let engine = setup_engine(config, false)?;
    let counts = engine.stats().categories;

    if counts.is_empty() {
        println!("The corpus has no records.");
        return Ok(());
    }

    println!("Categories ({} total):", counts.len());
    for (category, count) in &counts {
        println!(
            "   {} {} ({})",
            crate::retrieval::category_icon(Some(category.as_str())),
            category,
            count
        );
    }

    Ok(())
}

#[inline]
pub fn show_stats(config: &Config, json: bool) -> Result<()> {
    let engine = setup_engine(config, false)?;
    let stats = engine.stats();

    if json {
        print_json(&stats)?;
        return Ok(());
    }

    println!("📊 Retrieval Statistics");
    println!("{}", "=".repeat(50));
    println!("State: {}", stats.state);
    println!("Records: {}", stats.record_count);
    println!("Indexed vectors: {}", stats.index_vectors);
    println!("Model: {}", stats.model);
    match stats.embedding_dimension {
        Some(dimension) => println!("Embedding dimension: {}", dimension),
        None => println!("Embedding dimension: n/a"),
    }
    if let Some(dir) = &stats.cache_dir {
        println!("Cache directory: {}", dir.display());
    }
    println!("Embeddings cached: {}", stats.embeddings_cached);
    println!("Index cached: {}", stats.index_cached);
    println!();
    println!("Records per category:");
    for (category, count) in &stats.categories {
        println!("   {}: {}", category, count);
    }

    Ok(())
}

/// Report provider reachability, corpus health and cache consistency without building anything
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("📊 Tourism RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedding Provider:");
    let model_id = build_provider(config)?.model_id().to_string();
    match config.embedding.provider {
        ProviderKind::Ollama => {
            match OllamaClient::new(&config.ollama) {
                Ok(client) => match client.health_check() {
                    Ok(()) => {
                        println!(
                            "   ✅ Ollama: Connected ({}:{})",
                            config.ollama.host, config.ollama.port
                        );
                        if let Ok(version) = client.ping() {
                            println!("   🏷️  Version: {}", version);
                        }
                        println!("   📋 Model: {}", config.ollama.model);
                        println!("   🔢 Batch Size: {}", config.ollama.batch_size);
                    }
                    Err(e) => {
                        println!("   ⚠️  Ollama: Unhealthy - {:#}", e);
                    }
                },
                Err(e) => {
                    println!("   ❌ Ollama: Failed to create client - {:#}", e);
                }
            }
        }
        ProviderKind::Hash => {
            println!(
                "   ✅ Hash embeddings ({} dimensions, seed {})",
                config.hash.dimensions, config.hash.seed
            );
        }
    }

    println!();
    println!("📚 Corpus:");
    let corpus_path = config.corpus_path();
    let corpus = match Corpus::load(&corpus_path, config.corpus.collection_key.as_deref()) {
        Ok(corpus) => {
            println!("   ✅ {}", corpus_path.display());
            println!(
                "   📊 {} records in '{}'",
                corpus.len(),
                corpus.collection_key()
            );
            Some(corpus)
        }
        Err(e) => {
            println!("   ❌ {}", e);
            None
        }
    };

    println!();
    println!("💾 Cache:");
    let cache = cache_for(config);
    println!("   📁 {}", cache.dir().display());
    match corpus {
        Some(corpus) => {
            let report = cache.check_consistency(corpus.len(), Some(&model_id));
            if report.is_consistent {
                println!("   ✅ {}", report.summary());
            } else {
                println!("   ⚠️  {}", report.summary());
                for issue in &report.issues {
                    println!("   • {}", issue);
                }
                println!("   Run 'tourism-rag setup' to rebuild the cache.");
            }
        }
        None => {
            println!("   ⏭️  Skipped consistency check (corpus unavailable)");
        }
    }

    Ok(())
}

#[inline]
pub fn clear_cache(config: &Config) -> Result<()> {
    let cache = cache_for(config);
    let removed = cache.clear()?;

    if removed == 0 {
        println!("Cache at {} was already empty.", cache.dir().display());
    } else {
        println!(
            "🗑️  Removed {} cache files from {}",
            removed,
            cache.dir().display()
        );
    }
    Ok(())
}

/// Cache for the configured corpus, keyed the same way the engine keys it
fn cache_for(config: &Config) -> CacheManager {
    let corpus_path = config.corpus_path();
    let stem = corpus_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| {
            warn!(
                "Corpus path {} has no file name, using 'corpus' as cache key",
                corpus_path.display()
            );
            "corpus".to_string()
        });
    CacheManager::new(&config.cache_dir_path(), &stem)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
