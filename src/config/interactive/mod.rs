
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;

use super::{Config, ConfigError, OllamaConfig, ProviderKind};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Tourism RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Choose how corpus records and queries are turned into vectors.");
    eprintln!();

    let providers = &["ollama", "hash"];
    let default_index = match config.embedding.provider {
        ProviderKind::Ollama => 0,
        ProviderKind::Hash => 1,
    };
    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(providers)
        .interact()?;

    if provider_index == 0 {
        config.embedding.provider = ProviderKind::Ollama;
        configure_ollama(&mut config.ollama)?;

        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.ollama)? {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before setup.");
        }
    } else {
        config.embedding.provider = ProviderKind::Hash;
        let dimensions: usize = Input::new()
            .with_prompt("Hash embedding dimensions")
            .default(config.hash.dimensions)
            .validate_with(|input: &usize| -> Result<(), &str> {
                if (16..=4096).contains(input) {
                    Ok(())
                } else {
                    Err("Dimensions must be between 16 and 4096")
                }
            })
            .interact_text()?;
        config.hash.dimensions = dimensions;
    }

    eprintln!();
    eprintln!("{}", style("Corpus & Retrieval").bold().yellow());
    configure_corpus(&mut config)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    match config.embedding.provider {
        ProviderKind::Ollama => {
            eprintln!("  Host: {}", style(&config.ollama.host).cyan());
            eprintln!("  Port: {}", style(config.ollama.port).cyan());
            eprintln!("  Model: {}", style(&config.ollama.model).cyan());
            eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
            match config.ollama_url() {
                Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
                Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
            }
        }
        ProviderKind::Hash => {
            eprintln!("  Dimensions: {}", style(config.hash.dimensions).cyan());
            eprintln!("  Seed: {}", style(config.hash.seed).cyan());
        }
    }

    eprintln!();
    eprintln!("{}", style("Corpus:").bold().yellow());
    eprintln!("  File: {}", style(config.corpus_path().display()).cyan());
    eprintln!(
        "  Collection key: {}",
        style(
            config
                .corpus
                .collection_key
                .as_deref()
                .unwrap_or("(auto-detect)")
        )
        .cyan()
    );
    eprintln!("  Cache: {}", style(config.cache_dir_path().display()).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval defaults:").bold().yellow());
    eprintln!("  Top-k: {}", style(config.retrieval.top_k).cyan());
    eprintln!("  Threshold: {}", style(config.retrieval.threshold).cyan());
    eprintln!(
        "  Context budget: {} chars",
        style(config.retrieval.max_context_chars).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let config_dir = Config::config_dir().context("Failed to determine config directory")?;
    Config::load_from(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_corpus(config: &mut Config) -> Result<()> {
    let corpus_path: String = Input::new()
        .with_prompt("Corpus JSON file")
        .default(config.corpus_path().display().to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Corpus path cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.corpus.path = Some(PathBuf::from(corpus_path.trim()));

    let top_k: usize = Input::new()
        .with_prompt("Default number of results")
        .default(config.retrieval.top_k)
        .interact_text()?;

    let threshold: f32 = Input::new()
        .with_prompt("Default similarity threshold (0.0 - 1.0)")
        .default(config.retrieval.threshold)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if input.is_finite() && (0.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err("Threshold must be between 0.0 and 1.0")
            }
        })
        .interact_text()?;

    config.retrieval.set_top_k(top_k)?;
    config.retrieval.set_threshold(threshold)?;

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> Result<bool> {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
