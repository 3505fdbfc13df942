// Embeddings module
// Turns record text projections and queries into dense vectors


pub mod hash;
pub mod ollama;

pub use hash::HashEmbedder;
pub use ollama::{ModelInfo, OllamaClient};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{Config, ProviderKind};

pub const DEFAULT_BATCH_SIZE: usize = 32;

const AVAILABILITY_CHECK_TEXT: &str = "availability check";

/// A deterministic, order-preserving mapping from text to fixed-dimension vectors
pub trait EmbeddingProvider: Send + Sync {
    /// Embed every text, returning one vector per input in the same order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identity of the model; cached embeddings are only reused when it matches
    fn model_id(&self) -> &str;

    /// Number of texts callers should hand to [`EmbeddingProvider::embed`] at once
    #[inline]
    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// Confirm the model can serve requests; setup fails when this errors.
    ///
    /// The default embeds a short text and expects a non-empty vector back.
    #[inline]
    fn check_available(&self) -> Result<()> {
        let vector = self
            .embed_query(AVAILABILITY_CHECK_TEXT)
            .context("Embedding provider failed to embed a test text")?;
        anyhow::ensure!(
            !vector.is_empty(),
            "Embedding provider returned an empty vector"
        );
        Ok(())
    }

    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .context("Embedding provider returned no vector for the query")
    }
}

/// Construct the provider selected in the configuration
#[inline]
pub fn build_provider(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    match config.embedding.provider {
        ProviderKind::Ollama => {
            let client = OllamaClient::new(&config.ollama)
                .context("Failed to create Ollama embedding client")?;
            info!(
                "Using Ollama embeddings at {} with model {}",
                config.ollama.host, config.ollama.model
            );
            Ok(Box::new(client))
        }
        ProviderKind::Hash => {
            info!(
                "Using hash embeddings with {} dimensions",
                config.hash.dimensions
            );
            Ok(Box::new(HashEmbedder::new(
                config.hash.dimensions,
                config.hash.seed,
            )))
        }
    }
}
