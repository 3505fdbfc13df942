
use anyhow::{Context, Result};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::EmbeddingProvider;
use crate::config::OllamaConfig;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
const BACKOFF_FACTOR: u32 = 2;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    model_id: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
    retry_delay: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ModelDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub families: Option<Vec<String>>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            model_id: format!("ollama:{}", config.model),
            batch_size: config.batch_size,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; later retries back off exponentially
    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Confirm the server answers and has the configured model installed
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        self.validate_model()
            .with_context(|| format!("Ollama at {} is not ready for embeddings", self.base_url))?;
        info!("Ollama at {} serves model {}", self.base_url, self.model);
        Ok(())
    }

    /// Ask the server for its version, returning it
    #[inline]
    pub fn ping(&self) -> Result<String> {
        let version: VersionResponse = self.get_json("/api/version", "version check")?;
        debug!("Ollama at {} is version {}", self.base_url, version.version);
        Ok(version.version)
    }

    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        let installed = self.list_models()?;
        if installed.iter().any(|model| model.name == self.model) {
            return Ok(());
        }

        let names = installed.iter().map(|model| model.name.as_str()).join(", ");
        warn!("Model {} missing from Ollama (installed: {})", self.model, names);
        anyhow::bail!(
            "Model '{}' is not installed on the Ollama server (installed: {})",
            self.model,
            if names.is_empty() { "none" } else { names.as_str() }
        )
    }

    /// Models installed on the server, from `/api/tags`
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let tags: ModelsResponse = self.get_json("/api/tags", "model listing")?;
        debug!("Ollama reports {} installed models", tags.models.len());
        Ok(tags.models)
    }

    /// Embed `texts` with one `/api/embed` request per batch of the configured size
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.batch_size.max(1) as usize;
        let mut vectors = Vec::with_capacity(texts.len());

        for (number, batch) in texts.chunks(batch_size).enumerate() {
            let embedded = self.embed_batch(batch).with_context(|| {
                format!("Embedding batch {} ({} texts) failed", number + 1, batch.len())
            })?;
            vectors.extend(embedded);
        }

        debug!("Embedded {} texts with {}", vectors.len(), self.model);
        Ok(vectors)
    }

    fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/api/embed")?;
        let body = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: batch,
        })
        .context("Failed to encode embed request")?;

        let text = self.with_retry("embed request", || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&body)
                .and_then(|mut response| response.body_mut().read_to_string())
        })?;

        let EmbedResponse { embeddings } =
            serde_json::from_str(&text).context("Ollama sent a malformed embed response")?;
        anyhow::ensure!(
            embeddings.len() == batch.len(),
            "Ollama returned {} embeddings for {} inputs",
            embeddings.len(),
            batch.len()
        );
        Ok(embeddings)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid Ollama endpoint {}", path))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let text = self.with_retry(what, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut response| response.body_mut().read_to_string())
        })?;
        serde_json::from_str(&text).with_context(|| format!("Ollama sent a malformed {}", what))
    }

    /// Run `send` until it succeeds, a non-retryable error occurs, or attempts run out.
    ///
    /// The wait doubles after every failed attempt.
    fn with_retry<T>(
        &self,
        what: &str,
        mut send: impl FnMut() -> Result<T, ureq::Error>,
    ) -> Result<T> {
        let mut wait = self.retry_delay;
        let mut attempt = 1;

        loop {
            let error = match send() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match Disposition::of(&error) {
                Disposition::Rejected(status) => {
                    warn!("Ollama rejected {} with HTTP {}", what, status);
                    anyhow::bail!("Ollama rejected {}: HTTP {}", what, status);
                }
                Disposition::Fatal => {
                    return Err(anyhow::Error::new(error).context(format!("{} failed", what)));
                }
                Disposition::Transient if attempt >= self.retry_attempts => {
                    error!("{} failed after {} attempts: {}", what, attempt, error);
                    return Err(anyhow::Error::new(error)
                        .context(format!("{} failed after {} attempts", what, attempt)));
                }
                Disposition::Transient => {
                    warn!(
                        "{} attempt {}/{} failed ({}), retrying in {:?}",
                        what, attempt, self.retry_attempts, error, wait
                    );
                    std::thread::sleep(wait);
                    wait = wait.saturating_mul(BACKOFF_FACTOR);
                    attempt += 1;
                }
            }
        }
    }
}

/// How a failed request should be handled
enum Disposition {
    /// Server-side or network trouble worth another attempt
    Transient,
    /// The server refused the request; repeating it will not help
    Rejected(u16),
    Fatal,
}

impl Disposition {
    fn of(error: &ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(status) if *status >= 500 => Self::Transient,
            ureq::Error::StatusCode(status) => Self::Rejected(*status),
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => Self::Transient,
            _ => Self::Fatal,
        }
    }
}

impl EmbeddingProvider for OllamaClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.generate_embeddings_batch(texts)
    }

    #[inline]
    fn model_id(&self) -> &str {
        &self.model_id
    }

    #[inline]
    fn check_available(&self) -> Result<()> {
        self.health_check()
    }

    #[inline]
    fn batch_size(&self) -> usize {
        self.batch_size.max(1) as usize
    }
}
