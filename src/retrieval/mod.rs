//! Query-time retrieval over the loaded corpus


pub mod format;

pub use format::{NO_RESULTS_MESSAGE, category_icon, format_for_context};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::cache::{ArtifactSource, CacheManager};
use crate::config::{Config, ConfigError};
use crate::corpus::{Corpus, Record};
use crate::embeddings::EmbeddingProvider;
use crate::index::FlatIndex;
use crate::{RagError, Result};

/// Candidates fetched from the index per requested result, leaving room for filtering
const CANDIDATE_MULTIPLIER: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Ready,
    Failed,
}

impl fmt::Display for EngineState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "uninitialized"),
            EngineState::Ready => write!(f, "ready"),
            EngineState::Failed => write!(f, "failed"),
        }
    }
}

/// Where the engine finds its corpus and cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub corpus_path: PathBuf,
    pub collection_key: Option<String>,
    pub cache_dir: PathBuf,
    /// Recompute embeddings and the index even when the cache looks valid
    pub force_rebuild: bool,
}

impl EngineOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            corpus_path: config.corpus_path(),
            collection_key: config.corpus.collection_key.clone(),
            cache_dir: config.cache_dir_path(),
            force_rebuild: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub top_k: usize,
    pub threshold: f32,
    /// Exact category a result must carry
    pub category: Option<String>,
}

impl Default for SearchParams {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 15,
            threshold: 0.1,
            category: None,
        }
    }
}

impl SearchParams {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            threshold: config.retrieval.threshold,
            category: None,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    #[inline]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A ranked reference into the engine's corpus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<'a> {
    pub record: &'a Record,
    pub similarity: f32,
    /// 1-based position in the returned sequence
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub state: EngineState,
    pub record_count: usize,
    pub categories: BTreeMap<String, usize>,
    pub embedding_dimension: Option<usize>,
    pub index_vectors: usize,
    pub model: String,
    pub cache_dir: Option<PathBuf>,
    pub embeddings_cached: bool,
    pub index_cached: bool,
}

struct Loaded {
    corpus: Corpus,
    index: FlatIndex,
    cache: CacheManager,
    embedding_dimension: usize,
    embeddings_source: ArtifactSource,
    index_source: ArtifactSource,
}

/// Semantic search over one corpus.
///
/// The engine starts uninitialized. [`RetrievalEngine::setup`] loads the
/// corpus, restores or computes embeddings and builds the index; on success
/// the engine is ready, on failure it stays failed for the rest of its life.
/// Queries never mutate the engine.
pub struct RetrievalEngine {
    provider: Box<dyn EmbeddingProvider>,
    options: EngineOptions,
    state: EngineState,
    failure: Option<String>,
    loaded: Option<Loaded>,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(provider: Box<dyn EmbeddingProvider>, options: EngineOptions) -> Self {
        Self {
            provider,
            options,
            state: EngineState::Uninitialized,
            failure: None,
            loaded: None,
        }
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Reason setup failed, if it did
    #[inline]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[inline]
    pub fn corpus(&self) -> Option<&Corpus> {
        self.loaded.as_ref().map(|loaded| &loaded.corpus)
    }

    /// Bring the engine to the ready state.
    ///
    /// Calling this again once ready does nothing. After a failure every call
    /// returns the recorded failure.
    #[inline]
    pub fn setup(&mut self) -> Result<()> {
        match self.state {
            EngineState::Ready => return Ok(()),
            EngineState::Failed => {
                return Err(RagError::Setup(
                    self.failure
                        .clone()
                        .unwrap_or_else(|| "setup previously failed".to_string()),
                ));
            }
            EngineState::Uninitialized => {}
        }

        match self.load() {
            Ok(loaded) => {
                info!(
                    "Retrieval engine ready: {} records, {} indexed vectors",
                    loaded.corpus.len(),
                    loaded.index.len()
                );
                self.loaded = Some(loaded);
                self.state = EngineState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("Retrieval engine setup failed: {}", e);
                self.failure = Some(e.to_string());
                self.state = EngineState::Failed;
                Err(e)
            }
        }
    }

    fn load(&self) -> Result<Loaded> {
        let corpus = Corpus::load(
            &self.options.corpus_path,
            self.options.collection_key.as_deref(),
        )?;

        self.provider.check_available().map_err(|e| {
            RagError::Embedding(format!(
                "Embedding model {} is unavailable: {:#}",
                self.provider.model_id(),
                e
            ))
        })?;

        let cache = CacheManager::new(&self.options.cache_dir, &corpus.stem());
        if let Err(e) = cache.store_records(&corpus) {
            warn!("Failed to cache records: {:#}", e);
        }

        let (matrix, embeddings_source) = cache.load_or_build_embeddings(
            &corpus,
            self.provider.as_ref(),
            self.options.force_rebuild,
        )?;

        let (index, index_source) = cache.load_or_build_index(
            &matrix,
            embeddings_source == ArtifactSource::Computed,
        )?;

        if index.len() != corpus.len() {
            return Err(RagError::Setup(format!(
                "Index holds {} vectors for {} records",
                index.len(),
                corpus.len()
            )));
        }

        Ok(Loaded {
            embedding_dimension: matrix.dimension,
            corpus,
            index,
            cache,
            embeddings_source,
            index_source,
        })
    }

    /// Ranked records for `query`; any failure is logged and yields no results
    #[inline]
    pub fn search(&self, query: &str, params: &SearchParams) -> Vec<SearchResult<'_>> {
        match self.try_search(query, params) {
            Ok(results) => results,
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Like [`RetrievalEngine::search`], but reports embedding and index errors.
    ///
    /// An engine that is not ready, an empty corpus, `top_k == 0` and a blank
    /// query all produce an empty list rather than an error. A threshold outside
    /// `0.0..=1.0` is rejected.
    #[inline]
    pub fn try_search(&self, query: &str, params: &SearchParams) -> Result<Vec<SearchResult<'_>>> {
        if !params.threshold.is_finite() || !(0.0..=1.0).contains(&params.threshold) {
            return Err(RagError::Config(
                ConfigError::InvalidThreshold(params.threshold).to_string(),
            ));
        }

        let Some(loaded) = self.ready() else {
            debug!("Search requested while engine is {}", self.state);
            return Ok(Vec::new());
        };
        if loaded.corpus.is_empty() || params.top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Searching '{}' (top_k {}, threshold {}, category {:?})",
            query, params.top_k, params.threshold, params.category
        );

        let query_vector = self
            .provider
            .embed_query(query)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
        if query_vector.iter().any(|value| !value.is_finite()) {
            return Err(RagError::Embedding(
                "Query embedding contains non-finite values".to_string(),
            ));
        }

        let candidates = params
            .top_k
            .saturating_mul(CANDIDATE_MULTIPLIER)
            .min(loaded.corpus.len());
        let neighbors = loaded.index.search(&query_vector, candidates)?;

        let mut results = Vec::with_capacity(params.top_k);
        for neighbor in neighbors {
            if neighbor.similarity.is_nan() || neighbor.similarity < params.threshold {
                continue;
            }
            let Some(record) = loaded.corpus.get(neighbor.position) else {
                continue;
            };
            if let Some(category) = params.category.as_deref() {
                if !record.has_category(category) {
                    continue;
                }
            }

            results.push(SearchResult {
                record,
                similarity: neighbor.similarity,
                rank: results.len() + 1,
            });
            if results.len() >= params.top_k {
                break;
            }
        }

        debug!("Found {} results above threshold", results.len());
        Ok(results)
    }

    /// Up to `top_k` records of exactly `category`, in corpus order
    #[inline]
    pub fn search_by_category(&self, category: &str, top_k: usize) -> Vec<SearchResult<'_>> {
        let Some(loaded) = self.ready() else {
            return Vec::new();
        };

        loaded
            .corpus
            .records()
            .iter()
            .filter(|record| record.has_category(category))
            .take(top_k)
            .enumerate()
            .map(|(position, record)| SearchResult {
                record,
                similarity: 1.0,
                rank: position + 1,
            })
            .collect()
    }

    /// Distinct categories present in the corpus
    #[inline]
    pub fn categories(&self) -> BTreeSet<String> {
        self.ready()
            .map(|loaded| loaded.corpus.categories())
            .unwrap_or_default()
    }

    #[inline]
    pub fn stats(&self) -> EngineStats {
        let loaded = self.ready();
        EngineStats {
            state: self.state,
            record_count: loaded.map_or(0, |loaded| loaded.corpus.len()),
            categories: loaded
                .map(|loaded| loaded.corpus.category_counts())
                .unwrap_or_default(),
            embedding_dimension: loaded.map(|loaded| loaded.embedding_dimension),
            index_vectors: loaded.map_or(0, |loaded| loaded.index.len()),
            model: self.provider.model_id().to_string(),
            cache_dir: loaded.map(|loaded| loaded.cache.dir().to_path_buf()),
            embeddings_cached: loaded.is_some_and(|loaded| loaded.embeddings_source.is_cached()),
            index_cached: loaded.is_some_and(|loaded| loaded.index_source.is_cached()),
        }
    }

    fn ready(&self) -> Option<&Loaded> {
        match self.state {
            EngineState::Ready => self.loaded.as_ref(),
            EngineState::Uninitialized | EngineState::Failed => None,
        }
    }
}
