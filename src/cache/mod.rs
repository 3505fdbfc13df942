// Cache management module
// Persists records, embeddings and the vector index per corpus


pub mod consistency;

pub use consistency::{ConsistencyIssue, ConsistencyReport, ConsistencyValidator};

use anyhow::Context;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::corpus::{Corpus, Record};
use crate::embeddings::EmbeddingProvider;
use crate::index::FlatIndex;
use crate::{RagError, Result};

const RECORDS_FILE: &str = "records.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin";
const INDEX_FILE: &str = "index.bin";

/// Embedding vectors aligned 1:1 with the corpus records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    pub model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether this matrix can stand in for a fresh embedding of `record_count`
    /// records by `model`
    #[inline]
    pub fn is_valid_for(&self, record_count: usize, model: &str) -> bool {
        self.rows.len() == record_count
            && self.model == model
            && self.rows.iter().all(|row| row.len() == self.dimension)
    }
}

/// Where an artifact used by the engine came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSource {
    Cache,
    Computed,
}

impl ArtifactSource {
    #[inline]
    pub fn is_cached(self) -> bool {
        self == Self::Cache
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedRecords {
    collection_key: String,
    records: Vec<Record>,
}

/// On-disk artifacts for one corpus under `<cache_root>/<corpus stem>/`
#[derive(Debug, Clone)]
pub struct CacheManager {
    dir: PathBuf,
}

impl CacheManager {
    #[inline]
    pub fn new(cache_root: &Path, corpus_stem: &str) -> Self {
        Self {
            dir: cache_root.join(corpus_stem),
        }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    #[inline]
    pub fn embeddings_path(&self) -> PathBuf {
        self.dir.join(EMBEDDINGS_FILE)
    }

    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Write the loaded record list next to the other artifacts
    #[inline]
    pub fn store_records(&self, corpus: &Corpus) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;

        let cached = CachedRecords {
            collection_key: corpus.collection_key().to_string(),
            records: corpus.records().to_vec(),
        };
        let json = serde_json::to_string(&cached).context("Failed to serialize records")?;

        let path = self.records_path();
        fs::write(&path, json)
            .with_context(|| format!("Failed to write records cache {}", path.display()))?;

        debug!("Cached {} records at {}", corpus.len(), path.display());
        Ok(())
    }

    /// Records persisted by [`CacheManager::store_records`]
    #[inline]
    pub fn load_records(&self) -> anyhow::Result<Corpus> {
        let path = self.records_path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read records cache {}", path.display()))?;
        let cached: CachedRecords =
            serde_json::from_str(&json).context("Failed to parse records cache")?;

        Corpus::from_records(path, cached.collection_key, cached.records)
            .context("Cached records are inconsistent")
    }

    #[inline]
    pub fn load_embeddings(&self) -> anyhow::Result<EmbeddingMatrix> {
        let path = self.embeddings_path();
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read embeddings cache {}", path.display()))?;
        bincode::deserialize(&bytes).context("Failed to deserialize embeddings cache")
    }

    #[inline]
    pub fn store_embeddings(&self, matrix: &EmbeddingMatrix) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;

        let bytes = bincode::serialize(matrix).context("Failed to serialize embeddings")?;
        let path = self.embeddings_path();
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write embeddings cache {}", path.display()))?;

        debug!(
            "Cached {} embeddings of dimension {} at {}",
            matrix.len(),
            matrix.dimension,
            path.display()
        );
        Ok(())
    }

    /// Reuse cached embeddings when they match the corpus size and provider model,
    /// otherwise embed every record and persist the result.
    ///
    /// `force_rebuild` skips the cache lookup entirely.
    #[inline]
    pub fn load_or_build_embeddings(
        &self,
        corpus: &Corpus,
        provider: &dyn EmbeddingProvider,
        force_rebuild: bool,
    ) -> Result<(EmbeddingMatrix, ArtifactSource)> {
        if !force_rebuild {
            match self.load_embeddings() {
                Ok(matrix) if matrix.is_valid_for(corpus.len(), provider.model_id()) => {
                    info!(
                        "Loaded {} cached embeddings from {}",
                        matrix.len(),
                        self.embeddings_path().display()
                    );
                    return Ok((matrix, ArtifactSource::Cache));
                }
                Ok(matrix) => {
                    warn!(
                        "Cached embeddings are stale ({} rows from '{}', expected {} from '{}'), recomputing",
                        matrix.len(),
                        matrix.model,
                        corpus.len(),
                        provider.model_id()
                    );
                }
                Err(e) => {
                    debug!("No usable embeddings cache: {:#}", e);
                }
            }
        }

        let matrix = compute_embeddings(corpus, provider)?;

        if let Err(e) = self.store_embeddings(&matrix) {
            warn!("Failed to persist embeddings cache: {:#}", e);
        }

        Ok((matrix, ArtifactSource::Computed))
    }

    /// Restore the persisted index when it agrees with `matrix`, otherwise build
    /// and persist a new one.
    ///
    /// A persisted index is never trusted when `embeddings_rebuilt` is set.
    #[inline]
    pub fn load_or_build_index(
        &self,
        matrix: &EmbeddingMatrix,
        embeddings_rebuilt: bool,
    ) -> Result<(FlatIndex, ArtifactSource)> {
        let path = self.index_path();

        if embeddings_rebuilt {
            debug!("Embeddings were recomputed, ignoring any persisted index");
        } else {
            match FlatIndex::restore(&path) {
                Ok(index) if index_matches(&index, matrix) => {
                    info!("Restored index with {} vectors", index.len());
                    return Ok((index, ArtifactSource::Cache));
                }
                Ok(index) => {
                    warn!(
                        "Persisted index has {} vectors of dimension {}, expected {} of dimension {}; rebuilding",
                        index.len(),
                        index.dimension(),
                        matrix.len(),
                        matrix.dimension
                    );
                }
                Err(e) => {
                    debug!("No usable persisted index: {}", e);
                }
            }
        }

        let index = FlatIndex::build(&matrix.rows)?;
        info!(
            "Built index with {} vectors of dimension {}",
            index.len(),
            index.dimension()
        );

        if let Err(e) = index.persist(&path) {
            warn!("Failed to persist index: {}", e);
        }

        Ok((index, ArtifactSource::Computed))
    }

    /// Remove every artifact of this corpus, returning how many files were deleted
    #[inline]
    pub fn clear(&self) -> anyhow::Result<usize> {
        let mut removed = 0;
        for path in [self.records_path(), self.embeddings_path(), self.index_path()] {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }

        if self.dir.exists() && fs::read_dir(&self.dir)?.next().is_none() {
            fs::remove_dir(&self.dir).with_context(|| {
                format!("Failed to remove cache directory {}", self.dir.display())
            })?;
        }

        info!("Removed {} cache files from {}", removed, self.dir.display());
        Ok(removed)
    }

    /// Compare the persisted artifacts with each other and with the current corpus
    #[inline]
    pub fn check_consistency(&self, record_count: usize, model: Option<&str>) -> ConsistencyReport {
        ConsistencyValidator::new(self).validate(record_count, model)
    }
}

fn index_matches(index: &FlatIndex, matrix: &EmbeddingMatrix) -> bool {
    index.len() == matrix.len() && (index.is_empty() || index.dimension() == matrix.dimension)
}

fn compute_embeddings(corpus: &Corpus, provider: &dyn EmbeddingProvider) -> Result<EmbeddingMatrix> {
    let documents = corpus.documents();
    let batch_size = provider.batch_size().max(1);

    info!(
        "Computing embeddings for {} records with {} (batch size {})",
        documents.len(),
        provider.model_id(),
        batch_size
    );

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(documents.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding records {wide_bar}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut rows = Vec::with_capacity(documents.len());
    for batch in documents.chunks(batch_size) {
        let vectors = provider
            .embed(batch)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "Provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        rows.extend(vectors);
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    let dimension = rows.first().map_or(0, Vec::len);
    if let Some((row, vector)) = rows
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != dimension)
    {
        return Err(RagError::Embedding(format!(
            "Embedding {} has dimension {}, expected {}",
            row,
            vector.len(),
            dimension
        )));
    }

    Ok(EmbeddingMatrix {
        model: provider.model_id().to_string(),
        dimension,
        created_at: Utc::now(),
        rows,
    })
}
