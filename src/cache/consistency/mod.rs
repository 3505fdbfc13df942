// Cache consistency validation
// Checks that persisted records, embeddings and index agree with each other

#[cfg(test)]
mod tests;

use std::fmt;
use tracing::{debug, info, warn};

use super::CacheManager;

/// State of the persisted artifacts relative to the current corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Records in the corpus as loaded now
    pub record_count: usize,
    /// Records in the cached record list
    pub cached_records: Option<usize>,
    /// Rows in the cached embedding matrix
    pub embedding_rows: Option<usize>,
    pub embedding_model: Option<String>,
    pub embedding_dimension: Option<usize>,
    /// Vectors in the persisted index
    pub index_vectors: Option<usize>,
    pub index_dimension: Option<usize>,
    pub issues: Vec<ConsistencyIssue>,
    /// Overall consistency status
    pub is_consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    MissingArtifact(&'static str),
    UnreadableArtifact {
        artifact: &'static str,
        reason: String,
    },
    RecordCountMismatch {
        cached: usize,
        current: usize,
    },
    EmbeddingCountMismatch {
        rows: usize,
        records: usize,
    },
    ModelMismatch {
        cached: String,
        expected: String,
    },
    IndexCountMismatch {
        vectors: usize,
        rows: usize,
    },
    IndexDimensionMismatch {
        index: usize,
        embeddings: usize,
    },
}

impl fmt::Display for ConsistencyIssue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArtifact(artifact) => write!(f, "{} is missing", artifact),
            Self::UnreadableArtifact { artifact, reason } => {
                write!(f, "{} could not be read: {}", artifact, reason)
            }
            Self::RecordCountMismatch { cached, current } => write!(
                f,
                "cached record list has {} records, corpus has {}",
                cached, current
            ),
            Self::EmbeddingCountMismatch { rows, records } => write!(
                f,
                "embeddings have {} rows for {} records",
                rows, records
            ),
            Self::ModelMismatch { cached, expected } => write!(
                f,
                "embeddings were produced by '{}', provider is '{}'",
                cached, expected
            ),
            Self::IndexCountMismatch { vectors, rows } => write!(
                f,
                "index has {} vectors for {} embedding rows",
                vectors, rows
            ),
            Self::IndexDimensionMismatch { index, embeddings } => write!(
                f,
                "index dimension {} differs from embedding dimension {}",
                index, embeddings
            ),
        }
    }
}

/// Inspects the artifacts of one [`CacheManager`] without modifying them
pub struct ConsistencyValidator<'a> {
    cache: &'a CacheManager,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(cache: &'a CacheManager) -> Self {
        Self { cache }
    }

    /// Check every artifact against `record_count` and, when given, the provider's model id
    #[inline]
    pub fn validate(&self, record_count: usize, model: Option<&str>) -> ConsistencyReport {
        info!(
            "Validating cache consistency in {}",
            self.cache.dir().display()
        );

        let mut issues = Vec::new();

        let cached_records = if self.cache.records_path().exists() {
            match self.cache.load_records() {
                Ok(corpus) => {
                    if corpus.len() != record_count {
                        issues.push(ConsistencyIssue::RecordCountMismatch {
                            cached: corpus.len(),
                            current: record_count,
                        });
                    }
                    Some(corpus.len())
                }
                Err(e) => {
                    issues.push(ConsistencyIssue::UnreadableArtifact {
                        artifact: "records",
                        reason: format!("{:#}", e),
                    });
                    None
                }
            }
        } else {
            issues.push(ConsistencyIssue::MissingArtifact("records"));
            None
        };

        let matrix = if self.cache.embeddings_path().exists() {
            match self.cache.load_embeddings() {
                Ok(matrix) => Some(matrix),
                Err(e) => {
                    issues.push(ConsistencyIssue::UnreadableArtifact {
                        artifact: "embeddings",
                        reason: format!("{:#}", e),
                    });
                    None
                }
            }
        } else {
            issues.push(ConsistencyIssue::MissingArtifact("embeddings"));
            None
        };

        if let Some(matrix) = &matrix {
            if matrix.len() != record_count {
                issues.push(ConsistencyIssue::EmbeddingCountMismatch {
                    rows: matrix.len(),
                    records: record_count,
                });
            }
            if let Some(expected) = model {
                if matrix.model != expected {
                    issues.push(ConsistencyIssue::ModelMismatch {
                        cached: matrix.model.clone(),
                        expected: expected.to_string(),
                    });
                }
            }
        }

        let index = if self.cache.index_path().exists() {
            match crate::index::FlatIndex::restore(&self.cache.index_path()) {
                Ok(index) => Some(index),
                Err(e) => {
                    issues.push(ConsistencyIssue::UnreadableArtifact {
                        artifact: "index",
                        reason: e.to_string(),
                    });
                    None
                }
            }
        } else {
            issues.push(ConsistencyIssue::MissingArtifact("index"));
            None
        };

        if let (Some(index), Some(matrix)) = (&index, &matrix) {
            if index.len() != matrix.len() {
                issues.push(ConsistencyIssue::IndexCountMismatch {
                    vectors: index.len(),
                    rows: matrix.len(),
                });
            } else if !index.is_empty() && index.dimension() != matrix.dimension {
                issues.push(ConsistencyIssue::IndexDimensionMismatch {
                    index: index.dimension(),
                    embeddings: matrix.dimension,
                });
            }
        }

        let report = ConsistencyReport {
            record_count,
            cached_records,
            embedding_rows: matrix.as_ref().map(|matrix| matrix.len()),
            embedding_model: matrix.as_ref().map(|matrix| matrix.model.clone()),
            embedding_dimension: matrix.as_ref().map(|matrix| matrix.dimension),
            index_vectors: index.as_ref().map(|index| index.len()),
            index_dimension: index.as_ref().map(|index| index.dimension()),
            is_consistent: issues.is_empty(),
            issues,
        };

        if report.is_consistent {
            info!("Cache consistency validation passed");
        } else {
            warn!("Cache consistency validation found issues");
            for issue in &report.issues {
                debug!("Cache issue: {}", issue);
            }
        }

        report
    }
}

impl ConsistencyReport {
    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Cache is consistent: {} records, {} embeddings, {} indexed vectors",
                self.record_count,
                self.embedding_rows.unwrap_or_default(),
                self.index_vectors.unwrap_or_default()
            )
        } else {
            format!(
                "Cache inconsistencies found: {} issues ({} artifacts missing)",
                self.total_issues(),
                self.missing_artifacts()
            )
        }
    }

    #[inline]
    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }

    #[inline]
    pub fn missing_artifacts(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, ConsistencyIssue::MissingArtifact(_)))
            .count()
    }
}
