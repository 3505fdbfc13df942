//! Loading the tourism corpus into typed records


mod keywords;
mod record;

pub use keywords::{DOMAIN_KEYWORDS, extract_keywords, normalize_whitespace};
pub use record::{Location, Record, RecordMetadata};

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Collection keys tried in order when none is configured
pub const DEFAULT_COLLECTION_KEYS: &[&str] = &["sites", "places", "records"];

/// Category name used for records that carry none
pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("Failed to read corpus file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corpus file {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corpus document must be a JSON object")]
    NotAnObject,

    #[error("Corpus has no collection key (tried: {tried})")]
    MissingCollection { tried: String },

    #[error("Collection '{key}' is not a list")]
    CollectionNotList { key: String },

    #[error("Record at position {position} is not a mapping")]
    NotAMapping { position: usize },

    #[error("Record at position {position} has no name")]
    MissingName { position: usize },

    #[error("Duplicate record id '{id}'")]
    DuplicateId { id: String },
}

/// An ordered, immutable set of records loaded from one corpus file
#[derive(Debug, Clone)]
pub struct Corpus {
    source: PathBuf,
    collection_key: String,
    records: Vec<Record>,
    metadata: Map<String, Value>,
}

impl Corpus {
    /// Read and parse the corpus at `path`.
    ///
    /// `collection_key` selects the list of records; when `None` the first of
    /// [`DEFAULT_COLLECTION_KEYS`] present in the document is used.
    #[inline]
    pub fn load(path: &Path, collection_key: Option<&str>) -> Result<Self, DataLoadError> {
        info!("Loading corpus from {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| DataLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value =
            serde_json::from_str(&contents).map_err(|source| DataLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut corpus = Self::from_value(document, collection_key)?;
        corpus.source = path.to_path_buf();

        info!(
            "Loaded {} records from '{}' collection",
            corpus.records.len(),
            corpus.collection_key
        );
        Ok(corpus)
    }

    /// Parse a corpus held in memory; the source path is left empty
    #[inline]
    pub fn from_json_str(json: &str, collection_key: Option<&str>) -> Result<Self, DataLoadError> {
        let document: Value =
            serde_json::from_str(json).map_err(|source| DataLoadError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        Self::from_value(document, collection_key)
    }

    fn from_value(document: Value, collection_key: Option<&str>) -> Result<Self, DataLoadError> {
        let Value::Object(mut top_level) = document else {
            return Err(DataLoadError::NotAnObject);
        };

        let key = match collection_key {
            Some(key) => {
                if !top_level.contains_key(key) {
                    return Err(DataLoadError::MissingCollection {
                        tried: key.to_string(),
                    });
                }
                key.to_string()
            }
            None => DEFAULT_COLLECTION_KEYS
                .iter()
                .find(|candidate| top_level.contains_key(**candidate))
                .map(|candidate| (*candidate).to_string())
                .ok_or_else(|| DataLoadError::MissingCollection {
                    tried: DEFAULT_COLLECTION_KEYS.join(", "),
                })?,
        };

        let Some(Value::Array(entries)) = top_level.remove(&key) else {
            return Err(DataLoadError::CollectionNotList { key });
        };

        let mut seen = HashSet::with_capacity(entries.len());
        let mut records = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            let record = Record::from_value(position, entry, &key)?;
            if !seen.insert(record.id.clone()) {
                return Err(DataLoadError::DuplicateId { id: record.id });
            }
            records.push(record);
        }

        debug!(
            "Parsed {} records, {} metadata keys",
            records.len(),
            top_level.len()
        );

        Ok(Self {
            source: PathBuf::new(),
            collection_key: key,
            records,
            metadata: top_level,
        })
    }

    /// Build a corpus directly from records, e.g. ones restored from the cache
    #[inline]
    pub fn from_records(
        source: PathBuf,
        collection_key: String,
        records: Vec<Record>,
    ) -> Result<Self, DataLoadError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(DataLoadError::DuplicateId {
                    id: record.id.clone(),
                });
            }
        }

        Ok(Self {
            source,
            collection_key,
            records,
            metadata: Map::new(),
        })
    }

    #[inline]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Name used for this corpus' cache directory
    #[inline]
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| self.collection_key.clone())
    }

    #[inline]
    pub fn collection_key(&self) -> &str {
        &self.collection_key
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top-level keys of the corpus document other than the collection
    #[inline]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Text projection of every record, aligned with [`Corpus::records`]
    #[inline]
    pub fn documents(&self) -> Vec<String> {
        self.records.iter().map(Record::document_text).collect()
    }

    #[inline]
    pub fn categories(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter_map(|record| record.category.clone())
            .collect()
    }

    /// Record count per category; uncategorized records count under `"unknown"`
    #[inline]
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            let category = record.category.as_deref().unwrap_or(UNKNOWN_CATEGORY);
            *counts.entry(category.to_string()).or_insert(0) += 1;
        }
        counts
    }
}
