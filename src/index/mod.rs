//! Exact inner-product index over L2-normalized vectors


use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Bumped whenever the persisted layout changes
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cannot index zero-dimensional vectors")]
    ZeroDimension,

    #[error("Corrupt index file: {0}")]
    Corrupt(String),

    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index serialization error: {0}")]
    Serialize(#[from] bincode::Error),
}

/// A search hit: position of the vector in insertion order and its cosine similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    count: usize,
    data: Vec<f32>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    dimension: usize,
    count: usize,
    data: &'a [f32],
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    dimension: usize,
    count: usize,
    data: Vec<f32>,
}

/// Scale `vector` to unit length in place; zero vectors are left untouched
#[inline]
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

impl FlatIndex {
    /// Normalize every row and pack them into a contiguous index.
    ///
    /// All rows must share one dimension. An empty matrix yields an empty index.
    #[inline]
    pub fn build(rows: &[Vec<f32>]) -> Result<Self, IndexError> {
        let Some(first) = rows.first() else {
            return Ok(Self {
                dimension: 0,
                count: 0,
                data: Vec::new(),
            });
        };

        let dimension = first.len();
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }

        let mut data = Vec::with_capacity(dimension * rows.len());
        for (row, vector) in rows.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexError::RaggedMatrix {
                    row,
                    expected: dimension,
                    found: vector.len(),
                });
            }
            let start = data.len();
            data.extend_from_slice(vector);
            if let Some(inserted) = data.get_mut(start..) {
                normalize_l2(inserted);
            }
        }

        debug!(
            "Built flat index with {} vectors of dimension {}",
            rows.len(),
            dimension
        );

        Ok(Self {
            dimension,
            count: rows.len(),
            data,
        })
    }

    /// The `k` nearest vectors to `query` by cosine similarity.
    ///
    /// Results are ordered by descending similarity, ties by ascending position.
    /// `k` is clamped to the index size.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if k == 0 || self.count == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let mut normalized = query.to_vec();
        normalize_l2(&mut normalized);

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                similarity: dot(vector, &normalized),
            })
            .collect();

        let k = k.min(self.count);
        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, rank_order);
            neighbors.truncate(k);
        }
        neighbors.sort_by(rank_order);

        Ok(neighbors)
    }

    #[inline]
    pub fn persist(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = IndexFileRef {
            format_version: INDEX_FORMAT_VERSION,
            dimension: self.dimension,
            count: self.count,
            data: &self.data,
        };
        let bytes = bincode::serialize(&file)?;
        fs::write(path, bytes)?;

        debug!("Persisted index with {} vectors to {}", self.count, path.display());
        Ok(())
    }

    /// Load an index written by [`FlatIndex::persist`], checking its layout
    #[inline]
    pub fn restore(path: &Path) -> Result<Self, IndexError> {
        let bytes = fs::read(path)?;
        let file: IndexFile = bincode::deserialize(&bytes)?;

        if file.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported format version {}",
                file.format_version
            )));
        }
        if file.count > 0 && file.dimension == 0 {
            return Err(IndexError::Corrupt(
                "non-empty index with zero dimension".to_string(),
            ));
        }
        let expected_len = file.dimension.checked_mul(file.count).ok_or_else(|| {
            IndexError::Corrupt("dimension times count overflows".to_string())
        })?;
        if file.data.len() != expected_len {
            return Err(IndexError::Corrupt(format!(
                "expected {} values, found {}",
                expected_len,
                file.data.len()
            )));
        }

        Ok(Self {
            dimension: file.dimension,
            count: file.count,
            data: file.data,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The stored (normalized) vector at `position`
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.count {
            return None;
        }
        let start = position * self.dimension;
        self.data.get(start..start + self.dimension)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.position.cmp(&b.position))
}
