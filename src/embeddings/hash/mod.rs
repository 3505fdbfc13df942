
use anyhow::Result;

use super::EmbeddingProvider;
use crate::index::normalize_l2;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Offline embedder hashing lowercased word tokens into a fixed number of buckets.
///
/// The hash is FNV-1a seeded with `seed`, so vectors are stable across
/// processes and platforms and can be cached like any model's output.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    seed: u64,
    model_id: String,
}

impl HashEmbedder {
    #[inline]
    pub fn new(dimensions: usize, seed: u64) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            seed,
            model_id: format!("hash-{dimensions}-{seed}"),
        }
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Unit-length bag-of-words vector for `text`; text without tokens maps to zeros
    #[inline]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        for token in tokenize(text) {
            let bucket = self.bucket_for(&token);
            if let Some(slot) = vector.get_mut(bucket) {
                *slot += 1.0;
            }
        }
        normalize_l2(&mut vector);
        vector
    }

    fn bucket_for(&self, token: &str) -> usize {
        let mut hash = FNV_OFFSET_BASIS;
        for byte in self.seed.to_le_bytes().iter().chain(token.as_bytes()) {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        (hash % self.dimensions as u64) as usize
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

impl EmbeddingProvider for HashEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    #[inline]
    fn model_id(&self) -> &str {
        &self.model_id
    }
}
