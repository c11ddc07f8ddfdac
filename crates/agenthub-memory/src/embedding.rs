use agenthub_core::{HubError, HubResult};
use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> HubResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> HubResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Stem length used for the secondary feature of each word, so that
/// "research" and "researcher" share part of their signal.
const STEM_LEN: usize = 5;

/// Feature-hashing embedder that runs fully in-process.
///
/// Each word contributes its term frequency to a few hashed buckets, plus a
/// weaker contribution for its stem. The result is L2-normalised. Text that
/// contains no usable words embeds to the zero vector.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Create an embedder producing vectors of `dimension` components.
    ///
    /// A dimension of zero is bumped to one.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, data: &[u8], seed: u8) -> usize {
        let mut hash = fnv1a(data);
        hash ^= u32::from(seed);
        hash = hash.wrapping_mul(16777619);
        hash as usize % self.dimension
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> HubResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(HubError::Provider("cannot embed empty text".to_string()));
        }

        let words = tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];
        if words.is_empty() {
            return Ok(vector);
        }

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word.as_str()).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        for (word, count) in &freq {
            let tf = count / total;
            let bytes = word.as_bytes();
            vector[self.bucket(bytes, 0)] += tf;
            vector[self.bucket(bytes, 1)] += tf * 0.7;
            if bytes.len() > STEM_LEN {
                vector[self.bucket(&bytes[..STEM_LEN], 2)] += tf * 0.5;
            } else {
                vector[self.bucket(bytes, 2)] += tf * 0.5;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Lowercased alphanumeric words of two or more characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_string)
        .collect()
}

/// FNV-1a over raw bytes.
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
