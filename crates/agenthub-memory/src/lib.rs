//! Text embeddings and vector similarity for semantic agent routing.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`] — Trait for turning text into fixed-dimension vectors.
//! - [`LocalEmbedding`] — In-process feature-hashing embedder, no external API needed.
//! - [`cosine_similarity`] — Angle-based similarity between two embeddings.

/// Embedding provider trait and local implementation.
pub mod embedding;
/// Vector similarity helpers.
pub mod similarity;

pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use similarity::{cosine_similarity, is_degenerate};
