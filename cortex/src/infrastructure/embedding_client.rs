// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Client
//!
//! The engine never embeds text itself: the host supplies an [`Embedder`]
//! and text is turned into vectors before it reaches the vector store.
//!
//! [`HashEmbedder`] is a deterministic stand-in for tests and demos. Each
//! lowercase token seeds its own pseudo-random direction and the directions
//! are summed and normalized, so texts sharing tokens land close together.
//! It carries no semantics beyond token overlap.

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::normalize;

/// Host-supplied `embed(text) -> vector`
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Must return a unit-norm vector of `dimension()` components
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic token-hash embedder
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// FNV-1a; stable across processes and toolchains
    fn token_seed(token: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let token = token.to_lowercase();
            let mut rng = StdRng::seed_from_u64(Self::token_seed(&token));
            for component in vector.iter_mut() {
                *component += rng.gen_range(-1.0f32..1.0);
            }
            tokens += 1;
        }

        if tokens == 0 {
            bail!("cannot embed text without tokens");
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{cosine_similarity, l2_norm};

    #[tokio::test]
    async fn test_generate_embedding() {
        let embedder = HashEmbedder::new(384);
        let embedding = embedder.embed("test error message").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((l2_norm(&embedding) - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_consistent_embeddings() {
        let embedder = HashEmbedder::new(64);
        let emb1 = embedder.embed("Same text").await.unwrap();
        let emb2 = embedder.embed("same   TEXT").await.unwrap();

        assert_eq!(emb1, emb2, "Same tokens should produce same embedding");
    }

    #[tokio::test]
    async fn test_token_overlap_raises_similarity() {
        let embedder = HashEmbedder::new(128);
        let base = embedder.embed("water boils at sea level").await.unwrap();
        let near = embedder.embed("water boils at altitude").await.unwrap();
        let far = embedder.embed("quantum chromodynamics lattice").await.unwrap();

        assert!(cosine_similarity(&base, &near) > cosine_similarity(&base, &far));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let embedder = HashEmbedder::new(8);
        assert!(embedder.embed("  ,, ").await.is_err());
    }
}
