// src/search/embedder.rs
// Pluggable text -> vector embedder. Treated as a pure function with an
// LRU-ish cache of recent texts. If unavailable, the vector path degrades
// and BM25 continues alone — callers must not assume a vector exists.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

pub const DEFAULT_DIMENSIONS: usize = 384;
const CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const CACHE_CAPACITY: u64 = 2_000;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Wraps any `Embedder` with a cache keyed by the exact input text.
pub struct CachedEmbedder<E: Embedder> {
    inner: E,
    cache: Cache<String, Vec<f32>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self { inner, cache: Cache::builder().time_to_live(CACHE_TTL).max_capacity(CACHE_CAPACITY).build() }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if let Some(cached) = self.cache.get(text).await {
            return Some(cached);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.insert(text.to_string(), vector.clone()).await;
        Some(vector)
    }
}

/// Deterministic, dependency-free fallback: a hashed bag-of-words
/// projection into a fixed-length vector. Not semantically rich, but gives
/// the vector path something to do when no real model is wired in, and
/// keeps test fixtures reproducible without network access.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut vector = vec![0f32; self.dims];
        for token in text.split_whitespace() {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let idx = (hash as usize) % self.dims;
            let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        Some(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_embedder_is_deterministic_and_normalized() {
        let e = HashingEmbedder::default();
        let v1 = e.embed("git rebase workflow").await.unwrap();
        let v2 = e.embed("git rebase workflow").await.unwrap();
        assert_eq!(v1, v2);
        let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn cached_embedder_reuses_prior_vector() {
        let e = CachedEmbedder::new(HashingEmbedder::default());
        let v1 = e.embed("hello world").await.unwrap();
        let v2 = e.embed("hello world").await.unwrap();
        assert_eq!(v1, v2);
    }
}
