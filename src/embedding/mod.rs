//! Text-to-vector embedding, delegated to an external model server.
//!
//! Provides the [`EmbeddingProvider`] trait, the Unix-socket client in [`socket`],
//! and [`EmbeddingClient`], a caching wrapper that owns the text→vector cache.
//! Providers are created via [`create_provider`] from configuration.

#[cfg(unix)]
pub mod socket;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Number of dimensions in the embedding vectors served by the model server.
pub const EMBEDDING_DIM: usize = 384;

/// Failures talking to the embedding server. Always fatal to the current call.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("cannot connect to embedding server at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("embedding transport failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("embedding server sent invalid JSON: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("embedding server error: {0}")]
    Server(String),
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

/// Trait for embedding text into vectors.
///
/// Implementations return unit-length vectors of [`EmbeddingProvider::dimensions`] entries.
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for one round trip.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Wraps a provider with an in-process cache keyed by exact text.
///
/// Single-item [`embed`](EmbeddingProvider::embed) calls are cached; batch calls pass
/// straight through. Each client owns its cache, so independent clients never share state.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

impl EmbeddingProvider for EmbeddingClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|e| anyhow::anyhow!("embedding cache poisoned: {e}"))?
            .get(text)
        {
            return Ok(hit.clone());
        }

        let vector = self.provider.embed(text)?;
        self.cache
            .lock()
            .map_err(|e| anyhow::anyhow!("embedding cache poisoned: {e}"))?
            .insert(text.to_string(), vector.clone());
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.provider.embed_batch(texts)
    }

    fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }
}

/// Create an embedding provider from config, wrapped in a caching [`EmbeddingClient`].
///
/// Currently only `"socket"` is supported (newline-delimited JSON over a Unix socket).
pub fn create_provider(config: &crate::config::EmbeddingConfig) -> Result<EmbeddingClient> {
    match config.provider.as_str() {
        #[cfg(unix)]
        "socket" => {
            let provider = socket::SocketEmbeddingProvider::new(config);
            Ok(EmbeddingClient::new(Arc::new(provider)))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: socket"),
    }
}

pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Cosine similarity; zero when either side has no magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for CountingProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_l2_normalize() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn cosine_of_orthogonal_and_parallel() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn single_embeds_are_cached_batches_are_not() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let client = EmbeddingClient::new(inner.clone());

        client.embed("alpha").unwrap();
        client.embed("alpha").unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.cache_len(), 1);

        client.embed_batch(&["alpha", "beta"]).unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.cache_len(), 1);

        client.clear_cache();
        client.embed("alpha").unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = crate::config::EmbeddingConfig {
            provider: "onnx".into(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }
}
