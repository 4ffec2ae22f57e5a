//! Embedding provider interface and caching decorator.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{debug, trace};

use crate::cache::EmbeddingCache;
use crate::errors::EmbeddingError;

/// Boxed future returned by provider methods.
pub type EmbedFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, EmbeddingError>> + Send + 'a>>;

/// Provider interface for embedding generation.
///
/// Implement this trait to plug in your own embedding backend (e.g.,
/// Ollama, OpenAI, local models). Async is required because real
/// providers perform HTTP requests.
pub trait EmbeddingsProvider: Send + Sync {
    /// Embeds a single text.
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>>;

    /// Embeds many texts, preserving input order. Implementations may
    /// assume `texts.len() <= batch_limit()`; callers chunk larger
    /// inputs.
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>>;

    /// Model identifier, used for cache keys.
    fn model_id(&self) -> &str;

    /// Maximum number of texts the backend accepts per batch call.
    fn batch_limit(&self) -> usize;
}

pub mod llm_service;

/// Caching decorator over an [`EmbeddingsProvider`].
///
/// Checks the cache per text before calling the inner provider and
/// populates it per text after a miss, so partial cache hits within a
/// batch only compute the missing subset. Inputs larger than the inner
/// provider's batch limit are chunked transparently.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingsProvider>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingsProvider>, cache: EmbeddingCache) -> Self {
        Self { inner, cache }
    }

    /// Model identifier of the wrapped provider.
    pub fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    /// Number of live cached embeddings (sweeps expired ones).
    pub fn cache_size(&self) -> usize {
        self.cache.size()
    }

    /// Drops all cached embeddings.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Embeds a single text, consulting the cache first.
    ///
    /// # Errors
    /// Propagates [`EmbeddingError`] from the inner provider; never
    /// substitutes a default vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = self.inner.model_id();
        if let Some(hit) = self.cache.get(text, model) {
            trace!("CachedEmbedder::embed cache hit len={}", text.len());
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.set(text, model, vector.clone());
        Ok(vector)
    }

    /// Embeds many texts, preserving input order.
    ///
    /// Only cache misses reach the inner provider, in chunks of at most
    /// `batch_limit()` texts.
    ///
    /// # Errors
    /// Propagates [`EmbeddingError`]; on failure no partial results are
    /// returned.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = self.inner.model_id();

        let mut out: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing_texts: Vec<String> = Vec::new();
        let mut missing_idx: Vec<usize> = Vec::new();

        for (idx, text) in texts.iter().enumerate() {
            match self.cache.get(text, model) {
                Some(hit) => out.push(Some(hit)),
                None => {
                    out.push(None);
                    missing_texts.push(text.clone());
                    missing_idx.push(idx);
                }
            }
        }

        debug!(
            "CachedEmbedder::embed_batch total={} misses={}",
            texts.len(),
            missing_texts.len()
        );

        if !missing_texts.is_empty() {
            let limit = self.inner.batch_limit().max(1);
            let mut generated: Vec<Vec<f32>> = Vec::with_capacity(missing_texts.len());
            for batch in missing_texts.chunks(limit) {
                let vectors = self.inner.embed_batch(batch).await?;
                if vectors.len() != batch.len() {
                    return Err(EmbeddingError::BatchShapeMismatch {
                        got: vectors.len(),
                        want: batch.len(),
                    });
                }
                generated.extend(vectors);
            }

            for (gen_idx, orig_idx) in missing_idx.into_iter().enumerate() {
                let vector = generated[gen_idx].clone();
                self.cache.set(&missing_texts[gen_idx], model, vector.clone());
                out[orig_idx] = Some(vector);
            }
        }

        Ok(out.into_iter().map(|v| v.expect("all slots filled")).collect())
    }
}
