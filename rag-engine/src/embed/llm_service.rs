//! Embedding provider backed by `llm-service`.
//!
//! Adapts the shared [`LlmServiceRoles`] embedding role to the
//! [`EmbeddingsProvider`] trait, with a dimension check on every vector
//! and bounded-concurrency batch embedding.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::embed::{EmbedFuture, EmbeddingsProvider};
use crate::errors::EmbeddingError;
use llm_service::service_roles::LlmServiceRoles;

/// Configuration for the llm-service embedding backend.
#[derive(Clone)]
pub struct LlmEmbedderConfig {
    pub svc: Arc<LlmServiceRoles>,
    /// Expected embedding dimension size.
    pub dim: usize,
    /// Maximum texts per batch call accepted downstream.
    pub batch_limit: usize,
    /// Concurrent in-flight embedding requests within a batch.
    pub concurrency: usize,
}

/// Embedding provider that delegates to the shared LLM service.
pub struct LlmEmbedder {
    svc: Arc<LlmServiceRoles>,
    model: String,
    dim: usize,
    batch_limit: usize,
    concurrency: usize,
}

impl LlmEmbedder {
    /// Construct a new embedder from configuration.
    pub fn new(cfg: LlmEmbedderConfig) -> Self {
        let model = cfg.svc.embedding_model().to_string();
        Self {
            svc: cfg.svc,
            model,
            dim: cfg.dim,
            batch_limit: cfg.batch_limit.max(1),
            concurrency: cfg.concurrency.max(1),
        }
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self
            .svc
            .embed(text)
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        if vector.len() != self.dim {
            return Err(EmbeddingError::VectorSizeMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        Ok(vector)
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        Box::pin(self.embed_checked(text))
    }

    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(async move {
            // `buffered` (not `buffer_unordered`) keeps output order
            // aligned with input order.
            let futures = texts
                .iter()
                .map(|text| self.embed_checked(text))
                .collect::<Vec<_>>();
            stream::iter(futures)
                .buffered(self.concurrency)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect::<Result<Vec<_>, EmbeddingError>>()
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}
