//! Scored vector-retrieval engine with threshold/fallback policy and
//! time-bounded caches.
//!
//! This crate provides a clean API to:
//! - Ingest document chunks with precomputed or on-the-fly embeddings
//! - Retrieve top-K scored chunks for a textual query under a threshold
//!   policy
//! - Delete all chunks belonging to a source document
//!
//! The design is flat (no deep nesting) and splits responsibilities into
//! focused modules. The backing vector store and the embedding backend
//! are capability traits chosen at construction time.
//!
//! Concurrency: retrieval and the caches are safe for concurrent use;
//! the write path (`add_documents`, `delete_by_source`) is serialized
//! internally so partial batches never interleave. All network calls
//! honor their clients' timeouts, and a dropped future leaves no partial
//! state behind beyond possibly-cached embeddings.

pub mod cache;
pub mod chunk;
pub mod config;
pub mod embed;
pub mod errors;
pub mod index;
pub mod ingest;
pub mod retrieve;
pub mod strategy;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::{EmbeddingCache, QueryCache};
use crate::chunk::{Chunk, MetadataFilter, RetrievalResult};
use crate::config::{EngineConfig, SearchOptions};
use crate::embed::{CachedEmbedder, EmbeddingsProvider};
use crate::errors::RetrievalError;
use crate::index::VectorIndex;
use crate::strategy::ScoringStrategy;

pub use crate::config::{DistanceKind, SearchMode, VectorSpace};
pub use crate::errors::EmbeddingError;

/// High-level facade that wires configuration, index, embedder and
/// caches. This is the single entry point recommended for application
/// code.
pub struct RagEngine {
    cfg: EngineConfig,
    index: Arc<dyn VectorIndex>,
    embedder: CachedEmbedder,
    query_cache: QueryCache,
    strategy: Option<Box<dyn ScoringStrategy>>,
    // Single-writer discipline for the index write path.
    write_lock: tokio::sync::Mutex<()>,
}

impl RagEngine {
    /// Constructs an engine from its capabilities.
    ///
    /// The provider is wrapped in a caching decorator with the TTL from
    /// `cfg`; pass a scoring strategy to enable hybrid mode.
    ///
    /// # Errors
    /// Returns `RetrievalError::Config` if the configuration is invalid.
    pub fn new(
        cfg: EngineConfig,
        index: Arc<dyn VectorIndex>,
        provider: Arc<dyn EmbeddingsProvider>,
        strategy: Option<Box<dyn ScoringStrategy>>,
    ) -> Result<Self, RetrievalError> {
        cfg.validate()?;
        trace!("RagEngine::new collection={}", cfg.collection);

        let embedder = CachedEmbedder::new(provider, EmbeddingCache::new(cfg.embedding_cache_ttl));
        let query_cache = QueryCache::new(cfg.query_cache_ttl);

        Ok(Self {
            cfg,
            index,
            embedder,
            query_cache,
            strategy,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Retrieves scored chunks for a query under the threshold policy.
    ///
    /// Results are cached per `(query, top_k, threshold, mode, alpha)`
    /// for the configured query TTL.
    ///
    /// # Errors
    /// Embedding failure or index unavailability aborts the call; see
    /// [`RetrievalError`].
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
        filter: Option<&MetadataFilter>,
        options: SearchOptions,
    ) -> Result<RetrievalResult, RetrievalError> {
        trace!("RagEngine::retrieve top_k={top_k} threshold={score_threshold}");

        // Filtered retrievals bypass the cache; the filter is not part
        // of the cache key.
        if filter.is_none() {
            if let Some(hit) = self
                .query_cache
                .get(query, top_k, score_threshold, &options)
            {
                debug!("RagEngine::retrieve query cache hit");
                return Ok(hit);
            }
        }

        let result = retrieve::retrieve(
            self.index.as_ref(),
            &self.embedder,
            self.strategy.as_deref(),
            query,
            top_k,
            score_threshold,
            filter,
            &options,
        )
        .await?;

        if filter.is_none() {
            self.query_cache
                .set(query, top_k, score_threshold, &options, result.clone());
        }
        Ok(result)
    }

    /// Adds document chunks to the index, embedding any that lack
    /// vectors. Idempotent per `chunk_id`.
    ///
    /// # Errors
    /// Returns embedding errors (no partial index writes) or index
    /// failures.
    pub async fn add_documents(&self, chunks: Vec<Chunk>) -> Result<usize, RetrievalError> {
        let _guard = self.write_lock.lock().await;
        let added =
            ingest::add_documents(self.index.as_ref(), &self.embedder, self.cfg.upsert_batch, chunks)
                .await?;
        // Indexed content changed; cached query results are stale.
        self.query_cache.clear();
        Ok(added)
    }

    /// Removes all chunks whose `source` equals `source_id`.
    ///
    /// # Errors
    /// Returns `RetrievalError::Index` on store failures.
    pub async fn delete_by_source(&self, source_id: &str) -> Result<usize, RetrievalError> {
        let _guard = self.write_lock.lock().await;
        let removed = ingest::delete_by_source(self.index.as_ref(), source_id).await?;
        self.query_cache.clear();
        Ok(removed)
    }

    /// Number of chunks currently indexed.
    ///
    /// # Errors
    /// Returns `RetrievalError::Index` if the store is unavailable.
    pub async fn count(&self) -> Result<usize, RetrievalError> {
        self.index.count().await
    }

    /// Drops all cached embeddings and query results.
    pub fn clear_caches(&self) {
        self.embedder.clear_cache();
        self.query_cache.clear();
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }
}
