//! Runtime and collection configuration.

use std::time::Duration;

use crate::errors::RetrievalError;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug)]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

/// Describes the vector space of the collection.
#[derive(Clone, Debug)]
pub struct VectorSpace {
    /// Dimensionality of vectors.
    pub size: usize,
    /// Distance function.
    pub distance: DistanceKind,
}

/// Retrieval scoring mode.
///
/// `Vector` is the contract; `Hybrid` additionally blends a lexical
/// signal via a [`crate::strategy::ScoringStrategy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    /// Pure vector similarity.
    Vector,
    /// Vector similarity blended with a lexical signal.
    Hybrid,
}

impl SearchMode {
    /// Stable name used in query-cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Vector => "vector",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

/// Per-call search options. `alpha` weighs the vector score in hybrid
/// mode (1.0 = vector only) and is ignored in vector mode.
#[derive(Clone, Copy, Debug)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub alpha: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Vector,
            alpha: None,
        }
    }
}

/// Configuration for the retrieval engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Target collection name.
    pub collection: String,
    /// Distance function (Cosine by default).
    pub distance: DistanceKind,
    /// Upsert batch size for index writes (typical range: 64..512).
    pub upsert_batch: usize,
    /// TTL for cached query results. Short: result relevance depends on
    /// a growing corpus.
    pub query_cache_ttl: Duration,
    /// TTL for cached embeddings. Long: embeddings are stable per
    /// text+model.
    pub embedding_cache_ttl: Duration,
}

impl EngineConfig {
    /// Creates a sane default config for a given collection name.
    pub fn new_default(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            distance: DistanceKind::Cosine,
            upsert_batch: 100,
            query_cache_ttl: Duration::from_secs(300),
            embedding_cache_ttl: Duration::from_secs(3600),
        }
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.collection.trim().is_empty() {
            return Err(RetrievalError::Config("collection is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(RetrievalError::Config("upsert_batch must be > 0".into()));
        }
        Ok(())
    }
}
