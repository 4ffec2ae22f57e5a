//! Unified error types for the crate.

use thiserror::Error;

/// Failure while producing an embedding vector.
///
/// Embedding failures are always fatal to the enclosing call: callers
/// must treat retrieval or ingestion as failed rather than substitute
/// placeholder vectors.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The underlying provider call failed (transport, auth, model).
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// Mismatch in vector dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// The provider returned a different number of vectors than inputs.
    #[error("batch shape mismatch: got {got} vectors for {want} texts")]
    BatchShapeMismatch { got: usize, want: usize },
}

/// Top-level error for retrieval-engine operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding failure (wrapped; aborts the whole call).
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector index unavailable or rejected the operation.
    #[error("index error: {0}")]
    Index(String),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),
}
