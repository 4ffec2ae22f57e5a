//! Typed error for the knowledge-agent crate.
//!
//! Only retrieval-side failures are fatal to a pipeline run. Generation
//! and validation failures are absorbed into the agent state (diagnostic
//! response text, forced/neutral scores) so the loop can still finalize
//! a best-effort answer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Errors from the underlying rag-engine crate (embedding provider
    /// or vector index failures).
    #[error("retrieval error: {0}")]
    Retrieval(#[from] rag_engine::errors::RetrievalError),

    /// Invalid agent configuration.
    #[error("config error: {0}")]
    Config(String),
}
