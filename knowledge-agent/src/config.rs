//! Agent execution configuration.

use rag_engine::SearchMode;

use crate::error::AgentError;

/// Configuration for one agent pipeline.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum refinement iterations; the sole bound on the refine loop.
    pub max_iterations: u32,
    /// Minimum acceptable validation score; below it the loop refines.
    pub validation_threshold: f32,
    /// Number of chunks to retrieve initially.
    pub top_k: usize,
    /// Minimum retrieval similarity score.
    pub score_threshold: f32,
    /// Retrieval scoring mode.
    pub search_type: SearchMode,
    /// Hybrid-search blend weight; meaningful only in hybrid mode.
    pub alpha: Option<f32>,
    /// Expand the query with LLM-generated terms before retrieval.
    pub expand_query: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            validation_threshold: 0.7,
            top_k: 5,
            score_threshold: 0.7,
            search_type: SearchMode::Vector,
            alpha: None,
            expand_query: false,
        }
    }
}

impl AgentConfig {
    /// Validates config values.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.top_k == 0 {
            return Err(AgentError::Config("top_k must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.validation_threshold) {
            return Err(AgentError::Config(
                "validation_threshold must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(AgentError::Config(
                "score_threshold must be in [0, 1]".into(),
            ));
        }
        if let Some(alpha) = self.alpha {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(AgentError::Config("alpha must be in [0, 1]".into()));
            }
        }
        Ok(())
    }
}
