//! Retrieval-and-refinement agent over the RAG engine.
//!
//! Public API: [`KnowledgeAgent`]. It retrieves scored context for a
//! query, generates a grounded answer, judges its quality, and, while
//! the score stays below the configured threshold, widens retrieval and
//! regenerates, bounded by `max_iterations`. Results can be returned as
//! a single [`AgentOutcome`], streamed as per-phase [`AgentEvent`]s, or
//! projected into a service-level [`QueryResponse`] with cited sources.
//!
//! One pipeline run owns its [`state::AgentState`] exclusively; the
//! engine and model capabilities are shared behind `Arc` and safe for
//! concurrent runs. Cancellation is dropping the returned future (or
//! the event receiver); the abandoned state is simply discarded.

pub mod config;
pub mod error;
pub mod expand;
mod machine;
pub mod model;
mod nodes;
pub mod prompt;
pub mod service;
pub mod state;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use rag_engine::RagEngine;

pub use crate::config::AgentConfig;
pub use crate::error::AgentError;
pub use llm_service::ChatMessage;
pub use crate::model::{LanguageModel, ModelError, RolesModel};
pub use crate::service::{QueryRequest, QueryResponse, SourceInfo};
pub use crate::state::{AgentEvent, AgentOutcome, Phase};

use crate::expand::QueryExpander;

/// Agent facade wiring the retrieval engine, the answer generator and
/// the quality judge.
///
/// Both model capabilities share one interface ([`LanguageModel`]) and
/// are selected at construction time; prompts differ per role.
pub struct KnowledgeAgent {
    engine: Arc<RagEngine>,
    answerer: Arc<dyn LanguageModel>,
    judge: Arc<dyn LanguageModel>,
    config: AgentConfig,
}

impl KnowledgeAgent {
    /// Constructs an agent.
    ///
    /// # Errors
    /// Returns `AgentError::Config` if the configuration is invalid.
    pub fn new(
        engine: Arc<RagEngine>,
        answerer: Arc<dyn LanguageModel>,
        judge: Arc<dyn LanguageModel>,
        config: AgentConfig,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self {
            engine,
            answerer,
            judge,
            config,
        })
    }

    /// The underlying retrieval engine (direct access for diagnostics).
    pub fn engine(&self) -> &Arc<RagEngine> {
        &self.engine
    }

    /// Current configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs the full pipeline for a query and returns the outcome.
    ///
    /// # Errors
    /// Propagates [`AgentError`] on embedding/index failures; generation
    /// and validation failures are absorbed into the outcome.
    pub async fn process(&self, query: &str) -> Result<AgentOutcome, AgentError> {
        info!("agent query: {query:?}");
        let effective_query = self.maybe_expand(query).await;
        let state = machine::run(
            &self.engine,
            self.answerer.as_ref(),
            self.judge.as_ref(),
            &self.config,
            effective_query,
            None,
        )
        .await?;
        Ok(state.into())
    }

    /// Runs the pipeline and streams one event per completed phase.
    ///
    /// The receiver observes a monotonically growing sequence of state
    /// snapshots terminated by [`AgentEvent::End`], even on error (the
    /// error is emitted as one more event before the marker).
    pub fn process_stream(&self, query: &str) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(32);

        let engine = self.engine.clone();
        let answerer = self.answerer.clone();
        let judge = self.judge.clone();
        let config = self.config.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            let expanded = if config.expand_query {
                QueryExpander::new(answerer.clone()).expand(&query).await
            } else {
                query
            };

            let result = machine::run(
                &engine,
                answerer.as_ref(),
                judge.as_ref(),
                &config,
                expanded,
                Some(&tx),
            )
            .await;

            if let Err(e) = result {
                warn!("streamed pipeline failed: {e}");
                let _ = tx
                    .send(AgentEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
            let _ = tx.send(AgentEvent::End).await;
        });

        rx
    }

    /// Processes a service-level request into a [`QueryResponse`].
    ///
    /// Never fails: an empty index yields the canned "no documents"
    /// response, and pipeline errors are folded into diagnostic answer
    /// text so operators can self-diagnose without server logs.
    pub async fn answer(&self, request: QueryRequest) -> QueryResponse {
        info!("processing query: {:?}", request.query);

        // Empty corpus is a defined state, not an error.
        match self.engine.count().await {
            Ok(0) => {
                let mut metadata = serde_json::Map::new();
                metadata.insert("error".to_string(), "no_documents".into());
                metadata.insert("collection_count".to_string(), 0.into());
                return QueryResponse {
                    answer: prompt::NO_DOCUMENTS_RESPONSE.to_string(),
                    sources: Vec::new(),
                    score: 0.0,
                    metadata,
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!("failed to count collection: {e}");
            }
        }

        let agent = self.with_overrides(&request);
        match agent.process(&request.query).await {
            Ok(outcome) => service::to_response(outcome),
            Err(e) => {
                warn!("agent query failed: {e}");
                let mut metadata = serde_json::Map::new();
                metadata.insert("error".to_string(), e.to_string().into());
                QueryResponse {
                    answer: format!("Error processing query: cannot search knowledge base ({e})"),
                    sources: Vec::new(),
                    score: 0.0,
                    metadata,
                }
            }
        }
    }

    /* --------------------- Internals --------------------- */

    async fn maybe_expand(&self, query: &str) -> String {
        if self.config.expand_query {
            QueryExpander::new(self.answerer.clone())
                .expand(query)
                .await
        } else {
            query.to_string()
        }
    }

    /// Shallow copy with per-request knob overrides applied.
    fn with_overrides(&self, request: &QueryRequest) -> KnowledgeAgent {
        let mut config = self.config.clone();
        if let Some(top_k) = request.top_k {
            config.top_k = top_k;
        }
        if let Some(threshold) = request.score_threshold {
            config.score_threshold = threshold;
        }
        KnowledgeAgent {
            engine: self.engine.clone(),
            answerer: self.answerer.clone(),
            judge: self.judge.clone(),
            config,
        }
    }
}
