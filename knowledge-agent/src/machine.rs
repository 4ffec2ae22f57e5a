//! Typed state-machine driver.
//!
//! Drives `Retrieve → Generate → Validate → (Refine → Validate)* →
//! Finalize` with an explicit phase loop. The refine loop is bounded by
//! `max_iterations`; that bound is the sole termination guarantee
//! against infinite refinement.

use tokio::sync::mpsc;
use tracing::trace;

use rag_engine::RagEngine;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::model::LanguageModel;
use crate::nodes;
use crate::state::{AgentEvent, AgentState, Phase};

/// Emits a transition snapshot to the optional event channel. A closed
/// receiver is not an error; the pipeline keeps running.
async fn emit(events: Option<&mpsc::Sender<AgentEvent>>, phase: Phase, state: &AgentState) {
    if let Some(tx) = events {
        let _ = tx
            .send(AgentEvent::Transition {
                phase,
                state: state.clone(),
            })
            .await;
    }
}

/// Runs the pipeline to completion and returns the finalized state.
///
/// # Errors
/// Propagates [`AgentError`] from retrieval phases; generation and
/// validation failures never surface here (they are absorbed into the
/// state by the nodes).
pub(crate) async fn run(
    engine: &RagEngine,
    answerer: &dyn LanguageModel,
    judge: &dyn LanguageModel,
    cfg: &AgentConfig,
    query: String,
    events: Option<&mpsc::Sender<AgentEvent>>,
) -> Result<AgentState, AgentError> {
    let mut state = AgentState::new(query);
    let mut phase = Phase::Retrieve;

    loop {
        trace!("machine::run phase={}", phase.as_str());
        match phase {
            Phase::Retrieve => {
                state = nodes::retrieve_node(engine, cfg, state).await?;
                emit(events, Phase::Retrieve, &state).await;
                // Refinement is pointless with empty context.
                phase = if state.retrieved.is_empty() {
                    Phase::Finalize
                } else {
                    Phase::Generate
                };
            }
            Phase::Generate => {
                state = nodes::generate_node(answerer, state).await;
                emit(events, Phase::Generate, &state).await;
                phase = Phase::Validate;
            }
            Phase::Validate => {
                state = nodes::validate_node(judge, state).await;
                emit(events, Phase::Validate, &state).await;
                phase = if state.validation_score < cfg.validation_threshold
                    && state.iteration_count < cfg.max_iterations
                {
                    Phase::Refine
                } else {
                    Phase::Finalize
                };
            }
            Phase::Refine => {
                state = nodes::refine_node(engine, answerer, cfg, state).await?;
                emit(events, Phase::Refine, &state).await;
                phase = Phase::Validate;
            }
            Phase::Finalize => {
                state = nodes::finalize_node(state);
                emit(events, Phase::Finalize, &state).await;
                return Ok(state);
            }
        }
    }
}
