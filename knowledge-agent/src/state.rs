//! Agent state threaded through the pipeline.
//!
//! The state is an explicit input/output record: every node function
//! takes it by value and returns the updated value. One state instance
//! is owned exclusively by the request that created it and discarded
//! after the outcome is returned or streamed.

use serde::Serialize;
use serde_json::{Map, Value};

/// One retrieved document as carried through the pipeline.
#[derive(Clone, Debug, Serialize)]
pub struct RetrievedDoc {
    pub content: String,
    pub metadata: Map<String, Value>,
    pub score: f32,
    pub chunk_id: String,
}

/// Mutable record threaded through the state machine.
#[derive(Clone, Debug, Serialize)]
pub struct AgentState {
    /// User query.
    pub query: String,
    /// Retrieved documents; append-only across refinement iterations,
    /// deduplicated by `chunk_id`.
    pub retrieved: Vec<RetrievedDoc>,
    /// Context assembled from retrieved docs; rebuilt before each
    /// generation.
    pub context: String,
    /// Generated response.
    pub response: String,
    /// Quality score of the response.
    pub validation_score: f32,
    /// Number of refinement iterations performed.
    pub iteration_count: u32,
    /// Chunk ids included in the generation context.
    pub citations: Vec<String>,
    /// Diagnostic/finalization info.
    pub metadata: Map<String, Value>,
}

impl AgentState {
    /// Fresh state for an incoming query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            retrieved: Vec::new(),
            context: String::new(),
            response: String::new(),
            validation_score: 0.0,
            iteration_count: 0,
            citations: Vec::new(),
            metadata: Map::new(),
        }
    }
}

/// Pipeline phases. `Finalize` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Retrieve,
    Generate,
    Validate,
    Refine,
    Finalize,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Retrieve => "retrieve",
            Phase::Generate => "generate",
            Phase::Validate => "validate",
            Phase::Refine => "refine",
            Phase::Finalize => "finalize",
        }
    }
}

/// One streamed pipeline event.
///
/// Consumers observe one `Transition` per completed phase and always an
/// `End` marker last; a fatal error is emitted as an `Error` event
/// before the marker.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum AgentEvent {
    /// A phase completed; carries a snapshot of the state after it.
    Transition { phase: Phase, state: AgentState },
    /// The pipeline aborted.
    Error { message: String },
    /// End-of-stream marker.
    End,
}

/// Final projection of a pipeline run.
#[derive(Clone, Debug, Serialize)]
pub struct AgentOutcome {
    pub response: String,
    pub citations: Vec<String>,
    pub retrieved: Vec<RetrievedDoc>,
    pub validation_score: f32,
    pub iteration_count: u32,
    pub metadata: Map<String, Value>,
}

impl From<AgentState> for AgentOutcome {
    fn from(state: AgentState) -> Self {
        Self {
            response: state.response,
            citations: state.citations,
            retrieved: state.retrieved,
            validation_score: state.validation_score,
            iteration_count: state.iteration_count,
            metadata: state.metadata,
        }
    }
}
