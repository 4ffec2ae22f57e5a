//! Pipeline node functions.
//!
//! Each node takes the [`AgentState`] by value and returns the updated
//! value. Retrieval-side failures propagate as [`AgentError`];
//! generation and validation failures are absorbed into the state so
//! the machine can still finalize.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use rag_engine::RagEngine;
use rag_engine::config::SearchOptions;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::model::LanguageModel;
use crate::prompt;
use crate::state::{AgentState, RetrievedDoc};

/// Threshold multiplier applied when re-retrieving during refinement:
/// widen recall to find material that might raise the score.
pub const REFINE_THRESHOLD_MULTIPLIER: f32 = 0.7;

fn search_options(cfg: &AgentConfig) -> SearchOptions {
    SearchOptions {
        mode: cfg.search_type,
        alpha: cfg.alpha,
    }
}

/// RETRIEVE: populate `retrieved` (replacing) and derive context and
/// citations. An empty result short-circuits to the canned "no relevant
/// information" response with a zero score; the machine then finalizes.
pub(crate) async fn retrieve_node(
    engine: &RagEngine,
    cfg: &AgentConfig,
    mut state: AgentState,
) -> Result<AgentState, AgentError> {
    info!(
        "retrieving documents: top_k={} score_threshold={}",
        cfg.top_k, cfg.score_threshold
    );

    let result = engine
        .retrieve(
            &state.query,
            cfg.top_k,
            cfg.score_threshold,
            None,
            search_options(cfg),
        )
        .await?;

    state.retrieved = result
        .chunks
        .iter()
        .zip(result.scores.iter())
        .map(|(chunk, score)| RetrievedDoc {
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone().into_iter().collect(),
            score: *score,
            chunk_id: chunk.chunk_id.clone(),
        })
        .collect();

    if state.retrieved.is_empty() {
        warn!("no documents retrieved for query");
        state.context = prompt::NO_CONTEXT.to_string();
        state.response = prompt::NO_RELEVANT_RESPONSE.to_string();
        state.citations = Vec::new();
        state.validation_score = 0.0;
        return Ok(state);
    }

    state.context = prompt::build_context(&state.retrieved);
    state.citations = prompt::citations_of(&state.retrieved);

    info!("documents retrieved: count={}", state.retrieved.len());
    Ok(state)
}

/// GENERATE: produce a response over the assembled context. Provider
/// failure is absorbed: the response becomes a diagnostic string and the
/// validation score is forced to 0.0 so the loop will not accept it.
/// Refinement still runs afterwards, which doubles as a retry.
pub(crate) async fn generate_node(
    answerer: &dyn LanguageModel,
    mut state: AgentState,
) -> AgentState {
    info!("generating response: iteration={}", state.iteration_count);

    let messages = prompt::answer_messages(&state.context, &state.query);
    match answerer.generate(&messages).await {
        Ok(text) => {
            debug!("response generated: length={}", text.len());
            state.response = text;
        }
        Err(e) => {
            warn!("generation failed: {e}");
            state.response = diagnose_model_error(&e.message);
            state.validation_score = 0.0;
        }
    }
    state
}

/// VALIDATE: score the `(query, context, response)` triple in [0, 1].
/// Judge failure and unparsable output both default to the neutral 0.5
/// rather than failing the pipeline; out-of-range values are clamped.
pub(crate) async fn validate_node(judge: &dyn LanguageModel, mut state: AgentState) -> AgentState {
    info!("validating response");

    let messages = prompt::judge_messages(&state.query, &state.context, &state.response);
    let raw = match judge.generate(&messages).await {
        Ok(text) => text,
        Err(e) => {
            warn!("validation call failed: {e}");
            "0.5".to_string()
        }
    };

    state.validation_score = parse_score(&raw);
    info!("response validated: score={}", state.validation_score);
    state
}

/// REFINE: widen retrieval (`top_k * 2`, relaxed threshold), merge new
/// chunks deduplicated by chunk id (never replacing existing entries),
/// rebuild the context, and regenerate.
pub(crate) async fn refine_node(
    engine: &RagEngine,
    answerer: &dyn LanguageModel,
    cfg: &AgentConfig,
    mut state: AgentState,
) -> Result<AgentState, AgentError> {
    state.iteration_count += 1;
    let relaxed_threshold = cfg.score_threshold * REFINE_THRESHOLD_MULTIPLIER;

    info!(
        "refining response: iteration={} relaxed_threshold={}",
        state.iteration_count, relaxed_threshold
    );

    let result = engine
        .retrieve(
            &state.query,
            cfg.top_k * 2,
            relaxed_threshold,
            None,
            search_options(cfg),
        )
        .await?;

    let existing: std::collections::HashSet<&str> = state
        .retrieved
        .iter()
        .map(|doc| doc.chunk_id.as_str())
        .collect();
    let new_docs: Vec<RetrievedDoc> = result
        .chunks
        .iter()
        .zip(result.scores.iter())
        .filter(|(chunk, _)| !existing.contains(chunk.chunk_id.as_str()))
        .map(|(chunk, score)| RetrievedDoc {
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone().into_iter().collect(),
            score: *score,
            chunk_id: chunk.chunk_id.clone(),
        })
        .collect();

    debug!("refinement added {} new documents", new_docs.len());
    state.retrieved.extend(new_docs);

    state.context = prompt::build_context(&state.retrieved);
    state.citations = prompt::citations_of(&state.retrieved);

    Ok(generate_node(answerer, state).await)
}

/// FINALIZE: freeze run metadata. No further retrieval or generation.
pub(crate) fn finalize_node(mut state: AgentState) -> AgentState {
    info!("finalizing response: score={}", state.validation_score);

    let mut metadata = Map::new();
    metadata.insert("finalized".to_string(), Value::Bool(true));
    metadata.insert(
        "validation_score".to_string(),
        serde_json::json!(state.validation_score),
    );
    metadata.insert(
        "iteration_count".to_string(),
        Value::from(state.iteration_count),
    );
    metadata.insert(
        "citations_count".to_string(),
        Value::from(state.citations.len()),
    );
    state.metadata = metadata;

    state
}

/// Parses the judge output; unparsable text scores the neutral 0.5 and
/// any parsed value is clamped into [0, 1].
fn parse_score(raw: &str) -> f32 {
    match raw.trim().parse::<f32>() {
        Ok(score) => score.clamp(0.0, 1.0),
        Err(_) => {
            warn!("validation score parse failed: {raw:?}");
            0.5
        }
    }
}

/// Maps a provider error message onto operator-actionable response text,
/// so failures can be diagnosed from the response alone.
pub(crate) fn diagnose_model_error(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("api key") || lower.contains("authentication") || lower.contains("unauthorized")
    {
        "Error: API key is not configured correctly. Check the credentials in the backend \
         environment."
            .to_string()
    } else if lower.contains("rate limit") || lower.contains("429") {
        "Rate limit exceeded. Please try again in a few moments.".to_string()
    } else if lower.contains("model")
        && (lower.contains("not found") || lower.contains("decommissioned"))
    {
        "Error: The configured model is not available. Check the model name in the backend \
         environment."
            .to_string()
    } else {
        format!("Error generating response: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_score_accepts_plain_floats() {
        assert!((parse_score("0.85") - 0.85).abs() < 1e-6);
        assert!((parse_score("  0.2\n") - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parse_score_clamps_out_of_range() {
        assert_eq!(parse_score("1.7"), 1.0);
        assert_eq!(parse_score("-0.3"), 0.0);
    }

    #[test]
    fn parse_score_defaults_to_neutral_on_garbage() {
        assert_eq!(parse_score("great answer!"), 0.5);
        assert_eq!(parse_score(""), 0.5);
    }

    #[test]
    fn diagnose_recognizes_auth_failures() {
        let msg = diagnose_model_error("HTTP 401: invalid API key provided");
        assert!(msg.contains("API key"));
    }

    #[test]
    fn diagnose_recognizes_rate_limits() {
        let msg = diagnose_model_error("HTTP 429: rate limit reached");
        assert!(msg.contains("Rate limit"));
    }

    #[test]
    fn diagnose_recognizes_missing_models() {
        let msg = diagnose_model_error("model `x` not found");
        assert!(msg.contains("model is not available"));
    }

    #[test]
    fn diagnose_falls_back_to_raw_message() {
        let msg = diagnose_model_error("connection reset by peer");
        assert!(msg.contains("connection reset by peer"));
    }
}
