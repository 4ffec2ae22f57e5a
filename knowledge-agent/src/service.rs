//! Service-level request/response projection.
//!
//! Maps a [`crate::state::AgentOutcome`] to the response record the
//! surrounding system consumes: answer text, cited sources with content
//! previews, the validation score, and run metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::AgentOutcome;

/// Maximum characters of chunk content carried in a source preview.
const SOURCE_PREVIEW_CHARS: usize = 200;

/// Incoming query with optional per-request overrides.
#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Overrides the configured `top_k` when set.
    pub top_k: Option<usize>,
    /// Overrides the configured `score_threshold` when set.
    pub score_threshold: Option<f32>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            score_threshold: None,
        }
    }
}

/// One cited source in a response.
#[derive(Clone, Debug, Serialize)]
pub struct SourceInfo {
    pub chunk_id: String,
    /// Content preview, truncated for transport.
    pub content: String,
    pub source: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Final answer with sources and diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceInfo>,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Projects an outcome into a response: sources are the retrieved docs
/// that were cited (all of them when the citation set is empty), with
/// content previews truncated to 200 characters.
pub fn to_response(outcome: AgentOutcome) -> QueryResponse {
    let cited: std::collections::HashSet<&str> =
        outcome.citations.iter().map(String::as_str).collect();

    let sources: Vec<SourceInfo> = outcome
        .retrieved
        .iter()
        .filter(|doc| cited.is_empty() || cited.contains(doc.chunk_id.as_str()))
        .map(|doc| SourceInfo {
            chunk_id: doc.chunk_id.clone(),
            content: preview(&doc.content),
            source: doc
                .metadata
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            score: doc.score,
            metadata: doc.metadata.clone(),
        })
        .collect();

    let mut metadata = Map::new();
    metadata.insert(
        "iteration_count".to_string(),
        Value::from(outcome.iteration_count),
    );
    metadata.insert(
        "citations_count".to_string(),
        Value::from(outcome.citations.len()),
    );

    QueryResponse {
        answer: outcome.response,
        sources,
        score: outcome.validation_score,
        metadata,
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > SOURCE_PREVIEW_CHARS {
        let cut: String = content.chars().take(SOURCE_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RetrievedDoc;

    fn outcome_with(citations: Vec<&str>, docs: Vec<&str>) -> AgentOutcome {
        AgentOutcome {
            response: "answer".into(),
            citations: citations.into_iter().map(String::from).collect(),
            retrieved: docs
                .into_iter()
                .map(|id| RetrievedDoc {
                    content: format!("content of {id}"),
                    metadata: Map::new(),
                    score: 0.9,
                    chunk_id: id.to_string(),
                })
                .collect(),
            validation_score: 0.9,
            iteration_count: 0,
            metadata: Map::new(),
        }
    }

    #[test]
    fn sources_are_filtered_by_citations() {
        let resp = to_response(outcome_with(vec!["a"], vec!["a", "b"]));
        assert_eq!(resp.sources.len(), 1);
        assert_eq!(resp.sources[0].chunk_id, "a");
    }

    #[test]
    fn empty_citations_include_all_sources() {
        let resp = to_response(outcome_with(vec![], vec!["a", "b"]));
        assert_eq!(resp.sources.len(), 2);
    }

    #[test]
    fn long_content_is_truncated_with_ellipsis() {
        let long = "x".repeat(500);
        let truncated = preview(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), SOURCE_PREVIEW_CHARS + 3);

        assert_eq!(preview("short"), "short");
    }
}
