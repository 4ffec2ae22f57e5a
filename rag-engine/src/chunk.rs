//! Core data models used by the library.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A unit of indexed document text with metadata and optional embedding.
///
/// Produced by the (external) ingestion pipeline; immutable once
/// embedded and indexed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// The text content of the chunk.
    pub content: String,
    /// Metadata associated with the chunk.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Vector embedding for semantic search, if precomputed.
    pub embedding: Option<Vec<f32>>,
    /// Unique identifier within the corpus.
    pub chunk_id: String,
    /// Source document identifier.
    pub source: String,
    /// Position of the chunk in the source document.
    pub position: usize,
}

impl Chunk {
    /// Builds a chunk without a precomputed embedding. The `source` and
    /// `position` are mirrored into metadata so the index payload can
    /// filter on them.
    pub fn new(
        content: impl Into<String>,
        chunk_id: impl Into<String>,
        source: impl Into<String>,
        position: usize,
    ) -> Self {
        let source = source.into();
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), Value::String(source.clone()));
        metadata.insert("position".to_string(), Value::from(position));
        Self {
            content: content.into(),
            metadata,
            embedding: None,
            chunk_id: chunk_id.into(),
            source,
            position,
        }
    }
}

/// Similarity of a chunk to a specific query. Ephemeral: produced per
/// retrieval call, never persisted.
#[derive(Clone, Debug)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Result of a retrieval operation.
///
/// Invariant: `chunks.len() == scores.len() == total_results`; ordering
/// is by descending score, ties broken by index insertion order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The query that was used for retrieval.
    pub query: String,
    /// Retrieved chunks, best first.
    pub chunks: Vec<Chunk>,
    /// Relevance scores, parallel to `chunks`.
    pub scores: Vec<f32>,
    /// Total number of results returned.
    pub total_results: usize,
}

impl RetrievalResult {
    /// Builds a result from scored chunks, preserving their order.
    pub fn from_scored(query: impl Into<String>, scored: Vec<ScoredChunk>) -> Self {
        let mut chunks = Vec::with_capacity(scored.len());
        let mut scores = Vec::with_capacity(scored.len());
        for sc in scored {
            chunks.push(sc.chunk);
            scores.push(sc.score);
        }
        let total_results = chunks.len();
        Self {
            query: query.into(),
            chunks,
            scores,
            total_results,
        }
    }
}

/// Equality filter on chunk metadata.
#[derive(Clone, Debug, Default)]
pub struct MetadataFilter {
    /// Exact match on a field, e.g. `("source", "report.pdf")`.
    pub equals: Vec<(String, Value)>,
}

impl MetadataFilter {
    /// Filter matching a single `source` value.
    pub fn source(source_id: impl Into<String>) -> Self {
        Self {
            equals: vec![("source".to_string(), Value::String(source_id.into()))],
        }
    }

    /// True when the given metadata map satisfies every equality clause.
    pub fn matches(&self, metadata: &BTreeMap<String, Value>) -> bool {
        self.equals
            .iter()
            .all(|(k, v)| metadata.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_mirrors_source_into_metadata() {
        let c = Chunk::new("text", "c1", "a.pdf", 3);
        assert_eq!(c.metadata.get("source"), Some(&Value::String("a.pdf".into())));
        assert_eq!(c.metadata.get("position"), Some(&Value::from(3)));
    }

    #[test]
    fn result_invariant_holds() {
        let scored = vec![
            ScoredChunk {
                chunk: Chunk::new("a", "c1", "s", 0),
                score: 0.9,
            },
            ScoredChunk {
                chunk: Chunk::new("b", "c2", "s", 1),
                score: 0.4,
            },
        ];
        let r = RetrievalResult::from_scored("q", scored);
        assert_eq!(r.chunks.len(), r.scores.len());
        assert_eq!(r.total_results, 2);
    }

    #[test]
    fn source_filter_matches_metadata() {
        let c = Chunk::new("a", "c1", "a.pdf", 0);
        assert!(MetadataFilter::source("a.pdf").matches(&c.metadata));
        assert!(!MetadataFilter::source("b.pdf").matches(&c.metadata));
    }
}
