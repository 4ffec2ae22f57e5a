//! Retrieval: similarity scoring and the threshold/fallback policy.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, trace};

use crate::chunk::{Chunk, MetadataFilter, RetrievalResult, ScoredChunk};
use crate::config::{SearchMode, SearchOptions};
use crate::embed::CachedEmbedder;
use crate::errors::RetrievalError;
use crate::index::{QueryMatch, VectorIndex};
use crate::strategy::ScoringStrategy;

/// Embeds the query, searches the index, and applies the threshold
/// policy. Scores are cosine similarities `s = 1 - d`.
///
/// Threshold policy (load-bearing, pinned by tests):
/// - `score_threshold <= 0` keeps every candidate the index returned;
/// - otherwise a candidate is kept when `s >= score_threshold`, and the
///   single highest-scoring candidate is kept **even below threshold**,
///   so a non-empty index never produces an empty result. A usability
///   trade-off over strict filtering, preserved deliberately.
///
/// # Errors
/// Embedding failure or index unavailability aborts the whole call.
pub async fn retrieve(
    index: &dyn VectorIndex,
    embedder: &CachedEmbedder,
    strategy: Option<&dyn ScoringStrategy>,
    query: &str,
    top_k: usize,
    score_threshold: f32,
    filter: Option<&MetadataFilter>,
    options: &SearchOptions,
) -> Result<RetrievalResult, RetrievalError> {
    trace!(
        "retrieve::retrieve top_k={top_k} threshold={score_threshold} mode={}",
        options.mode.as_str()
    );

    let query_vector = embedder.embed(query).await?;

    let matches = index.query(query_vector, top_k, filter).await?;
    debug!("index returned {} candidates", matches.len());

    let mut candidates: Vec<ScoredChunk> = matches.into_iter().map(scored_from_match).collect();

    if options.mode == SearchMode::Hybrid {
        if let Some(strategy) = strategy {
            let alpha = options.alpha.unwrap_or(0.5);
            strategy.rescore(query, &mut candidates, alpha);
            // Stable sort: equal scores keep the index's order.
            candidates.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    let kept = apply_threshold_policy(candidates, score_threshold);

    trace!("retrieve::retrieve kept={}", kept.len());
    Ok(RetrievalResult::from_scored(query, kept))
}

/// Applies the threshold policy. `candidates` must already be in
/// descending-score order.
fn apply_threshold_policy(candidates: Vec<ScoredChunk>, score_threshold: f32) -> Vec<ScoredChunk> {
    if score_threshold <= 0.0 {
        return candidates;
    }

    let mut kept = Vec::with_capacity(candidates.len());
    for (idx, candidate) in candidates.into_iter().enumerate() {
        if candidate.score >= score_threshold {
            kept.push(candidate);
        } else if idx == 0 {
            // Keep the best candidate even below threshold so the caller
            // always has something to work with.
            debug!(
                "keeping top candidate below threshold: score={} threshold={}",
                candidate.score, score_threshold
            );
            kept.push(candidate);
        } else {
            trace!("dropping candidate below threshold: score={}", candidate.score);
        }
    }
    kept
}

/// Converts an index match into a scored chunk: `similarity = 1 - distance`.
fn scored_from_match(m: QueryMatch) -> ScoredChunk {
    let score = 1.0 - m.distance;
    let (source, position) = source_and_position(&m.metadata);
    ScoredChunk {
        chunk: Chunk {
            content: m.document,
            metadata: m.metadata,
            embedding: None,
            chunk_id: m.id,
            source,
            position,
        },
        score,
    }
}

fn source_and_position(metadata: &BTreeMap<String, Value>) -> (String, usize) {
    let source = metadata
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let position = metadata
        .get("position")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;
    (source, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new("text", id, "src", 0),
            score,
        }
    }

    #[test]
    fn zero_threshold_keeps_everything() {
        let kept = apply_threshold_policy(vec![scored("a", 0.9), scored("b", 0.1)], 0.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn negative_threshold_keeps_everything() {
        let kept = apply_threshold_policy(vec![scored("a", 0.2)], -1.0);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn top_candidate_survives_below_threshold() {
        let kept = apply_threshold_policy(vec![scored("a", 0.3), scored("b", 0.2)], 0.7);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk.chunk_id, "a");
    }

    #[test]
    fn later_candidates_below_threshold_are_dropped() {
        let kept =
            apply_threshold_policy(vec![scored("a", 0.9), scored("b", 0.5), scored("c", 0.8)], 0.7);
        let ids: Vec<&str> = kept.iter().map(|s| s.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn similarity_is_one_minus_distance() {
        let m = QueryMatch {
            id: "a".into(),
            distance: 0.25,
            document: "text".into(),
            metadata: BTreeMap::new(),
        };
        let sc = scored_from_match(m);
        assert!((sc.score - 0.75).abs() < 1e-6);
    }
}
