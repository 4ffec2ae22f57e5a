//! Optional scoring strategies applied on top of vector similarity.
//!
//! Hybrid retrieval and re-ranking are extension points, not part of the
//! core contract: a strategy rescales the candidates' scores in place
//! and the engine re-sorts afterwards. A cross-encoder re-ranker would
//! be another implementation of the same trait.

use crate::chunk::ScoredChunk;

/// Rescoring hook consulted in hybrid search mode.
pub trait ScoringStrategy: Send + Sync {
    /// Rewrites `score` on each candidate. The engine re-sorts by
    /// descending score (stable) after the call.
    fn rescore(&self, query: &str, candidates: &mut [ScoredChunk], alpha: f32);
}

/// Blends vector similarity with a lexical token-overlap signal:
/// `score = alpha * vector + (1 - alpha) * lexical`.
///
/// The lexical signal is the fraction of distinct query tokens that
/// appear in the chunk content (case-insensitive). Deliberately cheap:
/// it sharpens keyword-heavy queries without an extra index.
#[derive(Default)]
pub struct LexicalBlend;

impl LexicalBlend {
    fn lexical_score(query: &str, content: &str) -> f32 {
        let content_lower = content.to_lowercase();
        let content_tokens: std::collections::HashSet<&str> =
            content_lower.split_whitespace().collect();

        let query_lower = query.to_lowercase();
        let query_tokens: Vec<&str> = query_lower
            .split_whitespace()
            .collect::<std::collections::HashSet<&str>>()
            .into_iter()
            .collect();

        if query_tokens.is_empty() {
            return 0.0;
        }
        let hits = query_tokens
            .iter()
            .filter(|t| content_tokens.contains(**t))
            .count();
        hits as f32 / query_tokens.len() as f32
    }
}

impl ScoringStrategy for LexicalBlend {
    fn rescore(&self, query: &str, candidates: &mut [ScoredChunk], alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        for c in candidates.iter_mut() {
            let lexical = Self::lexical_score(query, &c.chunk.content);
            c.score = alpha * c.score + (1.0 - alpha) * lexical;
        }
    }
}
