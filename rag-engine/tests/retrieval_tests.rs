//! Engine-level tests over the in-memory index and a deterministic
//! embedder. No network, no external services.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rag_engine::RagEngine;
use rag_engine::chunk::Chunk;
use rag_engine::config::{EngineConfig, SearchMode, SearchOptions};
use rag_engine::embed::{EmbedFuture, EmbeddingsProvider};
use rag_engine::errors::EmbeddingError;
use rag_engine::index::memory::MemoryIndex;
use rag_engine::strategy::LexicalBlend;

const DIM: usize = 32;

/// Deterministic bag-of-words embedder: each token hashes into one of
/// `DIM` slots, then the vector is L2-normalized. Identical texts embed
/// identically; overlapping texts land close under cosine.
struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn embed_text(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let mut h = DefaultHasher::new();
            token.hash(&mut h);
            v[(h.finish() % DIM as u64) as usize] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingsProvider for HashEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let v = Self::embed_text(text);
        Box::pin(async move { Ok(v) })
    }

    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        let out: Vec<Vec<f32>> = texts.iter().map(|t| Self::embed_text(t)).collect();
        Box::pin(async move { Ok(out) })
    }

    fn model_id(&self) -> &str {
        "hash-embedder"
    }

    fn batch_limit(&self) -> usize {
        4
    }
}

/// Provider that always fails, for abort-path tests.
struct FailingEmbedder;

impl EmbeddingsProvider for FailingEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        Box::pin(async { Err(EmbeddingError::Provider("provider down".into())) })
    }

    fn embed_batch<'a>(&'a self, _texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(async { Err(EmbeddingError::Provider("provider down".into())) })
    }

    fn model_id(&self) -> &str {
        "failing-embedder"
    }

    fn batch_limit(&self) -> usize {
        4
    }
}

fn engine_with(provider: Arc<dyn EmbeddingsProvider>) -> RagEngine {
    let mut cfg = EngineConfig::new_default("documents");
    cfg.query_cache_ttl = Duration::from_millis(50);
    RagEngine::new(cfg, Arc::new(MemoryIndex::new()), provider, None).unwrap()
}

fn chunk(content: &str, id: &str, source: &str, position: usize) -> Chunk {
    Chunk::new(content, id, source, position)
}

#[tokio::test]
async fn zero_threshold_returns_every_candidate_in_order() {
    let engine = engine_with(Arc::new(HashEmbedder::new()));
    engine
        .add_documents(vec![
            chunk("the capital of France", "c1", "a.txt", 0),
            chunk("completely unrelated text about pottery", "c2", "a.txt", 1),
            chunk("another chunk about France", "c3", "a.txt", 2),
        ])
        .await
        .unwrap();

    let result = engine
        .retrieve("capital of France", 5, 0.0, None, SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.total_results, 3);
    assert_eq!(result.chunks.len(), result.scores.len());
    for pair in result.scores.windows(2) {
        assert!(pair[0] >= pair[1], "scores must be descending");
    }
}

#[tokio::test]
async fn high_threshold_still_keeps_top_candidate() {
    let engine = engine_with(Arc::new(HashEmbedder::new()));
    engine
        .add_documents(vec![
            chunk("wildly unrelated content about pottery", "c1", "a.txt", 0),
            chunk("glazing kilns at high temperature", "c2", "a.txt", 1),
        ])
        .await
        .unwrap();

    let result = engine
        .retrieve("rust lifetimes", 5, 0.99, None, SearchOptions::default())
        .await
        .unwrap();

    // Everything scores below 0.99, but the best candidate survives.
    assert_eq!(result.total_results, 1);
    for (idx, score) in result.scores.iter().enumerate() {
        if idx > 0 {
            assert!(*score >= 0.99);
        }
    }
}

#[tokio::test]
async fn exact_content_query_scores_near_one() {
    let engine = engine_with(Arc::new(HashEmbedder::new()));
    let text = "Paris is the capital of France.";
    engine
        .add_documents(vec![chunk(text, "paris", "geo.txt", 0)])
        .await
        .unwrap();

    let result = engine
        .retrieve(text, 5, 0.0, None, SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.total_results, 1);
    assert!(result.scores[0] > 0.999, "identical text must score ~1.0");
}

#[tokio::test]
async fn add_documents_is_idempotent_per_chunk_id() {
    let engine = engine_with(Arc::new(HashEmbedder::new()));
    let c = chunk("same chunk", "c1", "a.txt", 0);

    engine.add_documents(vec![c.clone()]).await.unwrap();
    let count_first = engine.count().await.unwrap();
    engine.add_documents(vec![c]).await.unwrap();
    let count_second = engine.count().await.unwrap();

    assert_eq!(count_first, 1);
    assert_eq!(count_second, 1);
}

#[tokio::test]
async fn delete_by_source_removes_only_that_source() {
    let engine = engine_with(Arc::new(HashEmbedder::new()));
    engine
        .add_documents(vec![
            chunk("one", "c1", "a.txt", 0),
            chunk("two", "c2", "a.txt", 1),
            chunk("three", "c3", "b.txt", 0),
        ])
        .await
        .unwrap();

    let removed = engine.delete_by_source("a.txt").await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(engine.count().await.unwrap(), 1);

    // Unknown source is a no-op, not an error.
    assert_eq!(engine.delete_by_source("missing.txt").await.unwrap(), 0);
}

#[tokio::test]
async fn embedding_failure_aborts_ingestion_without_writes() {
    let engine = engine_with(Arc::new(FailingEmbedder));
    let err = engine
        .add_documents(vec![chunk("text", "c1", "a.txt", 0)])
        .await;

    assert!(err.is_err());
    assert_eq!(engine.count().await.unwrap(), 0, "no partial writes");
}

#[tokio::test]
async fn embedding_failure_aborts_retrieval() {
    let engine = engine_with(Arc::new(FailingEmbedder));
    let err = engine
        .retrieve("query", 5, 0.0, None, SearchOptions::default())
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn partial_batch_hits_only_embed_the_missing_subset() {
    let provider = Arc::new(HashEmbedder::new());
    let engine = engine_with(provider.clone());

    engine
        .add_documents(vec![chunk("alpha text", "c1", "a.txt", 0)])
        .await
        .unwrap();
    let calls_after_first = provider.calls.load(Ordering::SeqCst);

    // Re-adding the same content plus one new chunk: only the new text
    // reaches the provider.
    engine
        .add_documents(vec![
            chunk("alpha text", "c1", "a.txt", 0),
            chunk("beta text", "c2", "a.txt", 1),
        ])
        .await
        .unwrap();
    let calls_after_second = provider.calls.load(Ordering::SeqCst);

    assert_eq!(calls_after_second - calls_after_first, 1);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let provider = Arc::new(HashEmbedder::new());
    let engine = engine_with(provider.clone());
    engine
        .add_documents(vec![chunk("cached content", "c1", "a.txt", 0)])
        .await
        .unwrap();

    engine
        .retrieve("cached content", 5, 0.0, None, SearchOptions::default())
        .await
        .unwrap();
    let calls_after_first = provider.calls.load(Ordering::SeqCst);

    engine
        .retrieve("cached content", 5, 0.0, None, SearchOptions::default())
        .await
        .unwrap();
    let calls_after_second = provider.calls.load(Ordering::SeqCst);

    assert_eq!(calls_after_first, calls_after_second);
}

#[tokio::test]
async fn large_batches_are_chunked_to_the_provider_limit() {
    let engine = engine_with(Arc::new(HashEmbedder::new()));

    // 10 chunks with a provider batch limit of 4: must still all land.
    let chunks: Vec<Chunk> = (0..10)
        .map(|i| chunk(&format!("chunk number {i}"), &format!("c{i}"), "a.txt", i))
        .collect();
    engine.add_documents(chunks).await.unwrap();
    assert_eq!(engine.count().await.unwrap(), 10);
}

#[tokio::test]
async fn hybrid_mode_blends_lexical_overlap() {
    let mut cfg = EngineConfig::new_default("documents");
    cfg.query_cache_ttl = Duration::from_millis(50);
    let engine = RagEngine::new(
        cfg,
        Arc::new(MemoryIndex::new()),
        Arc::new(HashEmbedder::new()),
        Some(Box::new(LexicalBlend)),
    )
    .unwrap();

    engine
        .add_documents(vec![
            chunk("the quick brown fox", "lex", "a.txt", 0),
            chunk("entirely different words here", "other", "a.txt", 1),
        ])
        .await
        .unwrap();

    let options = SearchOptions {
        mode: SearchMode::Hybrid,
        alpha: Some(0.5),
    };
    let result = engine
        .retrieve("quick brown fox", 5, 0.0, None, options)
        .await
        .unwrap();

    assert_eq!(result.chunks[0].chunk_id, "lex");
}
