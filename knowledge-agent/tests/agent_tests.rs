//! Pipeline tests over the in-memory index, a deterministic embedder,
//! and scripted model capabilities. No network.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use knowledge_agent::{
    AgentConfig, AgentEvent, ChatMessage, KnowledgeAgent, LanguageModel, ModelError, Phase,
    QueryRequest,
};
use knowledge_agent::model::ModelFuture;
use rag_engine::RagEngine;
use rag_engine::chunk::Chunk;
use rag_engine::config::EngineConfig;
use rag_engine::embed::{EmbedFuture, EmbeddingsProvider};
use rag_engine::index::memory::MemoryIndex;

const DIM: usize = 32;

/// Deterministic bag-of-words embedder (see rag-engine tests).
struct HashEmbedder;

impl HashEmbedder {
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
        let v = Self::embed_text(text);
        Box::pin(async move { Ok(v) })
    }

    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        let out: Vec<Vec<f32>> = texts.iter().map(|t| Self::embed_text(t)).collect();
        Box::pin(async move { Ok(out) })
    }

    fn model_id(&self) -> &str {
        "hash-embedder"
    }

    fn batch_limit(&self) -> usize {
        8
    }
}

/// Model that always replies with the same text.
struct FixedModel {
    reply: String,
}

impl FixedModel {
    fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
        })
    }
}

impl LanguageModel for FixedModel {
    fn generate<'a>(&'a self, _messages: &'a [ChatMessage]) -> ModelFuture<'a> {
        let reply = self.reply.clone();
        Box::pin(async move { Ok(reply) })
    }
}

/// Model that always fails with a given message.
struct FailingModel {
    message: String,
}

impl FailingModel {
    fn new(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            message: message.into(),
        })
    }
}

impl LanguageModel for FailingModel {
    fn generate<'a>(&'a self, _messages: &'a [ChatMessage]) -> ModelFuture<'a> {
        let message = self.message.clone();
        Box::pin(async move { Err(ModelError { message }) })
    }
}

fn engine() -> Arc<RagEngine> {
    let mut cfg = EngineConfig::new_default("documents");
    cfg.query_cache_ttl = Duration::from_millis(10);
    Arc::new(RagEngine::new(cfg, Arc::new(MemoryIndex::new()), Arc::new(HashEmbedder), None).unwrap())
}

async fn engine_with_corpus(texts: &[(&str, &str)]) -> Arc<RagEngine> {
    let engine = engine();
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(i, (id, text))| Chunk::new(*text, *id, "corpus.txt", i))
        .collect();
    engine.add_documents(chunks).await.unwrap();
    engine
}

fn agent(
    engine: Arc<RagEngine>,
    answerer: Arc<dyn LanguageModel>,
    judge: Arc<dyn LanguageModel>,
    config: AgentConfig,
) -> KnowledgeAgent {
    KnowledgeAgent::new(engine, answerer, judge, config).unwrap()
}

#[tokio::test]
async fn paris_scenario_accepts_first_answer() {
    let engine = engine_with_corpus(&[("paris", "Paris is the capital of France.")]).await;

    // Direct retrieval first: the chunk must come back with "Paris".
    let result = engine
        .retrieve(
            "What is the capital of France?",
            5,
            0.0,
            None,
            Default::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.total_results, 1);
    assert!(result.chunks[0].content.contains("Paris"));

    let config = AgentConfig {
        score_threshold: 0.0,
        validation_threshold: 0.7,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FixedModel::new("Paris is the capital of France. [chunk_id: paris]"),
        FixedModel::new("0.9"),
        config,
    );

    let outcome = agent.process("What is the capital of France?").await.unwrap();
    assert_eq!(outcome.iteration_count, 0, "no refinement triggered");
    assert!(!outcome.citations.is_empty());
    assert!((outcome.validation_score - 0.9).abs() < 1e-6);
    assert_eq!(
        outcome.metadata.get("finalized"),
        Some(&serde_json::Value::Bool(true))
    );
}

#[tokio::test]
async fn zero_judge_runs_exactly_max_iterations() {
    let engine = engine_with_corpus(&[("c1", "some indexed content")]).await;
    let config = AgentConfig {
        max_iterations: 3,
        score_threshold: 0.0,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FixedModel::new("an answer"),
        FixedModel::new("0.0"),
        config,
    );

    let outcome = agent.process("some question").await.unwrap();
    assert_eq!(outcome.iteration_count, 3, "exactly max_iterations refines");
}

#[tokio::test]
async fn refinement_never_duplicates_chunk_ids() {
    let engine = engine_with_corpus(&[
        ("c1", "first chunk about the topic"),
        ("c2", "second chunk about the topic"),
        ("c3", "third chunk about the topic"),
    ])
    .await;
    let config = AgentConfig {
        max_iterations: 2,
        top_k: 2,
        score_threshold: 0.0,
        ..AgentConfig::default()
    };
    // Zero judge forces every refinement; overlapping retrievals must
    // not duplicate entries.
    let agent = agent(
        engine,
        FixedModel::new("an answer"),
        FixedModel::new("0.0"),
        config,
    );

    let outcome = agent.process("chunk about the topic").await.unwrap();
    let ids: Vec<&str> = outcome
        .retrieved
        .iter()
        .map(|d| d.chunk_id.as_str())
        .collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "retrieved must stay deduplicated");
}

#[tokio::test]
async fn empty_index_finalizes_with_canned_response() {
    let agent = agent(
        engine(),
        FixedModel::new("should never run"),
        FixedModel::new("0.9"),
        AgentConfig::default(),
    );

    let outcome = agent.process("anything").await.unwrap();
    assert_eq!(outcome.iteration_count, 0);
    assert_eq!(outcome.validation_score, 0.0);
    assert!(outcome.citations.is_empty());
    assert!(outcome.response.contains("couldn't find relevant information"));
}

#[tokio::test]
async fn unparsable_judge_output_scores_neutral() {
    let engine = engine_with_corpus(&[("c1", "content")]).await;
    let config = AgentConfig {
        max_iterations: 1,
        score_threshold: 0.0,
        validation_threshold: 0.7,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FixedModel::new("an answer"),
        FixedModel::new("looks good to me!"),
        config,
    );

    let outcome = agent.process("question").await.unwrap();
    // 0.5 < 0.7, so one (bounded) refinement happens, then finalize.
    assert_eq!(outcome.iteration_count, 1);
    assert!((outcome.validation_score - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn out_of_range_judge_score_is_clamped() {
    let engine = engine_with_corpus(&[("c1", "content")]).await;
    let config = AgentConfig {
        score_threshold: 0.0,
        validation_threshold: 0.7,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FixedModel::new("an answer"),
        FixedModel::new("1.7"),
        config,
    );

    let outcome = agent.process("question").await.unwrap();
    assert_eq!(outcome.validation_score, 1.0);
    assert_eq!(outcome.iteration_count, 0);
}

#[tokio::test]
async fn generation_failure_produces_diagnostic_response() {
    let engine = engine_with_corpus(&[("c1", "content")]).await;
    let config = AgentConfig {
        max_iterations: 1,
        score_threshold: 0.0,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FailingModel::new("HTTP 401: invalid api key"),
        FixedModel::new("0.0"),
        config,
    );

    let outcome = agent.process("question").await.unwrap();
    assert!(
        outcome.response.contains("API key"),
        "diagnostic response expected, got: {}",
        outcome.response
    );
    assert_eq!(outcome.iteration_count, 1, "failure still refines, bounded");
}

#[tokio::test]
async fn stream_emits_transitions_then_end() {
    let engine = engine_with_corpus(&[("c1", "streamed content")]).await;
    let config = AgentConfig {
        score_threshold: 0.0,
        validation_threshold: 0.7,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FixedModel::new("an answer"),
        FixedModel::new("0.9"),
        config,
    );

    let mut rx = agent.process_stream("question");
    let mut phases = Vec::new();
    let mut saw_end = false;
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::Transition { phase, .. } => phases.push(phase),
            AgentEvent::Error { message } => panic!("unexpected error event: {message}"),
            AgentEvent::End => {
                saw_end = true;
                break;
            }
        }
    }

    assert!(saw_end, "stream must end with the End marker");
    assert_eq!(
        phases,
        vec![Phase::Retrieve, Phase::Generate, Phase::Validate, Phase::Finalize]
    );
}

#[tokio::test]
async fn stream_snapshot_sequence_grows_monotonically() {
    let engine = engine_with_corpus(&[("c1", "a"), ("c2", "b")]).await;
    let config = AgentConfig {
        max_iterations: 1,
        top_k: 1,
        score_threshold: 0.0,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FixedModel::new("an answer"),
        FixedModel::new("0.0"),
        config,
    );

    let mut rx = agent.process_stream("question");
    let mut last_retrieved = 0usize;
    while let Some(event) = rx.recv().await {
        if let AgentEvent::Transition { state, .. } = event {
            assert!(state.retrieved.len() >= last_retrieved);
            last_retrieved = state.retrieved.len();
        }
    }
}

#[tokio::test]
async fn stream_emits_error_event_before_end_marker() {
    // An embedder that always fails makes the first retrieval fatal.
    struct FailingEmbedder;
    impl EmbeddingsProvider for FailingEmbedder {
        fn embed<'a>(&'a self, _text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
            Box::pin(async {
                Err(rag_engine::EmbeddingError::Provider("provider down".into()))
            })
        }
        fn embed_batch<'a>(&'a self, _texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
            Box::pin(async {
                Err(rag_engine::EmbeddingError::Provider("provider down".into()))
            })
        }
        fn model_id(&self) -> &str {
            "failing-embedder"
        }
        fn batch_limit(&self) -> usize {
            1
        }
    }

    let engine = Arc::new(
        RagEngine::new(
            EngineConfig::new_default("documents"),
            Arc::new(MemoryIndex::new()),
            Arc::new(FailingEmbedder),
            None,
        )
        .unwrap(),
    );
    let agent = agent(
        engine,
        FixedModel::new("unused"),
        FixedModel::new("0.9"),
        AgentConfig::default(),
    );

    let mut rx = agent.process_stream("question");
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.last(), Some(AgentEvent::End)));
    assert!(
        matches!(
            &events[events.len() - 2],
            AgentEvent::Error { message } if message.contains("provider down")
        ),
        "error must be emitted as the event before the marker"
    );
}

#[tokio::test]
async fn answer_reports_missing_corpus() {
    let agent = agent(
        engine(),
        FixedModel::new("unused"),
        FixedModel::new("0.9"),
        AgentConfig::default(),
    );

    let response = agent.answer(QueryRequest::new("anything")).await;
    assert!(response.answer.contains("No documents are indexed"));
    assert_eq!(response.score, 0.0);
    assert_eq!(
        response.metadata.get("error"),
        Some(&serde_json::Value::String("no_documents".into()))
    );
}

#[tokio::test]
async fn answer_returns_cited_sources_with_previews() {
    let engine = engine_with_corpus(&[("paris", "Paris is the capital of France.")]).await;
    let config = AgentConfig {
        score_threshold: 0.0,
        ..AgentConfig::default()
    };
    let agent = agent(
        engine,
        FixedModel::new("Paris. [chunk_id: paris]"),
        FixedModel::new("0.9"),
        config,
    );

    let mut request = QueryRequest::new("What is the capital of France?");
    request.top_k = Some(3);
    let response = agent.answer(request).await;

    assert!(!response.sources.is_empty());
    assert_eq!(response.sources[0].chunk_id, "paris");
    assert_eq!(response.sources[0].source, "corpus.txt");
    assert!((response.score - 0.9).abs() < 1e-6);
}
