use std::error::Error;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use knowledge_agent::{AgentConfig, KnowledgeAgent, QueryRequest, RolesModel};
use llm_service::config::default_config::{
    config_ollama_answer, config_ollama_embedding, config_ollama_judge, config_openai_answer,
    config_openai_embedding,
};
use llm_service::service_roles::LlmServiceRoles;
use llm_service::LlmProvider;
use rag_engine::config::EngineConfig;
use rag_engine::embed::llm_service::{LlmEmbedder, LlmEmbedderConfig};
use rag_engine::index::qdrant::{QdrantIndex, QdrantIndexConfig};
use rag_engine::{DistanceKind, RagEngine, VectorSpace};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file.
    // Fails if .env file not found, not readable or invalid.
    dotenvy::dotenv()?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        eprintln!("usage: kb-ai-backend <question>");
        std::process::exit(2);
    }

    // LLM roles from env: LLM_KIND selects the provider stack.
    let kind = std::env::var("LLM_KIND").unwrap_or_else(|_| "ollama".to_string());
    let svc = match LlmProvider::parse(&kind) {
        Some(LlmProvider::OpenAI) => Arc::new(LlmServiceRoles::new(
            config_openai_answer()?,
            None,
            config_openai_embedding()?,
            Some(10),
        )?),
        _ => Arc::new(LlmServiceRoles::new(
            config_ollama_answer()?,
            Some(config_ollama_judge()?),
            config_ollama_embedding()?,
            Some(10),
        )?),
    };

    let embedding_dim = env_parse("EMBEDDING_DIM", 1024usize);

    // Vector index (Qdrant) + collection bootstrap.
    let index_cfg = QdrantIndexConfig {
        url: std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string()),
        api_key: std::env::var("QDRANT_API_KEY").ok(),
        collection: std::env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "documents".to_string()),
        distance: DistanceKind::Cosine,
    };
    let index = Arc::new(QdrantIndex::new(&index_cfg)?);
    index
        .ensure_collection(&VectorSpace {
            size: embedding_dim,
            distance: DistanceKind::Cosine,
        })
        .await?;

    // Retrieval engine.
    let embedder = Arc::new(LlmEmbedder::new(LlmEmbedderConfig {
        svc: svc.clone(),
        dim: embedding_dim,
        batch_limit: env_parse("EMBEDDING_BATCH_LIMIT", 64usize),
        concurrency: env_parse("EMBEDDING_CONCURRENCY", 4usize),
    }));
    let engine = Arc::new(RagEngine::new(
        EngineConfig::new_default(index_cfg.collection.clone()),
        index,
        embedder,
        None,
    )?);

    // Agent with answer/judge roles over the same capability interface.
    let agent = KnowledgeAgent::new(
        engine,
        Arc::new(RolesModel::answer(svc.clone())),
        Arc::new(RolesModel::judge(svc)),
        AgentConfig::default(),
    )?;

    let response = agent.answer(QueryRequest::new(question)).await;

    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources (score {:.2}):", response.score);
        for source in &response.sources {
            println!("  [{}] {}: {}", source.chunk_id, source.source, source.content);
        }
    }

    Ok(())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
