//! Shared LLM service with three active roles: `answer`, `judge`, and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (endpoint+model+key+timeout).
//! - Provides convenience methods to generate via answer/judge roles and
//!   to compute embeddings.
//! - If the `judge` role is not provided, it falls back to `answer`.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use llm_service::service_roles::LlmServiceRoles;
//! use llm_service::{ChatMessage, LlmModelConfig, LlmProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), llm_service::LlmError> {
//!     let answer = LlmModelConfig {
//!         provider: LlmProvider::Ollama,
//!         model: "qwen3:14b".into(),
//!         endpoint: "http://localhost:11434".into(),
//!         api_key: None,
//!         max_tokens: Some(512),
//!         temperature: Some(0.2),
//!         top_p: None,
//!         timeout_secs: Some(60),
//!     };
//!     let embedding = LlmModelConfig { model: "nomic-embed-text".into(), ..answer.clone() };
//!
//!     let svc = Arc::new(LlmServiceRoles::new(answer, None, embedding, Some(10))?);
//!
//!     let txt = svc
//!         .generate_answer(&[ChatMessage::user("Hello world")])
//!         .await?;
//!     println!("ANSWER: {}", txt);
//!
//!     let emb = svc.embed("Ferris").await?;
//!     println!("Embedding dim = {}", emb.len());
//!     Ok(())
//! }
//! ```

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::Arc,
};

use tokio::sync::RwLock;

use crate::chat::ChatMessage;
use crate::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
use crate::error_handler::LlmError;
use crate::health_service::{HealthService, HealthStatus};
use crate::services::{ollama_service::OllamaService, open_ai_service::OpenAiService};

/// Shared service that manages three logical LLM roles: **answer**,
/// **judge**, and **embedding**.
///
/// Internally, it caches Ollama/OpenAI clients keyed by their
/// configuration to avoid recreating HTTP clients on each call.
pub struct LlmServiceRoles {
    answer: LlmModelConfig,
    judge: LlmModelConfig,
    embedding: LlmModelConfig,

    ollama: RwLock<HashMap<ClientKey, Arc<OllamaService>>>,
    openai: RwLock<HashMap<ClientKey, Arc<OpenAiService>>>,

    health: HealthService,
}

impl LlmServiceRoles {
    /// Creates a new service with three roles.
    ///
    /// - `answer`: required answer-generation role.
    /// - `judge_opt`: optional judge role. If `None`, falls back to `answer`.
    /// - `embedding`: required embedding role.
    /// - `health_timeout_secs`: optional timeout for the health checker.
    pub fn new(
        answer: LlmModelConfig,
        judge_opt: Option<LlmModelConfig>,
        embedding: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, LlmError> {
        let judge = judge_opt.unwrap_or_else(|| answer.clone());

        Ok(Self {
            answer,
            judge,
            embedding,
            ollama: RwLock::new(HashMap::new()),
            openai: RwLock::new(HashMap::new()),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Generates text using the **answer** role.
    ///
    /// # Errors
    /// Returns [`LlmError`] if generation fails.
    pub async fn generate_answer(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.generate_with(&self.answer, messages).await
    }

    /// Generates text using the **judge** role.
    ///
    /// Falls back to the answer role if no judge was specified at creation.
    pub async fn generate_judge(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.generate_with(&self.judge, messages).await
    }

    /// Computes embeddings using the **embedding** role.
    ///
    /// # Errors
    /// Returns [`LlmError`] if embedding fails.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        match self.embedding.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.embedding).await?;
                cli.embeddings(input).await
            }
            LlmProvider::OpenAI => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings(input).await
            }
        }
    }

    /// Model identifier of the embedding role (used for cache keys).
    pub fn embedding_model(&self) -> &str {
        &self.embedding.model
    }

    /// Returns a health snapshot for all distinct roles.
    ///
    /// If the judge role equals the answer role, it is checked only once.
    pub async fn health_all(&self) -> Result<Vec<HealthStatus>, LlmError> {
        let mut list = Vec::<LlmModelConfig>::with_capacity(3);
        list.push(self.answer.clone());
        if self.judge != self.answer {
            list.push(self.judge.clone());
        }
        if self.embedding != self.answer && self.embedding != self.judge {
            list.push(self.embedding.clone());
        }
        Ok(self.health.check_many(&list).await)
    }

    /// Returns references to the current role configs `(answer, judge, embedding)`.
    pub fn roles(&self) -> (&LlmModelConfig, &LlmModelConfig, &LlmModelConfig) {
        (&self.answer, &self.judge, &self.embedding)
    }

    /* --------------------- Internals --------------------- */

    async fn generate_with(
        &self,
        cfg: &LlmModelConfig,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        match cfg.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(cfg).await?;
                cli.chat(messages).await
            }
            LlmProvider::OpenAI => {
                let cli = self.get_or_init_openai(cfg).await?;
                cli.chat(messages).await
            }
        }
    }

    async fn get_or_init_ollama(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OllamaService>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.ollama.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(OllamaService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }

    async fn get_or_init_openai(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OpenAiService>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.openai.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(OpenAiService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

/// Internal cache key to identify unique client configs.
#[derive(Clone, Eq)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

impl PartialEq for ClientKey {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider
            && self.endpoint == other.endpoint
            && self.model == other.model
            && self.api_key == other.api_key
            && self.timeout == other.timeout
    }
}

impl Hash for ClientKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.endpoint.hash(state);
        self.model.hash(state);
        if let Some(ref k) = self.api_key {
            k.hash(state);
        } else {
            0usize.hash(state);
        }
        self.timeout.hash(state);
    }
}
