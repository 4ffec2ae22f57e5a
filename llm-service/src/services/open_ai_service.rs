//! OpenAI service for chat generation and embeddings.
//!
//! Minimal, non-streaming client around the OpenAI REST API.
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions — chat completion (non-streaming)
//! - POST {endpoint}/v1/embeddings       — embeddings retrieval
//!
//! Constructor validation:
//! - `cfg.provider` must be `LlmProvider::OpenAI`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://

use std::time::Duration;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::chat::ChatMessage;
use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{ConfigError, LlmError, make_snippet};

/// Thin client for the OpenAI API.
///
/// Constructed from a complete [`LlmModelConfig`]. Internally keeps a
/// preconfigured `reqwest::Client` (with timeout and default headers).
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidProvider`] if `cfg.provider` is not OpenAI
    /// - [`ConfigError::MissingApiKey`] if `cfg.api_key` is `None`
    /// - [`ConfigError::InvalidFormat`] if `cfg.endpoint` is invalid
    /// - [`LlmError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        if cfg.provider != LlmProvider::OpenAI {
            return Err(ConfigError::InvalidProvider.into());
        }

        let api_key = cfg
            .api_key
            .clone()
            .ok_or(ConfigError::MissingApiKey)?;

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::InvalidFormat {
                var: "endpoint",
                reason: "must start with http:// or https://",
            }
            .into());
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::Decode(format!("invalid API key header: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{}/v1/chat/completions", base);
        let url_embeddings = format!("{}/v1/embeddings", base);

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    /// Performs a **non-streaming** chat completion request.
    ///
    /// Mapped options from config: `model`, `temperature`, `top_p`,
    /// `max_tokens`.
    ///
    /// # Errors
    /// - [`LlmError::HttpStatus`] for non-2xx responses
    /// - [`LlmError::Transport`] for client/network failures
    /// - [`LlmError::Decode`] if the JSON cannot be parsed or no choices
    ///   are returned
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = ChatCompletionRequest::from_cfg(&self.cfg, messages);

        debug!("POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_chat.clone();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }

        let out: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("serde error: {e}")))?;

        out.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Decode("empty choices in chat completion".into()))
    }

    /// Retrieves a single embedding vector via `/v1/embeddings`.
    ///
    /// # Errors
    /// - [`LlmError::HttpStatus`] for non-2xx responses
    /// - [`LlmError::Transport`] for client/network failures
    /// - [`LlmError::Decode`] if the JSON cannot be parsed or no data is
    ///   returned
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input,
        };

        debug!("POST {}", self.url_embeddings);
        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_embeddings.clone();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }

        let out: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("serde error: {e}")))?;

        out.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::Decode("empty data in embeddings response".into()))
    }
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, messages: &'a [ChatMessage]) -> Self {
        Self {
            model: &cfg.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsDatum {
    embedding: Vec<f32>,
}
