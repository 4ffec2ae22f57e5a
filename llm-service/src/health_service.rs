//! Universal health service for LLM backends (Ollama, OpenAI).
//!
//! Lightweight health checks for supported providers:
//! - Ollama: `GET {endpoint}/api/tags`
//! - OpenAI: `GET {endpoint}/v1/models` with Bearer auth
//!
//! The returned [`HealthStatus`] is JSON-serializable and suitable for a
//! `/health` endpoint. [`HealthService::check`] is resilient and never
//! fails (errors mapped to `ok=false`).

use std::time::{Duration, Instant};

use reqwest::header;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{LlmError, make_snippet};

/// A serializable health snapshot for a single provider/config.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Backend/provider (e.g., "Ollama", "OpenAI").
    pub provider: String,
    /// Target endpoint base URL.
    pub endpoint: String,
    /// Model identifier relevant to the probe.
    pub model: Option<String>,
    /// Overall health flag.
    pub ok: bool,
    /// Measured HTTP latency in milliseconds for the main probe.
    pub latency_ms: u128,
    /// Short human-readable message with details.
    pub message: String,
}

/// A universal health checker that reuses a single HTTP client.
///
/// The client is constructed with a default timeout; individual probes
/// reuse it.
pub struct HealthService {
    client: reqwest::Client,
}

impl HealthService {
    /// Creates a new health service with an optional client timeout (seconds).
    ///
    /// # Errors
    /// Returns [`LlmError::Transport`] if the HTTP client cannot be built.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        info!(
            default_timeout_secs = timeout.as_secs(),
            "HealthService initialized"
        );

        Ok(Self { client })
    }

    /// Probes a single config. Never fails; errors become `ok=false`.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let started = Instant::now();
        let result = match cfg.provider {
            LlmProvider::Ollama => self.probe_ollama(cfg).await,
            LlmProvider::OpenAI => self.probe_openai(cfg).await,
        };
        let latency_ms = started.elapsed().as_millis();

        match result {
            Ok(msg) => HealthStatus {
                provider: format!("{:?}", cfg.provider),
                endpoint: cfg.endpoint.clone(),
                model: Some(cfg.model.clone()),
                ok: true,
                latency_ms,
                message: msg,
            },
            Err(e) => {
                warn!(provider = ?cfg.provider, endpoint = %cfg.endpoint, "health probe failed: {e}");
                HealthStatus {
                    provider: format!("{:?}", cfg.provider),
                    endpoint: cfg.endpoint.clone(),
                    model: Some(cfg.model.clone()),
                    ok: false,
                    latency_ms,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Probes many configs sequentially.
    pub async fn check_many(&self, cfgs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(cfgs.len());
        for cfg in cfgs {
            out.push(self.check(cfg).await);
        }
        out
    }

    /* --------------------- Probes --------------------- */

    async fn probe_ollama(&self, cfg: &LlmModelConfig) -> Result<String, LlmError> {
        let url = format!("{}/api/tags", cfg.endpoint.trim_end_matches('/'));
        debug!("GET {url}");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }
        Ok("ollama reachable".to_string())
    }

    async fn probe_openai(&self, cfg: &LlmModelConfig) -> Result<String, LlmError> {
        let url = format!("{}/v1/models", cfg.endpoint.trim_end_matches('/'));
        debug!("GET {url}");
        let mut req = self.client.get(&url);
        if let Some(key) = &cfg.api_key {
            req = req.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }
        Ok("openai reachable".to_string())
    }
}
