//! Default LLM configs loaded strictly from environment variables.
//!
//! Convenience constructors for [`LlmModelConfig`], grouped by provider
//! and role. Three roles are wired:
//!
//! - **Answer**    → grounded answer generation over retrieved context
//! - **Judge**     → answer-quality scoring (deterministic, short output)
//! - **Embedding** → embedding generator
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_MAX_TOKENS` = optional max tokens (u32)
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT`  = endpoint (mandatory)
//! - `OLLAMA_MODEL`                 = answer model (mandatory)
//! - `OLLAMA_JUDGE_MODEL`           = judge model (falls back to `OLLAMA_MODEL`)
//! - `EMBEDDING_MODEL`              = embedding model (mandatory)
//!
//! OpenAI-specific:
//! - `OPENAI_API_KEY`               = API key (mandatory)
//! - `OPENAI_URL`                   = endpoint (default `https://api.openai.com`)
//! - `OPENAI_MODEL`                 = answer/judge model (mandatory)
//! - `OPENAI_EMBEDDING_MODEL`       = embedding model (mandatory)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{ConfigError, LlmError, env_opt_u32, must_env},
};

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
///
/// # Errors
/// - [`ConfigError::MissingVar`] if both are missing
/// - [`ConfigError::InvalidNumber`] if `OLLAMA_PORT` is invalid
fn ollama_endpoint() -> Result<String, LlmError> {
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        if !url.trim().is_empty() {
            return Ok(url);
        }
    }
    if let Ok(port) = std::env::var("OLLAMA_PORT") {
        if !port.trim().is_empty() {
            let _ = port
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "OLLAMA_PORT",
                    reason: "expected u16 (1..=65535)",
                })?;
            return Ok(format!("http://localhost:{port}"));
        }
    }
    Err(LlmError::Config(ConfigError::MissingVar(
        "OLLAMA_URL or OLLAMA_PORT",
    )))
}

/// Constructs a config for the **answer** Ollama model.
///
/// # Env
/// - `OLLAMA_MODEL` (required)
/// - `LLM_MAX_TOKENS` (optional)
///
/// # Defaults
/// - `temperature = Some(0.2)`
/// - `timeout_secs = Some(120)`
pub fn config_ollama_answer() -> Result<LlmModelConfig, LlmError> {
    let endpoint = ollama_endpoint()?;
    let model = must_env("OLLAMA_MODEL")?;
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;

    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model,
        endpoint,
        api_key: None,
        max_tokens,
        temperature: Some(0.2),
        top_p: None,
        timeout_secs: Some(120),
    })
}

/// Constructs a config for the **judge** Ollama model.
///
/// The judge emits a single float, so the config pins temperature to 0
/// and caps output tokens low. Falls back to `OLLAMA_MODEL` when no
/// dedicated judge model is configured.
///
/// # Env
/// - `OLLAMA_JUDGE_MODEL` or `OLLAMA_MODEL` (required)
pub fn config_ollama_judge() -> Result<LlmModelConfig, LlmError> {
    let endpoint = ollama_endpoint()?;
    let model = std::env::var("OLLAMA_JUDGE_MODEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(Ok)
        .unwrap_or_else(|| must_env("OLLAMA_MODEL"))?;

    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model,
        endpoint,
        api_key: None,
        max_tokens: Some(16),
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(60),
    })
}

/// Constructs a config for the **embedding** Ollama model.
///
/// # Env
/// - `EMBEDDING_MODEL` (required)
///
/// # Defaults
/// - `temperature = Some(0.0)` (deterministic)
/// - `timeout_secs = Some(30)`
pub fn config_ollama_embedding() -> Result<LlmModelConfig, LlmError> {
    let endpoint = ollama_endpoint()?;
    let model = must_env("EMBEDDING_MODEL")?;

    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model,
        endpoint,
        api_key: None,
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(30),
    })
}

/// Constructs a config for the **answer** OpenAI model.
///
/// # Env
/// - `OPENAI_API_KEY` (required)
/// - `OPENAI_MODEL` (required)
/// - `OPENAI_URL` (optional, default `https://api.openai.com`)
/// - `LLM_MAX_TOKENS` (optional)
pub fn config_openai_answer() -> Result<LlmModelConfig, LlmError> {
    let api_key = must_env("OPENAI_API_KEY")?;
    let model = must_env("OPENAI_MODEL")?;
    let endpoint =
        std::env::var("OPENAI_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;

    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens,
        temperature: Some(0.2),
        top_p: None,
        timeout_secs: Some(120),
    })
}

/// Constructs a config for the **embedding** OpenAI model.
///
/// # Env
/// - `OPENAI_API_KEY` (required)
/// - `OPENAI_EMBEDDING_MODEL` (required)
pub fn config_openai_embedding() -> Result<LlmModelConfig, LlmError> {
    let api_key = must_env("OPENAI_API_KEY")?;
    let model = must_env("OPENAI_EMBEDDING_MODEL")?;
    let endpoint =
        std::env::var("OPENAI_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());

    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(30),
    })
}
