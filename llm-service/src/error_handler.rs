//! Unified error handling for `llm-service`.
//!
//! One top-level [`LlmError`] for the whole crate, with domain-specific
//! errors grouped in nested enums ([`ConfigError`]). Small helpers for
//! reading/validating environment variables return the unified
//! [`Result<T>`] alias.
//!
//! All messages include the suffix `[LLM Service]` to simplify
//! attribution in logs.

use reqwest::StatusCode;
use thiserror::Error;

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Top-level error for the `llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration/validation errors (startup/readiness).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying HTTP transport error (includes client timeouts).
    #[error("[LLM Service] transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream returned a non-successful HTTP status.
    #[error("[LLM Service] HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        /// Numeric HTTP status code.
        status: StatusCode,
        /// Request URL.
        url: String,
        /// Short snippet of the response body (trimmed).
        snippet: String,
    },

    /// Response payload could not be decoded as expected.
    #[error("[LLM Service] decode error: {0}")]
    Decode(String),
}

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (ports, limits, timeouts).
    #[error("[LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_KIND`.
    #[error("[LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OLLAMA_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// The provider in a config does not match the service being built.
    #[error("[LLM Service] invalid provider for this service")]
    InvalidProvider,

    /// API key required but absent.
    #[error("[LLM Service] missing API key for provider")]
    MissingApiKey,
}

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`ConfigError::MissingVar`] if the variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ConfigError::InvalidNumber`] if the variable is set but not
/// a valid `u32`.
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.parse::<u32>().map(Some).map_err(|_| {
            LlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            })
        }),
        _ => Ok(None),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ConfigError::InvalidFormat`] when the string does not start
/// with a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Trims a response body down to a log-friendly snippet.
pub fn make_snippet(body: &str) -> String {
    body.chars().take(240).collect()
}
