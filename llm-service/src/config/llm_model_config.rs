use crate::config::llm_provider::LlmProvider;

/// Configuration for an LLM model invocation.
///
/// One value of this struct fully describes a model endpoint: which
/// backend to call, which model to request, and the sampling/timeout
/// knobs. The same type is used for generation and embedding roles.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend (Ollama or OpenAI).
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"qwen3:14b"`, `"gpt-4o-mini"`).
    pub model: String,

    /// Inference endpoint (local URL or remote API base URL).
    pub endpoint: String,

    /// Optional API key for authentication (required for OpenAI).
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic).
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}
