/// Represents the provider (backend) used for LLM inference and embeddings.
///
/// This enum distinguishes between a local Ollama runtime and the OpenAI
/// API. Adding more providers later (e.g., Anthropic, Groq) means
/// extending this enum and adding a matching service client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Local Ollama runtime for on-device inference.
    Ollama,
    /// OpenAI's hosted API.
    OpenAI,
}

impl LlmProvider {
    /// Parses the `LLM_KIND`-style env value (`"ollama"` / `"openai"`).
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(LlmProvider::Ollama),
            "openai" => Some(LlmProvider::OpenAI),
            _ => None,
        }
    }
}
