//! Chat message types shared by all providers.
//!
//! Both providers speak a messages-style API (`/api/chat` for Ollama,
//! `/v1/chat/completions` for OpenAI), so the crate exposes one neutral
//! message shape and maps it to the wire format inside each service.

use serde::{Deserialize, Serialize};

/// Role of a single chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that steer the model.
    System,
    /// End-user content.
    User,
    /// Prior model output (for multi-turn exchanges).
    Assistant,
}

impl ChatRole {
    /// Wire name used by both Ollama and OpenAI.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One message in a chat exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Builds a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Builds a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_to_wire_names() {
        assert_eq!(ChatRole::System.as_str(), "system");
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Assistant.as_str(), "assistant");
    }

    #[test]
    fn message_constructors_set_roles() {
        let m = ChatMessage::system("be terse");
        assert_eq!(m.role, ChatRole::System);
        let m = ChatMessage::user("2+2=");
        assert_eq!(m.role, ChatRole::User);
        assert_eq!(m.content, "2+2=");
    }
}
