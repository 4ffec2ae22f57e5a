//! Shared LLM capability crate.
//!
//! Provides thin, non-streaming clients for Ollama and OpenAI behind a
//! single configuration type, plus a role manager with three logical
//! roles:
//! - **answer**    — generates grounded answers from retrieved context
//! - **judge**     — scores answer quality (expects a single float reply)
//! - **embedding** — computes text embeddings
//!
//! Construct [`service_roles::LlmServiceRoles`] once, wrap it in `Arc`,
//! and pass clones to dependents.

pub mod chat;
pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_roles;
pub mod services;

pub use chat::{ChatMessage, ChatRole};
pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::LlmError;
pub use service_roles::LlmServiceRoles;
