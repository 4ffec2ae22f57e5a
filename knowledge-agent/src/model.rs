//! Language-model capability interface.
//!
//! The agent consumes one narrow capability, `generate(messages)`, and
//! uses it for both the answer generator and the quality judge,
//! parameterized by different prompts. Implementations are selected at
//! construction time.

use std::{future::Future, pin::Pin, sync::Arc};

use thiserror::Error;

use llm_service::ChatMessage;
use llm_service::service_roles::LlmServiceRoles;

/// Failure of a language-model call.
///
/// The message is preserved verbatim: downstream diagnostics
/// pattern-match it to produce operator-actionable response text.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ModelError {
    pub message: String,
}

/// Boxed future returned by [`LanguageModel::generate`].
pub type ModelFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, ModelError>> + Send + 'a>>;

/// Text-generation capability.
pub trait LanguageModel: Send + Sync {
    /// Generates assistant text for the given messages.
    fn generate<'a>(&'a self, messages: &'a [ChatMessage]) -> ModelFuture<'a>;
}

/// Which role of the shared LLM service an adapter instance speaks for.
#[derive(Clone, Copy, Debug)]
pub enum ModelRole {
    Answer,
    Judge,
}

/// [`LanguageModel`] adapter over the shared [`LlmServiceRoles`].
pub struct RolesModel {
    svc: Arc<LlmServiceRoles>,
    role: ModelRole,
}

impl RolesModel {
    /// Adapter speaking for the **answer** role.
    pub fn answer(svc: Arc<LlmServiceRoles>) -> Self {
        Self {
            svc,
            role: ModelRole::Answer,
        }
    }

    /// Adapter speaking for the **judge** role.
    pub fn judge(svc: Arc<LlmServiceRoles>) -> Self {
        Self {
            svc,
            role: ModelRole::Judge,
        }
    }
}

impl LanguageModel for RolesModel {
    fn generate<'a>(&'a self, messages: &'a [ChatMessage]) -> ModelFuture<'a> {
        Box::pin(async move {
            let result = match self.role {
                ModelRole::Answer => self.svc.generate_answer(messages).await,
                ModelRole::Judge => self.svc.generate_judge(messages).await,
            };
            result.map_err(|e| ModelError {
                message: e.to_string(),
            })
        })
    }
}
