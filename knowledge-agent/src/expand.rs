//! Optional LLM-based query expansion for better retrieval recall.

use std::sync::Arc;

use tracing::{debug, warn};

use llm_service::ChatMessage;

use crate::model::LanguageModel;

const EXPAND_SYSTEM: &str = "You are a query expansion assistant. Given a search query, \
generate 2-3 synonyms or related terms that would help find relevant documents. \
Return only the expanded terms, separated by spaces.";

/// Expands a query with LLM-generated related terms.
pub struct QueryExpander {
    model: Arc<dyn LanguageModel>,
}

impl QueryExpander {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Returns `"{query} {expanded terms}"`, or the original query
    /// unchanged when expansion fails or produces nothing.
    pub async fn expand(&self, query: &str) -> String {
        let messages = vec![
            ChatMessage::system(EXPAND_SYSTEM),
            ChatMessage::user(format!("Query: {query}\n\nExpanded terms:")),
        ];

        match self.model.generate(&messages).await {
            Ok(terms) => {
                let terms = terms.trim();
                if terms.is_empty() {
                    return query.to_string();
                }
                let expanded = format!("{query} {terms}");
                debug!("query expanded: {expanded:?}");
                expanded
            }
            Err(e) => {
                warn!("query expansion failed, using original query: {e}");
                query.to_string()
            }
        }
    }
}
