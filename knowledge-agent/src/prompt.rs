//! Prompt builders: system messages, context assembly, canned responses.

use llm_service::ChatMessage;

use crate::state::RetrievedDoc;

/// System instructions for grounded answer generation.
///
/// The citation rules matter: sources are attributed per chunk id, and
/// the service layer filters returned sources by these citations.
pub const ANSWER_SYSTEM: &str = "\
You are an expert assistant that answers questions based EXCLUSIVELY on the provided document context.\n\
Rules:\n\
- Answer ONLY using information from the context below; never invent content.\n\
- Quote or closely follow the actual context text; do not generalize into categories it does not contain.\n\
- Cite every piece of information with its chunk id in the form [chunk_id: <id>].\n\
- Use a separate citation for each distinct fact; do not reuse one chunk_id for unrelated facts.\n\
- If the context is insufficient, say exactly what is missing.";

/// System instructions for the quality judge.
///
/// The judge must reply with a bare float; anything else is treated as a
/// parse failure and scored neutrally by the caller.
pub const JUDGE_SYSTEM: &str = "\
You are a quality assessment expert. Evaluate the answer quality on a scale from 0.0 to 1.0.\n\
Criteria (weighted): relevance 30%, completeness 30%, accuracy against the provided context 40%.\n\
Respond with ONLY a single float number between 0.0 and 1.0 (e.g., 0.85).";

/// Canned response when retrieval finds nothing relevant.
pub const NO_RELEVANT_RESPONSE: &str = "I couldn't find relevant information in the knowledge \
base to answer your question. Please try rephrasing your question or upload more documents.";

/// Context placeholder paired with [`NO_RELEVANT_RESPONSE`].
pub const NO_CONTEXT: &str = "No relevant documents were found in the knowledge base.";

/// Canned response when the index holds no documents at all.
pub const NO_DOCUMENTS_RESPONSE: &str = "No documents are indexed in the knowledge base.\n\n\
Please upload at least one document before making queries.";

/// Assembles the generation context from retrieved docs: each chunk's
/// content prefixed with its chunk id and relevance, separated by rulers.
pub fn build_context(docs: &[RetrievedDoc]) -> String {
    let parts: Vec<String> = docs
        .iter()
        .map(|doc| {
            format!(
                "DOCUMENT EXCERPT [{}] (Relevance: {:.1}%):\n{}",
                doc.chunk_id,
                doc.score * 100.0,
                doc.content.trim()
            )
        })
        .collect();

    let ruler = "=".repeat(80);
    format!("\n\n{ruler}\n\n{}\n\n{ruler}", parts.join("\n\n"))
}

/// Chunk ids included in the context, in retrieval order.
pub fn citations_of(docs: &[RetrievedDoc]) -> Vec<String> {
    docs.iter().map(|doc| doc.chunk_id.clone()).collect()
}

/// Builds the `(system, user)` message pair for answer generation.
pub fn answer_messages(context: &str, query: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANSWER_SYSTEM),
        ChatMessage::user(format!(
            "DOCUMENT CONTENT:\n{context}\n\nUSER QUESTION: {query}\n\n\
             Provide a SPECIFIC and DETAILED answer using ONLY the information from the \
             document content above. Cite each piece of information with its chunk_id:"
        )),
    ]
}

/// Builds the `(system, user)` message pair for quality judgment.
pub fn judge_messages(query: &str, context: &str, response: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(JUDGE_SYSTEM),
        ChatMessage::user(format!(
            "Question: {query}\n\nContext provided:\n{context}\n\n\
             Answer to evaluate:\n{response}\n\nQuality score (0.0-1.0):"
        )),
    ]
}
