use crate::{ChatMessage, ContextDocument};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer based only on context.";
pub const TEMPERATURE: f64 = 0.7;
pub const NO_DOCUMENTS_ANSWER: &str = "No relevant documents found. (Did the Indexer run?)";
pub const GENERATION_ERROR_ANSWER: &str = "Error generating answer.";

pub fn build_context(documents: &[ContextDocument]) -> String {
    documents
        .iter()
        .map(|document| format!("Source: {}\nContent: {}", document.source, document.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System instruction plus one user turn carrying the context and the question.
pub fn build_messages(question: &str, documents: &[ContextDocument]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Context:\n{}\n\nQuestion: {question}",
            build_context(documents)
        )),
    ]
}
