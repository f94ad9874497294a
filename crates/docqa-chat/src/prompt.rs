use docqa_core::{ChatHistory, RetrievedChunk};

use crate::llm::ChatMessage;

const CONDENSE_INSTRUCTIONS: &str = "\
Given the following conversation and a follow up question, rephrase the follow up \
question to be a standalone question, in its original language.";

const ANSWER_INSTRUCTIONS: &str = "\
Use the following pieces of context to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
----------------";

/// Render the conversation so far for the condense prompt.
///
/// Each turn becomes `"\nHuman: {question}\nAssistant: {answer}"`.
///
/// # Examples
///
/// ```
/// use docqa_core::{ChatHistory, ChatTurn};
/// use docqa_chat::prompt::format_chat_history;
///
/// let history: ChatHistory = [ChatTurn::new("Who wrote it?", "Ada.")].into_iter().collect();
/// assert_eq!(format_chat_history(&history), "\nHuman: Who wrote it?\nAssistant: Ada.");
/// ```
pub fn format_chat_history(history: &ChatHistory) -> String {
    history
        .iter()
        .map(|turn| format!("\nHuman: {}\nAssistant: {}", turn.question, turn.answer))
        .collect()
}

/// Build the request that rewrites a follow-up into a standalone question.
///
/// # Examples
///
/// ```
/// use docqa_core::{ChatHistory, ChatTurn};
/// use docqa_chat::prompt::build_condense_messages;
///
/// let history: ChatHistory = [ChatTurn::new("Who wrote it?", "Ada.")].into_iter().collect();
/// let messages = build_condense_messages(&history, "When?");
/// assert_eq!(messages.len(), 1);
/// assert!(messages[0].content.contains("Follow Up Input: When?"));
/// ```
pub fn build_condense_messages(history: &ChatHistory, question: &str) -> Vec<ChatMessage> {
    // User text is spliced in once; it must never be scanned for placeholders.
    let prompt = format!(
        "{CONDENSE_INSTRUCTIONS}\n\nChat History:\n{}\nFollow Up Input: {question}\nStandalone question:",
        format_chat_history(history)
    );
    vec![ChatMessage::user(prompt)]
}

/// Join retrieved chunks into the context block, separated by blank lines.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the request that answers `question` from the retrieved context.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use docqa_core::RetrievedChunk;
/// use docqa_chat::prompt::build_answer_messages;
///
/// let chunks = vec![RetrievedChunk {
///     source: PathBuf::from("faq.md"),
///     chunk_index: 0,
///     content: "Refunds take five days.".into(),
///     score: 0.9,
/// }];
/// let messages = build_answer_messages(&chunks, "How long do refunds take?");
/// assert!(messages[0].content.contains("Refunds take five days."));
/// assert_eq!(messages[1].content, "How long do refunds take?");
/// ```
pub fn build_answer_messages(chunks: &[RetrievedChunk], question: &str) -> Vec<ChatMessage> {
    let system = format!("{ANSWER_INSTRUCTIONS}\n{}", format_context(chunks));
    vec![ChatMessage::system(system), ChatMessage::user(question)]
}
