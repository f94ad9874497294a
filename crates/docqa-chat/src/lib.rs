//! Conversational question answering over indexed documents.
//!
//! Wraps an OpenAI-compatible chat completions client, the prompts used to
//! condense follow-ups and answer from retrieved context, the retrieval chain
//! that combines them, and the interactive session loop.

pub mod chain;
pub mod llm;
pub mod prompt;
pub mod session;
