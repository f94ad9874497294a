//! Conversational retrieval: condense, retrieve, answer.

use docqa_core::{ChatHistory, DocqaError, RetrievedChunk};
use docqa_index::retriever::Retriever;
use serde::Serialize;
use tracing::{debug, info};

use crate::llm::LlmClient;
use crate::prompt::{build_answer_messages, build_condense_messages};

/// Result of one question through the chain.
///
/// # Examples
///
/// ```
/// use docqa_chat::chain::ChatAnswer;
///
/// let answer = ChatAnswer {
///     question: "and the venue?".into(),
///     standalone_question: "Where is the offsite held?".into(),
///     answer: "Lisbon.".into(),
///     sources: vec![],
/// };
/// let json = serde_json::to_value(&answer).unwrap();
/// assert_eq!(json["standaloneQuestion"], "Where is the offsite held?");
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    /// The question as the user typed it.
    pub question: String,
    /// The question rewritten to stand on its own given the history.
    pub standalone_question: String,
    /// The model's answer.
    pub answer: String,
    /// Chunks the answer was grounded on.
    pub sources: Vec<RetrievedChunk>,
}

/// Question answering over the indexed documents, aware of prior turns.
///
/// When there is history, the follow-up is first rewritten into a standalone
/// question so retrieval does not depend on pronouns or ellipsis.
pub struct ConversationalChain {
    llm: LlmClient,
    retriever: Retriever,
    k: usize,
}

impl ConversationalChain {
    /// Create a chain retrieving `k` chunks per question (at least one).
    pub fn new(llm: LlmClient, retriever: Retriever, k: usize) -> Self {
        Self {
            llm,
            retriever,
            k: k.max(1),
        }
    }

    /// Number of chunks retrieved per question.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Access the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Rewrite `question` into a standalone question given `history`.
    ///
    /// Returns the question unchanged when there is no history, or when the
    /// model replies with nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Llm`] if the completion request fails.
    pub async fn condense(
        &self,
        history: &ChatHistory,
        question: &str,
    ) -> Result<String, DocqaError> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let rewritten = self
            .llm
            .chat(build_condense_messages(history, question))
            .await?;
        if rewritten.is_empty() {
            return Ok(question.to_string());
        }
        debug!(standalone = %rewritten, "condensed follow-up question");
        Ok(rewritten)
    }

    /// Answer `question` in the context of `history`.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError`] if condensing, retrieval, or answering fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docqa_chat::chain::ConversationalChain;
    /// use docqa_chat::llm::LlmClient;
    /// use docqa_core::{ChatHistory, LlmConfig};
    /// use docqa_index::embedding::EmbeddingClient;
    /// use docqa_index::retriever::Retriever;
    /// use docqa_index::store::VectorStore;
    ///
    /// # async fn example() {
    /// let retriever = Retriever::new(VectorStore::in_memory().unwrap(), EmbeddingClient::new("key"));
    /// let llm = LlmClient::new(&LlmConfig::default()).unwrap();
    /// let chain = ConversationalChain::new(llm, retriever, 1);
    /// let answer = chain.ask(&ChatHistory::new(), "What is the deadline?").await.unwrap();
    /// println!("{}", answer.answer);
    /// # }
    /// ```
    pub async fn ask(
        &self,
        history: &ChatHistory,
        question: &str,
    ) -> Result<ChatAnswer, DocqaError> {
        let standalone_question = self.condense(history, question).await?;

        let sources = self.retriever.retrieve(&standalone_question, self.k).await?;
        info!(
            hits = sources.len(),
            top = ?sources.first().map(|c| c.source.display().to_string()),
            "retrieved context"
        );

        let answer = self
            .llm
            .chat(build_answer_messages(&sources, &standalone_question))
            .await?;

        Ok(ChatAnswer {
            question: question.to_string(),
            standalone_question,
            answer,
            sources,
        })
    }
}
