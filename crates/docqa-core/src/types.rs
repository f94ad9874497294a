use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One completed question/answer exchange.
///
/// # Examples
///
/// ```
/// use docqa_core::ChatTurn;
///
/// let turn = ChatTurn::new("What is in the report?", "Quarterly numbers.");
/// assert_eq!(turn.question, "What is in the report?");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// What the user asked, as typed.
    pub question: String,
    /// What the model answered.
    pub answer: String,
}

impl ChatTurn {
    /// Create a turn from a question and its answer.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Ordered record of the conversation so far.
///
/// Only grows: turns are appended after each answer and never edited.
///
/// # Examples
///
/// ```
/// use docqa_core::{ChatHistory, ChatTurn};
///
/// let mut history = ChatHistory::new();
/// assert!(history.is_empty());
/// history.push(ChatTurn::new("q", "a"));
/// assert_eq!(history.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed turn.
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Number of completed turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has completed yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Iterate over turns, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }
}

impl FromIterator<ChatTurn> for ChatHistory {
    fn from_iter<I: IntoIterator<Item = ChatTurn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

/// A document chunk returned by nearest-neighbor retrieval.
///
/// # Examples
///
/// ```
/// use docqa_core::RetrievedChunk;
/// use std::path::PathBuf;
///
/// let chunk = RetrievedChunk {
///     source: PathBuf::from("notes/meeting.md"),
///     chunk_index: 0,
///     content: "Budget approved.".into(),
///     score: 0.92,
/// };
/// assert!(chunk.score > 0.9);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    /// Document path relative to the data directory.
    pub source: PathBuf,
    /// Position of the chunk within its document (0-based).
    pub chunk_index: u32,
    /// Chunk text.
    pub content: String,
    /// Cosine similarity to the query (-1.0–1.0).
    pub score: f64,
}

/// Output format for answers.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use docqa_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The answer text only.
    #[default]
    Text,
    /// One JSON object per answer, with sources.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display_roundtrips() {
        for fmt in [OutputFormat::Text, OutputFormat::Json] {
            assert_eq!(fmt.to_string().parse::<OutputFormat>().unwrap(), fmt);
        }
    }

    #[test]
    fn history_keeps_insertion_order() {
        let mut history = ChatHistory::new();
        history.push(ChatTurn::new("first", "one"));
        history.push(ChatTurn::new("second", "two"));

        let questions: Vec<&str> = history.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["first", "second"]);
        assert_eq!(history.iter().last().unwrap().answer, "two");
    }

    #[test]
    fn history_serializes_as_array() {
        let history: ChatHistory = vec![ChatTurn::new("q", "a")].into_iter().collect();
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json[0]["question"], "q");
        assert_eq!(json[0]["answer"], "a");
    }

    #[test]
    fn retrieved_chunk_uses_camel_case() {
        let chunk = RetrievedChunk {
            source: PathBuf::from("a.txt"),
            chunk_index: 3,
            content: "text".into(),
            score: 0.5,
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["chunkIndex"], 3);
    }
}
