//! Interactive question/answer loop.

use std::io::{BufRead, Write};
use std::time::Duration;

use docqa_core::{ChatHistory, ChatTurn, DocqaError, OutputFormat};
use indicatif::{ProgressBar, ProgressStyle};

use crate::chain::{ChatAnswer, ConversationalChain};

/// Text shown before reading each question.
pub const PROMPT: &str = "Prompt (type 'q' to quit): ";

/// Whether `input` asks to end the session.
///
/// # Examples
///
/// ```
/// use docqa_chat::session::is_quit_command;
///
/// assert!(is_quit_command("q"));
/// assert!(is_quit_command("quit"));
/// assert!(!is_quit_command("quiet"));
/// ```
pub fn is_quit_command(input: &str) -> bool {
    matches!(input, "q" | "quit")
}

/// Render an answer for printing in the requested format.
///
/// # Errors
///
/// Returns [`DocqaError::Serialization`] if JSON encoding fails.
pub fn render_answer(answer: &ChatAnswer, format: OutputFormat) -> Result<String, DocqaError> {
    match format {
        OutputFormat::Text => Ok(answer.answer.clone()),
        OutputFormat::Json => Ok(serde_json::to_string(answer)?),
    }
}

/// Print the prompt and read one line, without its line ending.
///
/// Returns `None` at end of input.
fn read_question<R: BufRead, W: Write + ?Sized>(
    input: &mut R,
    output: &mut W,
) -> Result<Option<String>, DocqaError> {
    write!(output, "{PROMPT}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.strip_suffix('\n').unwrap_or(&line);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    Ok(Some(trimmed.to_string()))
}

/// A conversation with the indexed documents.
///
/// History accumulates for the lifetime of the session and is passed to the
/// chain on every question.
pub struct Session<'a> {
    chain: &'a ConversationalChain,
    history: ChatHistory,
    format: OutputFormat,
    show_progress: bool,
}

impl<'a> Session<'a> {
    /// Start a session with no history.
    pub fn new(chain: &'a ConversationalChain, format: OutputFormat) -> Self {
        Self {
            chain,
            history: ChatHistory::new(),
            format,
            show_progress: false,
        }
    }

    /// Show a spinner while waiting for an answer.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Turns completed so far.
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Answer one question, print it, and record the turn.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError`] if the chain fails or output cannot be written.
    pub async fn ask<W: Write>(
        &mut self,
        question: &str,
        output: &mut W,
    ) -> Result<ChatAnswer, DocqaError> {
        let spinner = self.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
                pb.set_style(style);
            }
            pb.set_message("Thinking...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = self.chain.ask(&self.history, question).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        let answer = result?;

        writeln!(output, "{}", render_answer(&answer, self.format)?)?;
        output.flush()?;

        self.history.push(ChatTurn::new(question, answer.answer.clone()));
        Ok(answer)
    }

    /// Run the loop until the user quits or input ends.
    ///
    /// `initial` is answered first without prompting. Blank lines re-prompt
    /// without calling the chain. In JSON mode no prompt is written, so
    /// `output` carries one JSON object per line and nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError`] on the first chain or I/O failure.
    pub async fn run<R: BufRead, W: Write>(
        &mut self,
        initial: Option<&str>,
        mut input: R,
        mut output: W,
    ) -> Result<(), DocqaError> {
        let mut pending = initial.map(str::to_string);
        let mut sink = std::io::sink();

        loop {
            let question = match pending.take() {
                Some(q) => q,
                None => {
                    let prompt_out: &mut dyn Write = match self.format {
                        OutputFormat::Text => &mut output,
                        OutputFormat::Json => &mut sink,
                    };
                    match read_question(&mut input, &mut *prompt_out)? {
                        Some(q) => q,
                        None => {
                            writeln!(prompt_out)?;
                            break;
                        }
                    }
                }
            };

            if is_quit_command(&question) {
                break;
            }
            if question.trim().is_empty() {
                continue;
            }

            self.ask(&question, &mut output).await?;
        }

        Ok(())
    }
}
