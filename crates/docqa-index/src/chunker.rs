//! Recursive character text splitting.
//!
//! Splits documents on the coarsest separator that occurs in the text
//! (paragraphs, then lines, then words, then characters) and greedily merges
//! the pieces back into chunks of at most `chunk_size` characters, keeping up
//! to `chunk_overlap` characters of trailing context between neighbors.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::walker::Document;

/// Separators tried in order, coarsest first. The empty string splits
/// into characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// A piece of a document, ready for embedding.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use docqa_index::chunker::TextChunk;
///
/// let chunk = TextChunk {
///     source: PathBuf::from("guide.md"),
///     chunk_index: 0,
///     content: "Install with cargo.".into(),
///     content_hash: "abc123".into(),
/// };
/// assert_eq!(chunk.chunk_index, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChunk {
    /// Document path relative to the data directory.
    pub source: PathBuf,
    /// Position of the chunk within its document (0-based).
    pub chunk_index: u32,
    /// Chunk text.
    pub content: String,
    /// SHA-256 of `content`.
    pub content_hash: String,
}

/// Split a document into [`TextChunk`]s.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use docqa_index::chunker::chunk_document;
/// use docqa_index::walker::Document;
///
/// let doc = Document {
///     path: PathBuf::from("a.txt"),
///     content: "first paragraph\n\nsecond paragraph".into(),
/// };
/// let chunks = chunk_document(&doc, 20, 0);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1].content, "second paragraph");
/// assert_eq!(chunks[1].chunk_index, 1);
/// ```
pub fn chunk_document(doc: &Document, chunk_size: usize, chunk_overlap: usize) -> Vec<TextChunk> {
    split_text(&doc.content, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(i, content)| TextChunk {
            source: doc.path.clone(),
            chunk_index: i as u32,
            content_hash: content_hash(&content),
            content,
        })
        .collect()
}

/// Split `text` into trimmed, non-empty chunks of at most `chunk_size`
/// characters (a single unsplittable piece may exceed it only when
/// `chunk_size` is smaller than one character).
///
/// # Examples
///
/// ```
/// use docqa_index::chunker::split_text;
///
/// let chunks = split_text("aaaa bbbb cccc", 9, 0);
/// assert_eq!(chunks, vec!["aaaa bbbb", "cccc"]);
/// ```
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    split_recursive(text, SEPARATORS, chunk_size, chunk_overlap)
}

fn split_recursive(
    text: &str,
    separators: &[&'static str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let (separator, finer) = pick_separator(text, separators);

    let splits: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for split in splits {
        if char_len(split) < chunk_size {
            pending.push(split);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_splits(&pending, separator, chunk_size, chunk_overlap));
            pending.clear();
        }

        if finer.is_empty() {
            push_trimmed(&mut chunks, split);
        } else {
            chunks.extend(split_recursive(split, finer, chunk_size, chunk_overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_splits(&pending, separator, chunk_size, chunk_overlap));
    }

    chunks
}

fn pick_separator<'s>(
    text: &str,
    separators: &'s [&'static str],
) -> (&'static str, &'s [&'static str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(*sep) {
            return (*sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn merge_splits(
    splits: &[&str],
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &split in splits {
        let len = char_len(split);
        let joiner = if current.is_empty() { 0 } else { sep_len };

        if total + len + joiner > chunk_size && !current.is_empty() {
            push_joined(&mut chunks, &current, separator);

            // Drop from the front until only the overlap is left and the
            // next split fits.
            while total > chunk_overlap
                || (total > 0
                    && total + len + if current.is_empty() { 0 } else { sep_len } > chunk_size)
            {
                let joined_len = if current.len() > 1 { sep_len } else { 0 };
                let Some(first) = current.pop_front() else {
                    break;
                };
                total = total.saturating_sub(char_len(first) + joined_len);
            }
        }

        total += len + if current.is_empty() { 0 } else { sep_len };
        current.push_back(split);
    }

    push_joined(&mut chunks, &current, separator);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    push_trimmed(chunks, &joined);
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_text("para one\n\npara two", 1000, 0);
        assert_eq!(chunks, vec!["para one\n\npara two"]);
    }

    #[test]
    fn words_merge_up_to_chunk_size() {
        let chunks = split_text("aaaa bbbb cccc", 9, 0);
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn overlap_repeats_trailing_words() {
        let chunks = split_text("one two three four", 10, 5);
        assert_eq!(chunks, vec!["one two", "two three", "three four"]);
    }

    #[test]
    fn long_word_falls_back_to_characters() {
        let word = "x".repeat(25);
        let chunks = split_text(&word, 10, 0);
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![10, 10, 5]);
    }

    #[test]
    fn oversized_paragraph_is_split_by_lines() {
        let text = "short intro\n\nline one is here\nline two is here\nline three here";
        let chunks = split_text(text, 35, 0);
        assert_eq!(
            chunks,
            vec![
                "short intro",
                "line one is here\nline two is here",
                "line three here",
            ]
        );
    }

    #[test]
    fn chunks_never_exceed_size() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(50);
        for chunk in split_text(&text, 64, 16) {
            assert!(chunk.chars().count() <= 64, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(12);
        let chunks = split_text(&text, 5, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "ééééé");
        assert_eq!(chunks[2], "éé");
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(split_text("  \n\n \n", 100, 0).is_empty());
    }

    #[test]
    fn chunk_document_numbers_chunks_and_hashes_content() {
        let doc = Document {
            path: PathBuf::from("notes.txt"),
            content: "aaaa bbbb cccc".into(),
        };
        let chunks = chunk_document(&doc, 9, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source, PathBuf::from("notes.txt"));
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[0].content_hash, content_hash("aaaa bbbb"));
        assert_ne!(chunks[0].content_hash, chunks[1].content_hash);
    }
}
