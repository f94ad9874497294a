//! SQLite storage for document chunks and their embeddings.
//!
//! Stores chunks in SQLite with BLOBs for vector embeddings. Cosine
//! similarity is computed in Rust for nearest-neighbor search.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docqa_core::{DocqaError, RetrievedChunk};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::chunker::TextChunk;

/// Index statistics.
///
/// # Examples
///
/// ```
/// use docqa_index::store::IndexStats;
///
/// let stats = IndexStats {
///     total_chunks: 100,
///     total_documents: 10,
///     index_size_bytes: 50000,
/// };
/// assert_eq!(stats.total_chunks, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Total number of chunks in the index.
    pub total_chunks: usize,
    /// Total number of distinct source documents.
    pub total_documents: usize,
    /// Size of the index database in bytes.
    pub index_size_bytes: u64,
}

/// SQLite-backed vector store.
///
/// # Examples
///
/// ```
/// use docqa_index::store::VectorStore;
///
/// let store = VectorStore::in_memory().unwrap();
/// let stats = store.stats().unwrap();
/// assert_eq!(stats.total_chunks, 0);
/// ```
pub struct VectorStore {
    conn: Connection,
}

impl VectorStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directory and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use docqa_index::store::VectorStore;
    ///
    /// let store = VectorStore::open(Path::new("persist/index.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self, DocqaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DocqaError::Database(format!("failed to create index directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| DocqaError::Database(format!("failed to open database: {e}")))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (used when persistence is disabled).
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self, DocqaError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DocqaError::Database(format!("failed to create in-memory database: {e}"))
        })?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), DocqaError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS metadata (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chunks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    source TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    content_hash TEXT NOT NULL,
                    embedding BLOB NOT NULL,
                    UNIQUE (source, chunk_index)
                );
                ",
            )
            .map_err(|e| DocqaError::Database(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Store embedding dimensions in the metadata table.
    ///
    /// If dimensions are already stored and match, this is a no-op.
    /// If they don't match, returns an error suggesting a rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] if dimensions conflict with
    /// an existing index.
    pub fn set_dimensions(&self, dimensions: usize) -> Result<(), DocqaError> {
        if let Some(stored) = self.dimensions()? {
            if stored != dimensions {
                return Err(DocqaError::Database(format!(
                    "Index was created with {stored} dimensions but the embedding model returns {dimensions}. \
                     Rebuild with `docqa index --force`."
                )));
            }
            return Ok(());
        }

        self.set_metadata("embedding_dimensions", &dimensions.to_string())
    }

    /// Get embedding dimensions stored in metadata, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] on query failure or corrupted metadata.
    pub fn dimensions(&self) -> Result<Option<usize>, DocqaError> {
        match self.get_metadata("embedding_dimensions")? {
            Some(v) => {
                let dims: usize = v.parse().map_err(|_| {
                    DocqaError::Database(format!("Corrupted dimension metadata in index: '{v}'"))
                })?;
                Ok(Some(dims))
            }
            None => Ok(None),
        }
    }

    /// Record when the index was built.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] on write failure.
    pub fn set_built_at(&self, at: DateTime<Utc>) -> Result<(), DocqaError> {
        self.set_metadata("built_at", &at.to_rfc3339())
    }

    /// When the index was built, if recorded.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] on query failure or an unparsable timestamp.
    pub fn built_at(&self) -> Result<Option<DateTime<Utc>>, DocqaError> {
        match self.get_metadata("built_at")? {
            Some(v) => DateTime::parse_from_rfc3339(&v)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| DocqaError::Database(format!("Corrupted build timestamp '{v}': {e}"))),
            None => Ok(None),
        }
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>, DocqaError> {
        let result = self.conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DocqaError::Database(format!(
                "failed to get metadata '{key}': {e}"
            ))),
        }
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<(), DocqaError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| DocqaError::Database(format!("failed to set metadata '{key}': {e}")))?;
        Ok(())
    }

    /// Store a chunk with its embedding.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] on insert failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use docqa_index::store::VectorStore;
    /// use docqa_index::chunker::TextChunk;
    ///
    /// let store = VectorStore::in_memory().unwrap();
    /// let chunk = TextChunk {
    ///     source: PathBuf::from("notes.txt"),
    ///     chunk_index: 0,
    ///     content: "Budget approved.".into(),
    ///     content_hash: "abc123".into(),
    /// };
    /// store.insert_chunk(&chunk, &[0.1, 0.2, 0.3]).unwrap();
    /// ```
    pub fn insert_chunk(&self, chunk: &TextChunk, embedding: &[f32]) -> Result<(), DocqaError> {
        let embedding_bytes = floats_to_bytes(embedding);

        self.conn
            .execute(
                "INSERT OR REPLACE INTO chunks
                 (source, chunk_index, content, content_hash, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    chunk.source.to_string_lossy().to_string(),
                    chunk.chunk_index,
                    chunk.content,
                    chunk.content_hash,
                    embedding_bytes,
                ],
            )
            .map_err(|e| DocqaError::Database(format!("failed to insert chunk: {e}")))?;

        Ok(())
    }

    /// Insert chunks with embeddings in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] on insert failure; nothing is
    /// written in that case.
    pub fn insert_chunks(&self, chunks: &[(TextChunk, Vec<f32>)]) -> Result<(), DocqaError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| DocqaError::Database(format!("failed to begin transaction: {e}")))?;
        for (chunk, embedding) in chunks {
            self.insert_chunk(chunk, embedding)?;
        }
        tx.commit()
            .map_err(|e| DocqaError::Database(format!("failed to commit chunks: {e}")))?;
        Ok(())
    }

    /// Nearest-neighbor search by cosine similarity (computed in Rust).
    ///
    /// Loads all embeddings and returns the top `limit` chunks sorted by
    /// descending score. Ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] on query failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use docqa_index::store::VectorStore;
    ///
    /// let store = VectorStore::in_memory().unwrap();
    /// let results = store.vector_search(&[0.1, 0.2], 5).unwrap();
    /// assert!(results.is_empty());
    /// ```
    pub fn vector_search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, DocqaError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT source, chunk_index, content, embedding
                 FROM chunks ORDER BY id",
            )
            .map_err(|e| DocqaError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let embedding_bytes: Vec<u8> = row.get(3)?;
                let embedding = bytes_to_floats(&embedding_bytes);
                Ok(RetrievedChunk {
                    source: PathBuf::from(row.get::<_, String>(0)?),
                    chunk_index: row.get(1)?,
                    content: row.get(2)?,
                    score: cosine_similarity(query_embedding, &embedding),
                })
            })
            .map_err(|e| DocqaError::Database(format!("failed to query chunks: {e}")))?;

        let mut scored = Vec::new();
        for row in rows {
            scored.push(row.map_err(|e| DocqaError::Database(format!("failed to read row: {e}")))?);
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    /// Get index statistics.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Database`] on query failure.
    pub fn stats(&self) -> Result<IndexStats, DocqaError> {
        let total_chunks: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(|e| DocqaError::Database(format!("failed to count chunks: {e}")))?;

        let total_documents: i64 = self
            .conn
            .query_row("SELECT COUNT(DISTINCT source) FROM chunks", [], |row| {
                row.get(0)
            })
            .map_err(|e| DocqaError::Database(format!("failed to count documents: {e}")))?;

        // For in-memory databases, page_count returns a small number
        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(IndexStats {
            total_chunks: total_chunks as usize,
            total_documents: total_documents as usize,
            index_size_bytes: (page_count * page_size) as u64,
        })
    }
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(source: &str, index: u32, content: &str) -> TextChunk {
        TextChunk {
            source: PathBuf::from(source),
            chunk_index: index,
            content: content.into(),
            content_hash: format!("hash_{source}_{index}"),
        }
    }

    #[test]
    fn create_store_and_insert() {
        let store = VectorStore::in_memory().unwrap();
        let chunk = sample_chunk("a.txt", 0, "hello");
        store.insert_chunk(&chunk, &[0.1, 0.2, 0.3]).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.total_documents, 1);
    }

    #[test]
    fn vector_search_ranks_by_similarity() {
        let store = VectorStore::in_memory().unwrap();
        store
            .insert_chunks(&[
                (sample_chunk("rust.md", 0, "Rust ownership"), vec![1.0, 0.0, 0.0]),
                (sample_chunk("python.md", 0, "Python GIL"), vec![0.0, 1.0, 0.0]),
            ])
            .unwrap();

        let results = store.vector_search(&[0.9, 0.1, 0.0], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, PathBuf::from("rust.md"));
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn vector_search_respects_limit() {
        let store = VectorStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .insert_chunk(&sample_chunk("doc.txt", i, "x"), &[1.0, i as f32])
                .unwrap();
        }
        let results = store.vector_search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_index, 0);
    }

    #[test]
    fn reinserting_same_position_replaces() {
        let store = VectorStore::in_memory().unwrap();
        store
            .insert_chunk(&sample_chunk("a.txt", 0, "old"), &[1.0])
            .unwrap();
        store
            .insert_chunk(&sample_chunk("a.txt", 0, "new"), &[1.0])
            .unwrap();

        assert_eq!(store.stats().unwrap().total_chunks, 1);
        let results = store.vector_search(&[1.0], 1).unwrap();
        assert_eq!(results[0].content, "new");
    }

    #[test]
    fn stats_count_distinct_documents() {
        let store = VectorStore::in_memory().unwrap();
        store
            .insert_chunks(&[
                (sample_chunk("a.txt", 0, "a0"), vec![0.1]),
                (sample_chunk("a.txt", 1, "a1"), vec![0.2]),
                (sample_chunk("b.txt", 0, "b0"), vec![0.3]),
            ])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.total_documents, 2);
    }

    #[test]
    fn persisted_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.db");
        {
            let store = VectorStore::open(&path).unwrap();
            store
                .insert_chunk(&sample_chunk("a.txt", 0, "kept"), &[1.0, 0.0])
                .unwrap();
            store.set_dimensions(2).unwrap();
        }

        let store = VectorStore::open(&path).unwrap();
        assert_eq!(store.stats().unwrap().total_chunks, 1);
        assert_eq!(store.dimensions().unwrap(), Some(2));
    }

    #[test]
    fn cosine_similarity_correct() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn floats_bytes_roundtrip() {
        let original = vec![1.0f32, -2.5, 0.0, 3.25];
        assert_eq!(bytes_to_floats(&floats_to_bytes(&original)), original);
    }

    #[test]
    fn set_dimensions_stores_and_validates() {
        let store = VectorStore::in_memory().unwrap();

        store.set_dimensions(1536).unwrap();
        assert_eq!(store.dimensions().unwrap(), Some(1536));

        store.set_dimensions(1536).unwrap();

        let err = store.set_dimensions(768).unwrap_err().to_string();
        assert!(err.contains("1536"));
        assert!(err.contains("768"));
        assert!(err.contains("--force"));
    }

    #[test]
    fn built_at_roundtrips() {
        let store = VectorStore::in_memory().unwrap();
        assert!(store.built_at().unwrap().is_none());

        let now = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        store.set_built_at(now).unwrap();
        assert_eq!(store.built_at().unwrap(), Some(now));
    }
}
