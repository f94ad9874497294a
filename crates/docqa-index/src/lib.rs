//! Document indexing, cache invalidation, and nearest-neighbor retrieval.
//!
//! Walks a data directory, fingerprints its content to decide whether a
//! persisted index can be reused, splits documents into chunks, embeds them
//! through an OpenAI-compatible API, and stores them in SQLite for cosine
//! similarity search.

pub mod cache;
pub mod chunker;
pub mod embedding;
pub mod fingerprint;
pub mod retriever;
pub mod store;
pub mod walker;
