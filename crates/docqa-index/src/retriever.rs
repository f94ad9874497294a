//! Index construction and nearest-neighbor retrieval.
//!
//! Ties the cache, document loader, chunker, embedding client and vector
//! store together: [`Retriever::open_or_build`] reuses a persisted index when
//! its fingerprint still matches the data directory and rebuilds it
//! otherwise; [`Retriever::retrieve`] embeds a query and returns the closest
//! chunks.

use std::path::Path;

use chrono::Utc;
use docqa_core::{DocqaError, IndexConfig, RetrievedChunk};
use tracing::{info, warn};

use crate::cache::{CachePlan, IndexCache};
use crate::chunker::{chunk_document, TextChunk};
use crate::embedding::EmbeddingClient;
use crate::store::{IndexStats, VectorStore};
use crate::walker::load_documents;

/// How the index behind a [`Retriever`] came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOrigin {
    /// A persisted index with a matching fingerprint was opened.
    Reused,
    /// The index was built from the data directory during this run.
    Built {
        /// Size of the new index.
        stats: IndexStats,
        /// Whether it was written to the persist directory.
        persisted: bool,
    },
}

/// Nearest-neighbor retriever over an embedded document index.
///
/// # Examples
///
/// ```no_run
/// use docqa_index::embedding::EmbeddingClient;
/// use docqa_index::retriever::Retriever;
/// use docqa_index::store::VectorStore;
///
/// let store = VectorStore::in_memory().unwrap();
/// let client = EmbeddingClient::new("key");
/// let retriever = Retriever::new(store, client);
/// ```
pub struct Retriever {
    store: VectorStore,
    embeddings: EmbeddingClient,
}

impl Retriever {
    /// Create a retriever over an existing store.
    pub fn new(store: VectorStore, embeddings: EmbeddingClient) -> Self {
        Self { store, embeddings }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Open the persisted index if its fingerprint matches the data
    /// directory, otherwise build a fresh one.
    ///
    /// With `force` the persisted index is discarded unconditionally. When
    /// persistence is disabled the index is built in memory and nothing is
    /// written to disk. The fingerprint marker is written only after a build
    /// has completed.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError`] if fingerprinting, loading, embedding, or
    /// storage fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docqa_core::IndexConfig;
    /// use docqa_index::embedding::EmbeddingClient;
    /// use docqa_index::retriever::{IndexOrigin, Retriever};
    ///
    /// # async fn example() {
    /// let client = EmbeddingClient::new("key");
    /// let (retriever, origin) = Retriever::open_or_build(&IndexConfig::default(), client, false)
    ///     .await
    ///     .unwrap();
    /// if let IndexOrigin::Built { stats, .. } = origin {
    ///     println!("indexed {} chunks", stats.total_chunks);
    /// }
    /// # }
    /// ```
    pub async fn open_or_build(
        config: &IndexConfig,
        embeddings: EmbeddingClient,
        force: bool,
    ) -> Result<(Self, IndexOrigin), DocqaError> {
        let cache = IndexCache::from_config(config);
        let plan = if force {
            cache.prepare_forced()?
        } else {
            cache.prepare()?
        };

        match plan {
            CachePlan::Reuse { .. } => {
                let store = VectorStore::open(&cache.index_path())?;
                Ok((Self::new(store, embeddings), IndexOrigin::Reused))
            }
            CachePlan::Rebuild { data_hash } => {
                let persisted = cache.is_persistent();
                let store = if persisted {
                    info!(
                        persist_dir = %cache.persist_dir().display(),
                        "saving index for later use"
                    );
                    VectorStore::open(&cache.index_path())?
                } else {
                    VectorStore::in_memory()?
                };

                let retriever = Self::new(store, embeddings);
                let stats = retriever
                    .index_directory(cache.data_dir(), config.chunk_size, config.chunk_overlap)
                    .await?;
                cache.commit(&data_hash)?;

                Ok((retriever, IndexOrigin::Built { stats, persisted }))
            }
        }
    }

    /// Load, chunk, embed and store every document under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError`] if loading, embedding, or storage fails.
    pub async fn index_directory(
        &self,
        data_dir: &Path,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<IndexStats, DocqaError> {
        let root = data_dir.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || load_documents(&root))
            .await
            .map_err(|e| DocqaError::Io(std::io::Error::other(e)))??;
        if documents.is_empty() {
            warn!(data_dir = %data_dir.display(), "no documents found to index");
        }

        let chunks: Vec<TextChunk> = documents
            .iter()
            .flat_map(|doc| chunk_document(doc, chunk_size, chunk_overlap))
            .collect();
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "embedding document chunks"
        );

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embeddings.embed_batch(&texts).await?;

            if let Some(first) = embeddings.first() {
                self.store.set_dimensions(first.len())?;
            }

            let pairs: Vec<(TextChunk, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();
            self.store.insert_chunks(&pairs)?;
        }

        self.store.set_built_at(Utc::now())?;
        self.store.stats()
    }

    /// Return the `k` chunks closest to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError`] if embedding the query or searching fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docqa_index::embedding::EmbeddingClient;
    /// use docqa_index::retriever::Retriever;
    /// use docqa_index::store::VectorStore;
    ///
    /// # async fn example() {
    /// let retriever = Retriever::new(VectorStore::in_memory().unwrap(), EmbeddingClient::new("key"));
    /// let chunks = retriever.retrieve("when is the launch?", 1).await.unwrap();
    /// # }
    /// ```
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, DocqaError> {
        let query_embedding = self.embeddings.embed_query(query).await?;
        self.store.vector_search(&query_embedding, k)
    }
}
