//! Cache invalidation for the persisted index.
//!
//! The persist directory holds the SQLite index and a `data_hash` marker
//! containing the fingerprint of the data directory at build time. On
//! startup the current fingerprint is compared with the marker; any mismatch
//! (or a missing marker, which also covers an interrupted build) deletes the
//! whole persist directory so the index is rebuilt from scratch.

use std::path::{Path, PathBuf};

use docqa_core::{DocqaError, IndexConfig};
use tracing::info;

use crate::fingerprint::hash_directory_content;

/// File inside the persist directory holding the data fingerprint.
pub const MARKER_FILE: &str = "data_hash";

/// File inside the persist directory holding the vector store.
pub const INDEX_FILE: &str = "index.db";

/// State of the persisted index relative to the current data fingerprint.
///
/// # Examples
///
/// ```
/// use docqa_index::cache::CacheStatus;
///
/// assert!(CacheStatus::Fresh.is_reusable());
/// assert!(!CacheStatus::MissingMarker.is_reusable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// Persistence is turned off; the index lives in memory only.
    Disabled,
    /// No persist directory exists yet.
    Absent,
    /// The persist directory exists but has no fingerprint marker.
    MissingMarker,
    /// The marker holds a different fingerprint.
    Stale {
        /// Fingerprint recorded at build time.
        stored: String,
    },
    /// The marker matches the current data.
    Fresh,
}

impl CacheStatus {
    /// Whether the persisted index can be opened as is.
    pub fn is_reusable(&self) -> bool {
        matches!(self, CacheStatus::Fresh)
    }

    /// Short human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            CacheStatus::Disabled => "persistence disabled",
            CacheStatus::Absent => "no index built yet",
            CacheStatus::MissingMarker => "index without fingerprint (will be rebuilt)",
            CacheStatus::Stale { .. } => "data has changed (will be rebuilt)",
            CacheStatus::Fresh => "up to date",
        }
    }
}

/// What the caller has to do after [`IndexCache::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePlan {
    /// Open the existing index at [`IndexCache::index_path`].
    Reuse {
        /// Current data fingerprint.
        data_hash: String,
    },
    /// Build a new index, then call [`IndexCache::commit`] with `data_hash`.
    Rebuild {
        /// Current data fingerprint.
        data_hash: String,
    },
}

impl CachePlan {
    /// The data fingerprint the plan was computed for.
    pub fn data_hash(&self) -> &str {
        match self {
            CachePlan::Reuse { data_hash } | CachePlan::Rebuild { data_hash } => data_hash,
        }
    }
}

/// Decides whether the persisted index matches the data directory.
///
/// # Examples
///
/// ```
/// use docqa_index::cache::{CachePlan, IndexCache};
///
/// let data = tempfile::tempdir().unwrap();
/// std::fs::write(data.path().join("a.txt"), "alpha").unwrap();
/// let persist = tempfile::tempdir().unwrap();
/// let persist_dir = persist.path().join("persist");
///
/// let cache = IndexCache::new(data.path(), &persist_dir, true);
/// let plan = cache.prepare().unwrap();
/// assert!(matches!(plan, CachePlan::Rebuild { .. }));
///
/// // ... build the index into cache.index_path() ...
/// cache.commit(plan.data_hash()).unwrap();
/// assert!(matches!(cache.prepare().unwrap(), CachePlan::Reuse { .. }));
/// ```
#[derive(Debug, Clone)]
pub struct IndexCache {
    data_dir: PathBuf,
    persist_dir: PathBuf,
    persist: bool,
}

impl IndexCache {
    /// Create a cache for `data_dir`, persisted under `persist_dir` when
    /// `persist` is true.
    pub fn new(data_dir: impl Into<PathBuf>, persist_dir: impl Into<PathBuf>, persist: bool) -> Self {
        Self {
            data_dir: data_dir.into(),
            persist_dir: persist_dir.into(),
            persist,
        }
    }

    /// Create a cache from the `[index]` configuration section.
    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(
            config.data_dir.clone(),
            config.persist_dir.clone(),
            config.persist,
        )
    }

    /// Directory whose content is fingerprinted.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding the persisted index.
    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    /// Whether the index is persisted at all.
    pub fn is_persistent(&self) -> bool {
        self.persist
    }

    /// Path of the SQLite index inside the persist directory.
    pub fn index_path(&self) -> PathBuf {
        self.persist_dir.join(INDEX_FILE)
    }

    /// Path of the fingerprint marker inside the persist directory.
    pub fn marker_path(&self) -> PathBuf {
        self.persist_dir.join(MARKER_FILE)
    }

    /// Fingerprint of the data directory right now.
    ///
    /// # Errors
    ///
    /// See [`hash_directory_content`].
    pub fn data_hash(&self) -> Result<String, DocqaError> {
        hash_directory_content(&self.data_dir)
    }

    /// Classify the persisted index against `data_hash` without touching it.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Io`] if the marker exists but cannot be read.
    pub fn inspect(&self, data_hash: &str) -> Result<CacheStatus, DocqaError> {
        if !self.persist {
            return Ok(CacheStatus::Disabled);
        }
        if !self.persist_dir.exists() {
            return Ok(CacheStatus::Absent);
        }

        let marker = self.marker_path();
        if !marker.exists() {
            return Ok(CacheStatus::MissingMarker);
        }

        let stored = std::fs::read_to_string(&marker)?;
        if stored == data_hash {
            Ok(CacheStatus::Fresh)
        } else {
            Ok(CacheStatus::Stale { stored })
        }
    }

    /// Fingerprint the data, discard a persisted index that does not match
    /// it, and report whether to reuse or rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::FileNotFound`] if the data directory is missing
    /// and [`DocqaError::Io`] if the persist directory cannot be read or
    /// removed.
    pub fn prepare(&self) -> Result<CachePlan, DocqaError> {
        let data_hash = self.data_hash()?;
        info!("Data hash: {data_hash}");

        let status = self.inspect(&data_hash)?;
        match &status {
            CacheStatus::MissingMarker => {
                self.remove_persisted()?;
                info!(
                    persist_dir = %self.persist_dir.display(),
                    "persist directory had no fingerprint, deleted"
                );
            }
            CacheStatus::Stale { stored } => {
                info!(stored = %stored, "data has changed, deleting index");
                self.remove_persisted()?;
            }
            CacheStatus::Fresh => {
                info!("reusing the existing index");
                return Ok(CachePlan::Reuse { data_hash });
            }
            CacheStatus::Absent | CacheStatus::Disabled => {}
        }

        info!("creating new index");
        Ok(CachePlan::Rebuild { data_hash })
    }

    /// Delete any persisted index, then [`prepare`](Self::prepare).
    ///
    /// # Errors
    ///
    /// Same as [`prepare`](Self::prepare).
    pub fn prepare_forced(&self) -> Result<CachePlan, DocqaError> {
        if self.persist {
            self.remove_persisted()?;
        }
        self.prepare()
    }

    /// Record `data_hash` as the fingerprint of a completed build.
    ///
    /// Does nothing when persistence is disabled. Must only be called after
    /// the index has been fully written.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Io`] if the marker cannot be written.
    pub fn commit(&self, data_hash: &str) -> Result<(), DocqaError> {
        if !self.persist {
            return Ok(());
        }
        std::fs::create_dir_all(&self.persist_dir)?;
        std::fs::write(self.marker_path(), data_hash)?;
        info!(
            persist_dir = %self.persist_dir.display(),
            "saved index fingerprint for later use"
        );
        Ok(())
    }

    fn remove_persisted(&self) -> Result<(), DocqaError> {
        match std::fs::remove_dir_all(&self.persist_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
