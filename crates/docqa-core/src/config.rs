use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DocqaError;

/// Environment variables consulted for the API key, in priority order.
///
/// `API_KEY` is the name used in `.env` files; `OPENAI_API_KEY` is accepted
/// as a fallback so an existing OpenAI setup works unchanged.
pub const API_KEY_ENV_VARS: [&str; 2] = ["API_KEY", "OPENAI_API_KEY"];

/// Top-level configuration loaded from `.docqa.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use docqa_core::DocqaConfig;
///
/// let config = DocqaConfig::default();
/// assert_eq!(config.llm.model, "gpt-3.5-turbo");
/// assert_eq!(config.retrieval.k, 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocqaConfig {
    /// Chat completion provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Data directory, persistence and chunking settings.
    #[serde(default)]
    pub index: IndexConfig,
    /// Retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl DocqaConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Io`] if the file cannot be read, or
    /// [`DocqaError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docqa_core::DocqaConfig;
    /// use std::path::Path;
    ///
    /// let config = DocqaConfig::from_file(Path::new(".docqa.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DocqaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use docqa_core::DocqaConfig;
    ///
    /// let toml = r#"
    /// [index]
    /// data_dir = "docs"
    /// "#;
    /// let config = DocqaConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.index.data_dir.to_str(), Some("docs"));
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DocqaError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Config`] describing the first invalid value.
    ///
    /// # Examples
    ///
    /// ```
    /// use docqa_core::DocqaConfig;
    ///
    /// let mut config = DocqaConfig::default();
    /// assert!(config.validate().is_ok());
    /// config.index.chunk_overlap = config.index.chunk_size;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), DocqaError> {
        if self.index.chunk_size == 0 {
            return Err(DocqaError::Config("index.chunk_size must be positive".into()));
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(DocqaError::Config(format!(
                "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }
        if self.retrieval.k == 0 {
            return Err(DocqaError::Config("retrieval.k must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(DocqaError::Config(
                "embedding.batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Pick the API key: an explicit value wins, then the first set variable
/// from [`API_KEY_ENV_VARS`] as reported by `lookup`.
///
/// `lookup` is normally `|name| std::env::var(name).ok()`.
///
/// # Errors
///
/// Returns [`DocqaError::Config`] if no key is available.
///
/// # Examples
///
/// ```
/// use docqa_core::resolve_api_key;
///
/// let key = resolve_api_key(None, |name| {
///     (name == "OPENAI_API_KEY").then(|| "sk-test".to_string())
/// })
/// .unwrap();
/// assert_eq!(key, "sk-test");
/// ```
pub fn resolve_api_key(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, DocqaError> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }
    API_KEY_ENV_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            DocqaError::Config(
                "API key not found: set API_KEY (or OPENAI_API_KEY) in the environment or .env, \
                 or api_key in .docqa.toml"
                    .into(),
            )
        })
}

/// Chat completion provider configuration.
///
/// # Examples
///
/// ```
/// use docqa_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-3.5-turbo");
/// assert_eq!(config.temperature, 0.7);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests (without the `/v1` suffix).
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

/// Configuration for the embedding provider.
///
/// # Examples
///
/// ```
/// use docqa_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.model, "text-embedding-ada-002");
/// assert_eq!(config.batch_size, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key for the embedding provider.
    pub api_key: Option<String>,
    /// Model name (default: `"text-embedding-ada-002"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Custom base URL for API requests (without the `/v1` suffix).
    pub base_url: Option<String>,
    /// Number of texts per embedding request (default: 64).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_embedding_model(),
            base_url: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Where documents come from and where the index is cached.
///
/// # Examples
///
/// ```
/// use docqa_core::IndexConfig;
///
/// let config = IndexConfig::default();
/// assert!(config.persist);
/// assert_eq!(config.persist_dir.to_str(), Some("persist"));
/// assert_eq!(config.chunk_size, 1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Folder whose documents are indexed (default: `data/`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Folder holding the persisted index and its fingerprint marker.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
    /// Reuse the index across runs (default: true).
    #[serde(default = "default_persist")]
    pub persist: bool,
    /// Maximum chunk length in characters (default: 1000).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks (default: 0).
    #[serde(default)]
    pub chunk_overlap: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/")
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("persist")
}

fn default_persist() -> bool {
    true
}

fn default_chunk_size() -> usize {
    1000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persist_dir: default_persist_dir(),
            persist: default_persist(),
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the LLM per question (default: 1).
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    1
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = DocqaConfig::default();
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(config.llm.api_key.is_none());
        assert!(config.llm.base_url.is_none());
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
        assert_eq!(config.index.data_dir, PathBuf::from("data/"));
        assert_eq!(config.index.persist_dir, PathBuf::from("persist"));
        assert!(config.index.persist);
        assert_eq!(config.index.chunk_overlap, 0);
        assert_eq!(config.retrieval.k, 1);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
model = "gpt-4o-mini"
base_url = "http://localhost:11434"
temperature = 0.0

[embedding]
model = "text-embedding-3-small"
batch_size = 16

[index]
data_dir = "docs"
persist_dir = ".cache/docqa"
persist = false
chunk_size = 500
chunk_overlap = 50

[retrieval]
k = 4
"#;
        let config = DocqaConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.batch_size, 16);
        assert_eq!(config.index.data_dir, PathBuf::from("docs"));
        assert_eq!(config.index.persist_dir, PathBuf::from(".cache/docqa"));
        assert!(!config.index.persist);
        assert_eq!(config.index.chunk_size, 500);
        assert_eq!(config.index.chunk_overlap, 50);
        assert_eq!(config.retrieval.k, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = DocqaConfig::from_toml("").unwrap();
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(config.index.persist);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = DocqaConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_zero_k() {
        let mut config = DocqaConfig::default();
        config.retrieval.k = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retrieval.k"), "unexpected error: {err}");
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_size() {
        let mut config = DocqaConfig::default();
        config.index.chunk_size = 100;
        config.index.chunk_overlap = 150;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chunk_overlap"), "unexpected error: {err}");
    }

    #[test]
    fn explicit_api_key_wins() {
        let key = resolve_api_key(Some("from-config"), |_| Some("from-env".into())).unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn api_key_env_prefers_api_key_over_openai() {
        let key = resolve_api_key(None, |name| match name {
            "API_KEY" => Some("primary".into()),
            "OPENAI_API_KEY" => Some("fallback".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "primary");
    }

    #[test]
    fn blank_values_are_ignored() {
        let key = resolve_api_key(Some("  "), |name| match name {
            "API_KEY" => Some(String::new()),
            "OPENAI_API_KEY" => Some("fallback".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "fallback");
    }

    #[test]
    fn missing_api_key_gives_clear_error() {
        let err = resolve_api_key(None, |_| None).unwrap_err().to_string();
        assert!(err.contains("API key"), "error should mention API key: {err}");
    }
}
