use std::path::PathBuf;

/// Errors that can occur across docqa.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary reports it through `miette`.
///
/// # Examples
///
/// ```
/// use docqa_core::DocqaError;
///
/// let err = DocqaError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DocqaError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding API or response error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector store failure.
    #[error("database error: {0}")]
    Database(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file or directory was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DocqaError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = DocqaError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = DocqaError::FileNotFound(PathBuf::from("/tmp/data"));
        assert!(err.to_string().contains("/tmp/data"));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DocqaError = json_err.into();
        assert!(err.to_string().starts_with("serialization error"));
    }
}
