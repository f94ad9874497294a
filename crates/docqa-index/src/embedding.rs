//! OpenAI-compatible embeddings client.
//!
//! Provides batch and single-query embedding via `POST /v1/embeddings`.
//! Any provider exposing the same endpoint (OpenAI, Azure proxies, Ollama,
//! LiteLLM) works by pointing `base_url` at it.

use docqa_core::{resolve_api_key, DocqaError, EmbeddingConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for an OpenAI-compatible embeddings API.
///
/// # Examples
///
/// ```
/// use docqa_index::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::new("test-key");
/// assert_eq!(client.model(), "text-embedding-ada-002");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_BATCH_SIZE: usize = 64;
const BATCH_DELAY_MS: u64 = 200;

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingClient {
    /// Create a new client with the given API key and default settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use docqa_index::embedding::EmbeddingClient;
    ///
    /// let client = EmbeddingClient::new("my-key");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to the `API_KEY` / `OPENAI_API_KEY` env vars if no key is
    /// in the config.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Config`] if no API key is available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docqa_core::EmbeddingConfig;
    /// use docqa_index::embedding::EmbeddingClient;
    ///
    /// let config = EmbeddingConfig::default();
    /// let client = EmbeddingClient::with_config(&config).unwrap();
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, DocqaError> {
        let api_key = resolve_api_key(config.api_key.as_deref(), |name| {
            std::env::var(name).ok()
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Point the client at a different server (without the `/v1` suffix).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a batch of texts. Returns vectors in the same order.
    ///
    /// Splits into sub-batches of `batch_size` with 200ms delays between
    /// requests for rate limiting.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Embedding`] if the API call fails or returns
    /// a different number of vectors than inputs.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docqa_index::embedding::EmbeddingClient;
    ///
    /// # async fn example() {
    /// let client = EmbeddingClient::new("key");
    /// let texts = vec!["The meeting is on Tuesday.".to_string()];
    /// let embeddings = client.embed_batch(&texts).await.unwrap();
    /// assert_eq!(embeddings.len(), 1);
    /// # }
    /// ```
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DocqaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }

            debug!(batch = i, size = batch.len(), model = %self.model, "embedding batch");
            let embeddings = self.request(batch.to_vec()).await?;
            if embeddings.len() != batch.len() {
                return Err(DocqaError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    /// Embed a single query.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Embedding`] if the API call fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docqa_index::embedding::EmbeddingClient;
    ///
    /// # async fn example() {
    /// let client = EmbeddingClient::new("key");
    /// let embedding = client.embed_query("when is the meeting?").await.unwrap();
    /// assert!(!embedding.is_empty());
    /// # }
    /// ```
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DocqaError> {
        self.request(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DocqaError::Embedding("empty response from embeddings API".into()))
    }

    async fn request(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, DocqaError> {
        let request = EmbedRequest {
            model: self.model.clone(),
            input,
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| DocqaError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(DocqaError::Embedding(format!(
                "embeddings API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DocqaError::Embedding(format!("failed to parse response: {e}")))?;

        Ok(into_ordered_vectors(embed_response))
    }

    /// Build the JSON request body for an embed call (for testing).
    #[cfg(test)]
    fn build_request(&self, texts: &[String]) -> EmbedRequest {
        EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        }
    }
}

fn into_ordered_vectors(response: EmbedResponse) -> Vec<Vec<f32>> {
    let mut data = response.data;
    data.sort_by_key(|item| item.index);
    data.into_iter().map(|item| item.embedding).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn request_format_is_correct() {
        let client = EmbeddingClient::new("test-key");
        let texts = vec!["first".to_string(), "second".to_string()];
        let request = client.build_request(&texts);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-ada-002");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn response_is_reordered_by_index() {
        let json = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.4, 0.5]},
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}
            ],
            "model": "text-embedding-ada-002"
        }"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        let vectors = into_ordered_vectors(response);
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.4, 0.5]]);
    }

    #[test]
    fn batch_splitting_calculates_correctly() {
        let texts: Vec<String> = (0..150).map(|i| format!("text {i}")).collect();
        let batches: Vec<&[String]> = texts.chunks(DEFAULT_BATCH_SIZE).collect();
        assert_eq!(batches.len(), 3); // 64 + 64 + 22
        assert_eq!(batches[2].len(), 22);
    }

    #[test]
    fn config_values_are_applied() {
        let config = EmbeddingConfig {
            api_key: Some("cfg-key".into()),
            model: "text-embedding-3-small".into(),
            base_url: Some("http://localhost:9999".into()),
            batch_size: 8,
        };
        let client = EmbeddingClient::with_config(&config).unwrap();
        assert_eq!(client.model(), "text-embedding-3-small");
        let debug = format!("{client:?}");
        assert!(debug.contains("localhost:9999"));
        assert!(!debug.contains("cfg-key"), "API key must not leak into Debug");
    }

    #[tokio::test]
    async fn embed_batch_calls_endpoint_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 0, "embedding": [1.0, 0.0]},
                    {"index": 1, "embedding": [0.0, 1.0]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = EmbeddingClient::new("test-key").with_base_url(server.uri());
        let vectors = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_batch_rejects_short_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new("k").with_base_url(server.uri());
        let err = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 2 embeddings"));
    }

    #[tokio::test]
    async fn api_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = EmbeddingClient::new("bad").with_base_url(server.uri());
        let err = client.embed_query("hello").await.unwrap_err().to_string();
        assert!(err.contains("401"), "unexpected error: {err}");
        assert!(err.contains("invalid api key"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = EmbeddingClient::new("k").with_base_url(server.uri());
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    }
}
