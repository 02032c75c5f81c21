use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use crate::domain::DomainError;

/// Stream type for HTTP responses
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Transport-level failure, translated to [`DomainError`] at the adapter boundary
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl HttpError {
    /// Map into the domain taxonomy on behalf of `provider`.
    ///
    /// 400 and 422 mean the request itself was rejected and are surfaced as
    /// invalid; every other failure is recoverable.
    pub fn into_domain(self, provider: &str) -> DomainError {
        match self {
            Self::Timeout { timeout_ms } => DomainError::provider_timeout(provider, timeout_ms),
            Self::Status { status: 400 | 422, body } => {
                DomainError::invalid_request(format!("{} rejected the request: {}", provider, body))
            }
            other => DomainError::provider_transport(provider, other.to_string()),
        }
    }
}

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, HttpError>;

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, HttpError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout: Some(timeout),
        })
    }

    fn map_error(&self, error: reqwest::Error) -> HttpError {
        if error.is_timeout() {
            HttpError::Timeout {
                timeout_ms: self.timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
            }
        } else if error.is_decode() {
            HttpError::Decode(error.to_string())
        } else {
            HttpError::Transport(error.to_string())
        }
    }

    async fn send(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, HttpError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.json(body).send().await.map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status { status, body });
        }

        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, HttpError> {
        let response = self.send(url, headers, body).await?;

        let bytes = response.bytes().await.map_err(|e| self.map_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| HttpError::Decode(e.to_string()))
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, HttpError> {
        use futures::StreamExt;

        let response = self.send(url, headers, body).await?;

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| HttpError::Transport(format!("stream error: {}", e))));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::stream;
    use std::sync::Mutex;

    /// Replays canned stream chunks, used where chunk boundaries matter
    #[derive(Debug, Default)]
    pub struct MockHttpClient {
        stream_chunks: Vec<Bytes>,
        last_body: Mutex<Option<serde_json::Value>>,
    }

    impl MockHttpClient {
        pub fn with_stream_chunks(chunks: Vec<&'static str>) -> Self {
            Self {
                stream_chunks: chunks
                    .into_iter()
                    .map(|chunk| Bytes::from_static(chunk.as_bytes()))
                    .collect(),
                last_body: Mutex::new(None),
            }
        }

        pub fn last_body(&self) -> Option<serde_json::Value> {
            self.last_body.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClientTrait for MockHttpClient {
        async fn post_json(
            &self,
            url: &str,
            _headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<serde_json::Value, HttpError> {
            *self.last_body.lock().unwrap() = Some(body.clone());
            Err(HttpError::Transport(format!("no mock response for {}", url)))
        }

        async fn post_json_stream(
            &self,
            _url: &str,
            _headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<ByteStream, HttpError> {
            *self.last_body.lock().unwrap() = Some(body.clone());
            let chunks = self.stream_chunks.clone();
            Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
        }
    }
}
