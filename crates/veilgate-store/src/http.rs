//! HTTP object store
//!
//! Proxies fetches to an upstream object service over HTTP. Upstream status
//! codes are classified into the fetch error taxonomy and bodies are
//! forwarded as a stream without buffering.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode, header};
use thiserror::Error;
use tracing::debug;

use veilgate_core::{
    ByteRange, FetchError, FetchedObject, ObjectId, ObjectStore, ResponseMetadata,
};

/// Client settings for the upstream object service.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL the object id is appended to
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
    /// User-Agent header value
    pub user_agent: String,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            timeout_secs: 600,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 32,
            user_agent: format!("veilgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Failure to build the HTTP client at startup.
#[derive(Debug, Error)]
#[error("failed to build http client: {0}")]
pub struct HttpStoreInitError(#[from] reqwest::Error);

/// Store backed by an upstream HTTP object service.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, HttpStoreInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(
        &self,
        id: &ObjectId,
        range: Option<&ByteRange>,
    ) -> Result<FetchedObject, FetchError> {
        let url = format!("{}/{}", self.base_url, id.as_str().trim_start_matches('/'));
        let mut request = self.client.get(&url);
        if let Some(range) = range {
            request = request.header(header::RANGE, format!("bytes={}", range));
        }
        debug!("Fetching {}", url);

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("request to upstream failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, id));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let stream = response.bytes_stream().map(|item| {
            item.map_err(|e| FetchError::Transient(format!("upstream body error: {}", e)))
        });

        Ok(FetchedObject {
            metadata: ResponseMetadata { content_type },
            stream: Box::new(Box::pin(stream)),
        })
    }
}

fn classify_status(status: StatusCode, id: &ObjectId) -> FetchError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound(id.clone()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::AccessDenied(id.clone()),
        _ => FetchError::Transient(format!("upstream returned {}", status)),
    }
}
