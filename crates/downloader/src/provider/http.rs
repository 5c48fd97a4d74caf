//! Provider for S3-compatible HTTP object stores.
//!
//! Objects are fetched with `GET <base>/<path>`. Listing uses the
//! `ListObjectsV2` query (`list-type=2`) and extracts the `<Key>` elements of
//! the XML response.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mirror_streams::{StreamFilename, StreamType};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{select_signatures, StreamFileProvider};
use crate::address_book::ConsensusNode;
use crate::error::ProviderError;

/// Default timeout for a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries of transient failures.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default delay between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Configuration for [`HttpStreamFileProvider`].
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Bucket endpoint, e.g. `https://storage.example.com/mirror-streams`.
    pub base_url: String,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// HTTP-backed provider.
#[derive(Debug, Clone)]
pub struct HttpStreamFileProvider {
    client: Client,
    base_url: String,
    config: HttpProviderConfig,
}

impl HttpStreamFileProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(false)
            .build()
            .map_err(|e| ProviderError::Permanent(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// Runs `request` until it succeeds, fails permanently, or retries run out.
    async fn with_retries<F, Fut>(&self, url: &str, request: F) -> Result<Bytes, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Bytes, ProviderError>>,
    {
        let mut last_error = None;
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                debug!(url, attempt, "Retrying request after delay");
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match request().await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() => {
                    warn!(url, attempt, error = %e, "Request attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| ProviderError::Transient(format!("{} failed after retries", url))))
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Bytes, ProviderError> {
        let response = request.send().await.map_err(|e| classify_reqwest(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }
        response.bytes().await.map_err(|e| classify_reqwest(url, e))
    }
}

fn classify_status(url: &str, status: StatusCode) -> ProviderError {
    if status == StatusCode::NOT_FOUND {
        ProviderError::NotFound(url.to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ProviderError::Transient(format!("HTTP {} for {}", status.as_u16(), url))
    } else {
        ProviderError::Permanent(format!("HTTP {} for {}", status.as_u16(), url))
    }
}

fn classify_reqwest(url: &str, err: reqwest::Error) -> ProviderError {
    if err.is_builder() {
        ProviderError::Permanent(format!("{}: {}", url, err))
    } else {
        ProviderError::Transient(format!("{}: {}", url, err))
    }
}

/// Extracts the text of every `<Key>` element.
pub(crate) fn parse_list_keys(xml: &str) -> Vec<&str> {
    const OPEN: &str = "<Key>";
    const CLOSE: &str = "</Key>";
    let mut keys = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        match after.find(CLOSE) {
            Some(end) => {
                keys.push(&after[..end]);
                rest = &after[end + CLOSE.len()..];
            }
            None => break,
        }
    }
    keys
}

#[async_trait]
impl StreamFileProvider for HttpStreamFileProvider {
    async fn get(&self, _node: &ConsensusNode, path: &str) -> Result<Bytes, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        self.with_retries(&url, || self.send(self.client.get(&url), &url))
            .await
    }

    async fn list_after(
        &self,
        node: &ConsensusNode,
        stream_type: StreamType,
        after: Option<&StreamFilename>,
        limit: usize,
    ) -> Result<Vec<StreamFilename>, ProviderError> {
        let prefix = format!("{}/", stream_type.node_directory(&node.node_account_id));
        let start_after = after
            .map(|a| format!("{}{}", prefix, a.signature_name()))
            .unwrap_or_default();
        // Data files interleave with signatures in the listing.
        let max_keys = limit.saturating_mul(2).max(1).to_string();
        let url = format!("{}/", self.base_url);

        let body = self
            .with_retries(&url, || {
                let request = self.client.get(&url).query(&[
                    ("list-type", "2"),
                    ("prefix", prefix.as_str()),
                    ("start-after", start_after.as_str()),
                    ("max-keys", max_keys.as_str()),
                ]);
                self.send(request, &url)
            })
            .await?;

        let xml = String::from_utf8_lossy(&body);
        let names = parse_list_keys(&xml)
            .into_iter()
            .filter_map(|key| key.strip_prefix(prefix.as_str()));
        Ok(select_signatures(names, stream_type, after, limit))
    }
}
