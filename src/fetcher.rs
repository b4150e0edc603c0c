//! Upstream fetcher for retrieving playlists and segments from origin servers

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Raw upstream response, before any classification or rewriting
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Header value as a string, if present and valid
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Capability for fetching an upstream URL
///
/// Implementations follow redirects and enforce a timeout. A non-success
/// status is not an error at this level; it is returned in
/// [`UpstreamResponse::status`].
///
/// # Errors
/// * [`ProxyError::UpstreamTimeout`] when the timeout elapses
/// * [`ProxyError::UpstreamUnreachable`] for any other transport failure
#[async_trait]
pub trait UpstreamFetch: Send + Sync {
    async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<UpstreamResponse>;
}

/// reqwest-backed [`UpstreamFetch`]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Create a new ReqwestFetcher with a 30 second timeout and up to 10
    /// redirects
    pub fn new() -> Result<Self> {
        Self::with_settings(Duration::from_secs(30), 10)
    }

    /// Create a new ReqwestFetcher from proxy configuration
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        Self::with_settings(
            Duration::from_secs(config.request_timeout_secs),
            config.max_redirects,
        )
    }

    /// Create a new ReqwestFetcher with a custom timeout and redirect limit
    pub fn with_settings(timeout: Duration, max_redirects: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(max_redirects))
            .build()
            .map_err(|e| ProxyError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ReqwestFetcher { client })
    }
}

fn map_transport_error(url: &str, err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        warn!("Upstream request timed out for url={}", url);
        ProxyError::UpstreamTimeout
    } else {
        warn!("Upstream request failed for url={}: {}", url, err);
        ProxyError::UpstreamUnreachable(err.to_string())
    }
}

#[async_trait]
impl UpstreamFetch for ReqwestFetcher {
    async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<UpstreamResponse> {
        debug!("Fetching upstream url={}", url);
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        info!(
            "Fetched upstream url={}: status={}, bytes={}, elapsed={:?}",
            url,
            status,
            body.len(),
            started.elapsed()
        );

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
