//! Proxy request pipeline
//!
//! [`HlsProxy`] serves one `/url/{token}` request end to end:
//!
//! 1. Decode the token (failing fast with a 400-class error)
//! 2. Look up the raw token in the cache
//! 3. On a miss, fetch upstream with browser-like headers plus the
//!    descriptor's spoofed `Origin`/`Referer`
//! 4. Resolve the outbound content type
//! 5. Rewrite the body if this is an entry playlist
//! 6. Assemble response headers and store the result in the cache

use crate::cache::{CacheStats, LruResponseCache, NoopCache, ResponseCache};
use crate::classify;
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::fetcher::{ReqwestFetcher, UpstreamFetch, UpstreamResponse};
use crate::metrics::ProxyMetrics;
use crate::models::{CachedResponse, RequestDescriptor};
use crate::rewriter;
use crate::token;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Upstream headers copied onto responses that were not rewritten
pub const PASSTHROUGH_HEADERS: [&str; 3] = ["Content-Length", "Last-Modified", "ETag"];

/// The HLS proxy
pub struct HlsProxy {
    config: Arc<ProxyConfig>,
    cache: Arc<dyn ResponseCache>,
    fetcher: Arc<dyn UpstreamFetch>,
    metrics: Arc<ProxyMetrics>,
}

impl HlsProxy {
    /// Create a new HlsProxy with the default fetcher and cache for `config`
    pub fn new(config: Arc<ProxyConfig>) -> Result<Self> {
        let fetcher: Arc<dyn UpstreamFetch> = Arc::new(ReqwestFetcher::from_config(&config)?);
        let cache: Arc<dyn ResponseCache> = if config.enable_cache {
            Arc::new(LruResponseCache::new(config.cache_size_bytes))
        } else {
            Arc::new(NoopCache)
        };

        Ok(Self::with_components(config, cache, fetcher))
    }

    /// Create a new HlsProxy from explicit collaborators
    pub fn with_components(
        config: Arc<ProxyConfig>,
        cache: Arc<dyn ResponseCache>,
        fetcher: Arc<dyn UpstreamFetch>,
    ) -> Self {
        HlsProxy {
            config,
            cache,
            fetcher,
            metrics: Arc::new(ProxyMetrics::new()),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ProxyMetrics {
        &self.metrics
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Build the headers sent upstream for a descriptor
    ///
    /// Empty `origin`/`referer` values are treated as absent. Values that are
    /// not valid header values are skipped.
    pub fn upstream_headers(&self, descriptor: &RequestDescriptor) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let fixed: [(&'static str, &str); 7] = [
            ("user-agent", self.config.user_agent.as_str()),
            ("accept", "*/*"),
            ("accept-language", self.config.accept_language.as_str()),
            ("connection", "keep-alive"),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "cross-site"),
        ];
        let spoofed: [(&'static str, Option<&str>); 2] = [
            ("origin", descriptor.origin.as_deref()),
            ("referer", descriptor.referer.as_deref()),
        ];

        let entries = fixed
            .into_iter()
            .map(|(name, value)| (name, Some(value)))
            .chain(spoofed);

        for (name, value) in entries {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(name), value);
                }
                Err(e) => warn!("Skipping invalid {} header value {:?}: {}", name, value, e),
            }
        }

        headers
    }

    /// Serve a `/url/{token}` request
    ///
    /// # Arguments
    /// * `raw_token` - The path segment after `/url/`, including any `.m3u8`
    ///   hint; this exact string is the cache key
    /// * `proxy_base` - Externally visible `scheme://host[:port]` of this
    ///   proxy, used when rewriting playlists
    ///
    /// # Returns
    /// * `Ok(CachedResponse)` with the body, content type and headers to send
    /// * `Err(ProxyError)` for undecodable tokens and upstream failures
    pub async fn handle(&self, raw_token: &str, proxy_base: &str) -> Result<CachedResponse> {
        self.metrics.record_request();

        let descriptor = token::decode(raw_token).map_err(|e| {
            self.metrics.record_invalid_token();
            debug!("Rejecting token {}: {}", raw_token, e);
            ProxyError::from(e)
        })?;

        if let Some(cached) = self.cache.get(raw_token).await {
            self.metrics.record_cache_hit();
            self.metrics.record_bytes_to_client(cached.body.len() as u64);
            info!("Cache HIT: {}", descriptor.url);
            return Ok(cached);
        }
        self.metrics.record_cache_miss();
        info!("Cache MISS: {}", descriptor.url);

        let upstream = self.fetch_upstream(&descriptor).await?;
        let response = self.assemble_response(&descriptor, upstream, proxy_base);

        self.cache.set(raw_token, response.clone()).await;
        self.metrics.record_bytes_to_client(response.body.len() as u64);

        Ok(response)
    }

    /// Fetch the descriptor's URL, turning non-success statuses into errors
    async fn fetch_upstream(&self, descriptor: &RequestDescriptor) -> Result<UpstreamResponse> {
        let started = Instant::now();
        let headers = self.upstream_headers(descriptor);

        let response = match self.fetcher.fetch(&descriptor.url, headers).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics
                    .record_upstream_error(matches!(e, ProxyError::UpstreamTimeout));
                return Err(e);
            }
        };

        self.metrics
            .record_upstream_fetch(response.body.len() as u64, started.elapsed());

        if !response.status.is_success() {
            self.metrics.record_upstream_error(false);
            warn!(
                "Upstream returned error status for url={}: status={}",
                descriptor.url, response.status
            );
            let body = String::from_utf8_lossy(&response.body);
            return Err(ProxyError::upstream_status(
                response.status.as_u16(),
                &body,
                self.config.error_body_limit,
            ));
        }

        Ok(response)
    }

    /// Classify, optionally rewrite, and attach response headers
    fn assemble_response(
        &self,
        descriptor: &RequestDescriptor,
        upstream: UpstreamResponse,
        proxy_base: &str,
    ) -> CachedResponse {
        let resolved_type =
            classify::resolve_content_type(&descriptor.url, upstream.header("content-type"));

        let will_rewrite =
            descriptor.is_entry_playlist && classify::is_playlist(&descriptor.url, &resolved_type);
        let content_type = if will_rewrite {
            classify::PLAYLIST_MIME.to_string()
        } else {
            resolved_type
        };
        self.metrics.record_response(will_rewrite);

        let body = if will_rewrite {
            let text = String::from_utf8_lossy(&upstream.body);
            let rewritten = rewriter::rewrite_playlist(&text, descriptor, proxy_base);
            Bytes::from(rewritten)
        } else {
            upstream.body.clone()
        };

        let mut headers = vec![
            ("Cache-Control".to_string(), self.config.cache_control()),
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
            ("Access-Control-Expose-Headers".to_string(), "*".to_string()),
        ];

        // Rewritten bodies have a different length and identity
        if !will_rewrite {
            for name in PASSTHROUGH_HEADERS {
                if let Some(value) = upstream.header(name) {
                    headers.push((name.to_string(), value.to_string()));
                }
            }
        }

        debug!(
            "Assembled response for url={}: content_type={}, rewritten={}, bytes={}",
            descriptor.url,
            content_type,
            will_rewrite,
            body.len()
        );

        CachedResponse::new(body, content_type, headers)
    }
}
