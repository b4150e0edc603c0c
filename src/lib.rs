//! HLS Proxy
//!
//! A forwarding proxy for HLS (HTTP Live Streaming) media. It fetches a remote
//! playlist or media segment on behalf of a client, rewrites entry playlists
//! so that every URL they reference routes back through the proxy, and caches
//! responses to avoid redundant upstream fetches.
//!
//! # Overview
//!
//! Every proxied resource is addressed as `/url/<token>`, where the token is
//! the URL-safe base64 encoding of a small JSON [`RequestDescriptor`]: the
//! upstream URL, optional `Origin`/`Referer` values to present upstream, and
//! whether the resource is an entry playlist. Tokens are self-contained, so
//! the proxy keeps no per-session state.
//!
//! When an entry playlist is fetched, each segment and variant reference in
//! it is resolved against the playlist URL and replaced with a freshly minted
//! token pointing back at the proxy. The player then fetches every dependent
//! resource through the same egress point with the same spoofed headers.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hls_proxy::{HlsProxy, ProxyConfig, ProxyServer};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ProxyConfig::from_file("hls_proxy.yaml")?);
//! let addr = config.socket_addr()?;
//!
//! let proxy = Arc::new(HlsProxy::new(config)?);
//! ProxyServer::new(proxy).run(addr).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Minting a token
//!
//! ```rust
//! use hls_proxy::{token, RequestDescriptor};
//!
//! let descriptor = RequestDescriptor::new("https://cdn.example.com/master.m3u8")
//!     .with_referer("https://player.example.com/")
//!     .entry_playlist();
//!
//! let token = token::encode(&descriptor).unwrap();
//! let path = format!("/url/{}.m3u8", token);
//!
//! assert_eq!(token::decode(&token).unwrap(), descriptor);
//! # let _ = path;
//! ```
//!
//! # Architecture
//!
//! - [`token`]: token codec
//! - [`rewriter`]: playlist rewriting
//! - [`classify`]: content type resolution and playlist detection
//! - [`UpstreamFetch`] / [`ReqwestFetcher`]: upstream fetch capability
//! - [`ResponseCache`] / [`LruResponseCache`]: response cache capability
//! - [`HlsProxy`]: the request pipeline
//! - [`ProxyServer`]: hyper HTTP server and supplementary endpoints
//! - [`ProxyMetrics`]: runtime counters
//!
//! # Configuration
//!
//! Configuration is loaded from a YAML file; every field is optional:
//!
//! ```yaml
//! listen_address: "0.0.0.0:8080"
//! request_timeout_secs: 30
//! max_redirects: 10
//! enable_cache: true
//! cache_size_bytes: 419430400   # 400MB
//! cache_max_age_secs: 3600
//! error_body_limit: 200
//! log_level: info
//! ```
//!
//! See [`ProxyConfig`] for all options.

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod models;
pub mod proxy;
pub mod rewriter;
pub mod server;
pub mod token;

// Re-export commonly used types
pub use cache::{CacheStats, LruResponseCache, NoopCache, ResponseCache};
pub use config::ProxyConfig;
pub use error::{ProxyError, Result, TokenError};
pub use fetcher::{ReqwestFetcher, UpstreamFetch, UpstreamResponse};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use models::{CachedResponse, RequestDescriptor};
pub use proxy::HlsProxy;
pub use rewriter::{LineKind, LineRewrite, PlaylistRewriter};
pub use server::ProxyServer;
