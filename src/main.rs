//! HLS Proxy Server
//!
//! Loads configuration, sets up logging, and starts the HTTP proxy service.
//!
//! # Usage
//! ```bash
//! # Start with default configuration
//! hls-proxy
//!
//! # Start with a config file
//! hls-proxy /path/to/hls_proxy.yaml
//! ```

use anyhow::Context;
use hls_proxy::{HlsProxy, ProxyConfig, ProxyServer};
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => ProxyConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => ProxyConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting HLS proxy server");
    info!("  - Listen address: {}", config.listen_address);
    info!("  - Upstream timeout: {}s", config.request_timeout_secs);
    info!("  - Max redirects: {}", config.max_redirects);
    info!("  - Cache enabled: {}", config.enable_cache);
    info!(
        "  - Cache size: {} bytes ({} MB)",
        config.cache_size_bytes,
        config.cache_size_bytes / (1024 * 1024)
    );

    let addr = config.socket_addr()?;
    let proxy = Arc::new(HlsProxy::new(Arc::new(config)).context("Failed to create proxy")?);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    ProxyServer::new(proxy).serve(listener, shutdown).await?;

    info!("Server stopped");
    Ok(())
}
