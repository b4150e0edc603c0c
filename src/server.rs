//! HTTP server
//!
//! A hyper HTTP/1.1 accept loop in front of [`HlsProxy`].
//!
//! # Endpoints
//! - `GET /url/{token}` - Proxied playlist or segment
//! - `GET /` - Service description
//! - `GET /health` - Health status
//! - `GET /stats` - Cache and request statistics as JSON
//! - `GET /metrics` - Prometheus format metrics
//! - `OPTIONS *` - CORS preflight

use crate::error::Result;
use crate::models::CachedResponse;
use crate::proxy::HlsProxy;
use bytes::Bytes;
use http::response::Builder;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Path prefix of the proxy endpoint
pub const URL_ROUTE_PREFIX: &str = "/url/";

const SERVICE_NAME: &str = "HLS Proxy Server";

/// HTTP front end for the proxy
pub struct ProxyServer {
    proxy: Arc<HlsProxy>,
}

impl ProxyServer {
    /// Create a new ProxyServer
    pub fn new(proxy: Arc<HlsProxy>) -> Self {
        Self { proxy }
    }

    /// Bind `addr` and serve until the process is terminated
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serve connections from `listener` until `shutdown` completes
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("HLS proxy listening on http://{}", local_addr);
        info!("  GET /url/<token> - Proxied playlists and segments");
        info!("  GET /health      - Health status");
        info!("  GET /stats       - Cache statistics");
        info!("  GET /metrics     - Prometheus metrics");

        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("Shutting down listener on {}", local_addr);
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let proxy = Arc::clone(&self.proxy);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let proxy = Arc::clone(&proxy);
                    async move { handle_request(proxy, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error from {}: {}", peer_addr, err);
                }
            });
        }
    }
}

/// Handle one HTTP request
///
/// Generic over the body type since no route reads a request body.
pub async fn handle_request<B>(
    proxy: Arc<HlsProxy>,
    req: Request<B>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("{} {}", method, req.uri());

    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    let is_known_route = matches!(path.as_str(), "/" | "/health" | "/stats" | "/metrics")
        || path.starts_with(URL_ROUTE_PREFIX);

    if method != Method::GET {
        return Ok(if is_known_route {
            detail_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        } else {
            detail_response(StatusCode::NOT_FOUND, "Not Found")
        });
    }

    let response = match path.as_str() {
        "/" => json_response(
            StatusCode::OK,
            serde_json::json!({
                "status": "online",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "endpoint": "/url/<base64_data>",
            }),
        ),
        "/health" => json_response(StatusCode::OK, serde_json::json!({ "status": "healthy" })),
        "/stats" => stats_response(&proxy),
        "/metrics" => finish(
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8"),
            Bytes::from(proxy.metrics().get_stats().to_prometheus()),
        ),
        _ => match path.strip_prefix(URL_ROUTE_PREFIX) {
            Some(raw_token) => {
                let proxy_base = proxy_base_url(req.uri(), req.headers());
                match proxy.handle(raw_token, &proxy_base).await {
                    Ok(cached) => proxied_response(cached),
                    Err(e) => {
                        info!("Request for {} failed: {}", path, e);
                        let status = StatusCode::from_u16(e.to_http_status())
                            .unwrap_or(StatusCode::BAD_GATEWAY);
                        detail_response(status, &e.to_string())
                    }
                }
            }
            None => detail_response(StatusCode::NOT_FOUND, "Not Found"),
        },
    };

    Ok(response)
}

/// Externally visible `scheme://host[:port]` of this proxy for a request
///
/// The scheme comes from `X-Forwarded-Proto` when present, then the request
/// URI, then defaults to `http`. The host comes from the URI authority, then
/// the `Host` header.
pub fn proxy_base_url(uri: &http::Uri, headers: &HeaderMap) -> String {
    let scheme = header_str(headers, "x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");

    let host = uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| header_str(headers, "host"))
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Build a response, falling back to a bare 500 if the builder rejects it
fn finish(builder: Builder, body: Bytes) -> Response<Full<Bytes>> {
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        let mut response = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    finish(
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*"),
        Bytes::from(body.to_string()),
    )
}

/// Error body in the `{"detail": ...}` shape
fn detail_response(status: StatusCode, detail: &str) -> Response<Full<Bytes>> {
    json_response(status, serde_json::json!({ "detail": detail }))
}

fn stats_response(proxy: &HlsProxy) -> Response<Full<Bytes>> {
    let cache = proxy.cache_stats();
    let metrics = proxy.metrics().get_stats();

    json_response(
        StatusCode::OK,
        serde_json::json!({
            "cache": {
                "entries": cache.total_entries,
                "bytes": cache.total_bytes,
                "max_bytes": cache.max_bytes,
                "hits": cache.hits,
                "misses": cache.misses,
                "evictions": cache.evictions,
            },
            "requests": metrics,
        }),
    )
}

fn proxied_response(cached: CachedResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", cached.content_type.as_str());

    for (name, value) in &cached.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    finish(builder, cached.body)
}

fn preflight_response() -> Response<Full<Bytes>> {
    finish(
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "*")
            .header("Access-Control-Allow-Headers", "*")
            .header("Access-Control-Allow-Credentials", "true"),
        Bytes::new(),
    )
}
