//! Metrics collection for the HLS proxy
//!
//! Thread-safe counters built on atomics. Exposed as JSON on `/stats` and in
//! Prometheus text format on `/metrics`.

use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for the proxy
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    // Request statistics
    total_requests: AtomicU64,
    invalid_tokens: AtomicU64,
    rewritten_playlists: AtomicU64,
    passthrough_responses: AtomicU64,

    // Cache statistics
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Upstream statistics
    upstream_requests: AtomicU64,
    upstream_errors: AtomicU64,
    upstream_timeouts: AtomicU64,

    // Byte statistics
    bytes_from_upstream: AtomicU64,
    bytes_to_client: AtomicU64,

    // Stored as microseconds
    total_upstream_duration_us: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub invalid_tokens: u64,
    pub rewritten_playlists: u64,
    pub passthrough_responses: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_requests: u64,
    pub upstream_errors: u64,
    pub upstream_timeouts: u64,
    pub bytes_from_upstream: u64,
    pub bytes_to_client: u64,
    pub total_upstream_duration_us: u64,
}

impl ProxyMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound `/url/` request
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected because its token did not decode
    pub fn record_invalid_token(&self) {
        self.invalid_tokens.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed upstream fetch
    ///
    /// # Arguments
    /// * `bytes` - Body bytes received
    /// * `duration` - Time spent on the fetch
    pub fn record_upstream_fetch(&self, bytes: u64, duration: Duration) {
        self.upstream_requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_from_upstream.fetch_add(bytes, Ordering::Relaxed);
        self.total_upstream_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a failed upstream fetch
    ///
    /// # Arguments
    /// * `timed_out` - Whether the failure was a timeout
    pub fn record_upstream_error(&self, timed_out: bool) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.upstream_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record how an upstream response body was handled
    pub fn record_response(&self, rewritten: bool) {
        if rewritten {
            self.rewritten_playlists.fetch_add(1, Ordering::Relaxed);
        } else {
            self.passthrough_responses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_bytes_to_client(&self, bytes: u64) {
        self.bytes_to_client.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    ///
    /// Fields are loaded independently, so a snapshot taken under load may
    /// not be perfectly consistent across fields.
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            invalid_tokens: self.invalid_tokens.load(Ordering::Relaxed),
            rewritten_playlists: self.rewritten_playlists.load(Ordering::Relaxed),
            passthrough_responses: self.passthrough_responses.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            upstream_requests: self.upstream_requests.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            upstream_timeouts: self.upstream_timeouts.load(Ordering::Relaxed),
            bytes_from_upstream: self.bytes_from_upstream.load(Ordering::Relaxed),
            bytes_to_client: self.bytes_to_client.load(Ordering::Relaxed),
            total_upstream_duration_us: self.total_upstream_duration_us.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Calculate cache hit rate as a percentage (0.0 to 100.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate average upstream fetch duration in milliseconds
    pub fn avg_upstream_duration_ms(&self) -> f64 {
        if self.upstream_requests == 0 {
            0.0
        } else {
            (self.total_upstream_duration_us as f64 / self.upstream_requests as f64) / 1000.0
        }
    }

    /// Format the snapshot in Prometheus exposition format
    pub fn to_prometheus(&self) -> String {
        let counters: [(&str, &str, u64); 11] = [
            ("requests_total", "Total number of proxy requests", self.total_requests),
            ("invalid_tokens_total", "Requests rejected with an undecodable token", self.invalid_tokens),
            ("rewritten_playlists_total", "Playlists rewritten to route through the proxy", self.rewritten_playlists),
            ("passthrough_responses_total", "Upstream responses passed through unmodified", self.passthrough_responses),
            ("cache_hits_total", "Number of cache hits", self.cache_hits),
            ("cache_misses_total", "Number of cache misses", self.cache_misses),
            ("upstream_requests_total", "Completed upstream fetches", self.upstream_requests),
            ("upstream_errors_total", "Failed upstream fetches", self.upstream_errors),
            ("upstream_timeouts_total", "Upstream fetches that timed out", self.upstream_timeouts),
            ("bytes_from_upstream_total", "Total bytes received from upstream", self.bytes_from_upstream),
            ("bytes_to_client_total", "Total bytes sent to clients", self.bytes_to_client),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP hls_proxy_{} {}", name, help);
            let _ = writeln!(output, "# TYPE hls_proxy_{} counter", name);
            let _ = writeln!(output, "hls_proxy_{} {}\n", name, value);
        }

        let gauges: [(&str, &str, f64); 2] = [
            ("cache_hit_rate", "Cache hit rate percentage", self.cache_hit_rate()),
            ("upstream_duration_ms_avg", "Average upstream fetch duration in milliseconds", self.avg_upstream_duration_ms()),
        ];

        for (name, help, value) in gauges {
            let _ = writeln!(output, "# HELP hls_proxy_{} {}", name, help);
            let _ = writeln!(output, "# TYPE hls_proxy_{} gauge", name);
            let _ = writeln!(output, "hls_proxy_{} {:.2}\n", name, value);
        }

        output
    }
}
