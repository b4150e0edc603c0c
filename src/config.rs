//! Configuration management for the HLS proxy

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Configuration for the proxy server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Address the HTTP server binds to (default: 0.0.0.0:8080)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Upstream fetch timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of redirects followed per upstream fetch (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Whether to cache responses (default: true)
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Cache size bound in bytes (default: 400MB)
    #[serde(default = "default_cache_size")]
    pub cache_size_bytes: usize,

    /// `max-age` advertised in the `Cache-Control` response header (default: 3600)
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,

    /// User-Agent sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language sent upstream
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Characters of an upstream error body included in error details (default: 200)
    #[serde(default = "default_error_body_limit")]
    pub error_body_limit: usize,

    /// Log level: trace, debug, info, warn or error (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions for serde
fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    400 * 1024 * 1024 // 400MB
}

fn default_cache_max_age() -> u64 {
    3600 // 1 hour
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:143.0) Gecko/20100101 Firefox/143.0".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.5".to_string()
}

fn default_error_body_limit() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            listen_address: default_listen_address(),
            request_timeout_secs: default_request_timeout(),
            max_redirects: default_max_redirects(),
            enable_cache: default_true(),
            cache_size_bytes: default_cache_size(),
            cache_max_age_secs: default_cache_max_age(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            error_body_limit: default_error_body_limit(),
            log_level: default_log_level(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(ProxyConfig)` if loading and validation succeed
    /// * `Err(ProxyError)` if file cannot be read or config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ProxyError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ProxyConfig = serde_yaml::from_str(content).map_err(|e| {
            ProxyError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - listen_address must be a socket address
    /// - request_timeout_secs must be > 0
    /// - cache_size_bytes must be > 0 when caching is enabled
    /// - user_agent must not be empty
    /// - log_level must be a known level
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.request_timeout_secs == 0 {
            return Err(ProxyError::ConfigError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.enable_cache && self.cache_size_bytes == 0 {
            return Err(ProxyError::ConfigError(
                "cache_size_bytes must be greater than 0 when caching is enabled".to_string(),
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(ProxyError::ConfigError(
                "user_agent must not be empty".to_string(),
            ));
        }

        self.tracing_level()?;

        Ok(())
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            ProxyError::ConfigError(format!(
                "Invalid listen_address '{}': {}",
                self.listen_address, e
            ))
        })
    }

    /// Parsed log level
    pub fn tracing_level(&self) -> Result<tracing::Level> {
        self.log_level.parse().map_err(|_| {
            ProxyError::ConfigError(format!(
                "Invalid log_level '{}', must be one of trace, debug, info, warn, error",
                self.log_level
            ))
        })
    }

    /// Value of the `Cache-Control` header on proxied responses
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache_max_age_secs)
    }
}
