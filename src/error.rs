//! Error types for the HLS proxy

use thiserror::Error;

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Reasons a path token could not be turned into a request descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not valid URL-safe base64, or the decoded bytes are not UTF-8
    #[error("Invalid base64 encoding: {0}")]
    BadEncoding(String),

    /// Decoded text is not a well-formed descriptor payload
    #[error("Invalid JSON in proxy data: {0}")]
    BadPayload(String),

    /// Payload has no usable target URL
    #[error("Invalid proxy data format: missing or empty url")]
    MissingUrl,
}

/// Error types that can occur while serving a proxied request
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("{0}")]
    InvalidToken(#[from] TokenError),

    #[error("Upstream returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("Upstream request timed out")]
    UpstreamTimeout,

    #[error("Upstream request failed: {0}")]
    UpstreamUnreachable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::IoError(err.to_string())
    }
}

impl ProxyError {
    /// Convert error to HTTP status code
    ///
    /// - Token errors are the client's fault: 400
    /// - Upstream status errors pass the upstream code through unchanged
    /// - Timeouts become 504 Gateway Timeout
    /// - Network failures become 502 Bad Gateway
    /// - Everything else is a 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            ProxyError::InvalidToken(_) => 400,
            ProxyError::UpstreamStatus { status, .. } => *status,
            ProxyError::UpstreamTimeout => 504,
            ProxyError::UpstreamUnreachable(_) => 502,
            ProxyError::ConfigError(_) => 500,
            ProxyError::IoError(_) => 500,
            ProxyError::InternalError(_) => 500,
        }
    }

    /// Whether the error was produced before any upstream interaction
    pub fn is_client_error(&self) -> bool {
        matches!(self, ProxyError::InvalidToken(_))
    }

    /// Create an UpstreamStatus error, truncating the upstream body to
    /// `limit` characters
    pub fn upstream_status(status: u16, body: &str, limit: usize) -> Self {
        let message: String = body.chars().take(limit).collect();
        ProxyError::UpstreamStatus { status, message }
    }
}
