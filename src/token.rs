//! Token codec
//!
//! A token is the URL-safe, unpadded base64 encoding of a compact JSON
//! [`RequestDescriptor`]. Tokens are self-contained: the proxy keeps no table
//! of issued URLs, everything needed to serve a request travels in the path.
//!
//! The rewriter may append a literal `.m3u8` to a token as an extension hint
//! for players that sniff file extensions. The hint is not part of the
//! encoded data and [`decode`] strips it before decoding.

use crate::error::TokenError;
use crate::models::RequestDescriptor;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;
use tracing::debug;

/// Extension hint appended to tokens that point at playlists
pub const PLAYLIST_SUFFIX: &str = ".m3u8";

/// Payload shape accepted on decode
///
/// `url` is optional here so that a missing URL is reported as
/// [`TokenError::MissingUrl`] rather than as a generic payload error.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TokenPayload {
    url: Option<String>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    referer: Option<String>,
    #[serde(default)]
    src: bool,
}

/// Encode a descriptor into a token
///
/// The result only contains `[A-Za-z0-9_-]` and is safe to use as a single
/// path segment.
pub fn encode(descriptor: &RequestDescriptor) -> Result<String, TokenError> {
    let json = serde_json::to_vec(descriptor).map_err(|e| TokenError::BadPayload(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Remove one trailing `.m3u8` extension hint, if present
pub fn strip_playlist_suffix(token: &str) -> &str {
    token.strip_suffix(PLAYLIST_SUFFIX).unwrap_or(token)
}

/// Decode a token (with or without the `.m3u8` hint) into a descriptor
///
/// # Errors
/// * [`TokenError::BadEncoding`] if the token is not URL-safe base64 or does
///   not decode to UTF-8 text
/// * [`TokenError::BadPayload`] if the text is not a descriptor object
/// * [`TokenError::MissingUrl`] if the payload has no non-empty `url`
pub fn decode(token: &str) -> Result<RequestDescriptor, TokenError> {
    let stripped = strip_playlist_suffix(token);

    // Padding is re-derived from length alone
    let mut padded = stripped.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    let bytes = URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| TokenError::BadEncoding(e.to_string()))?;

    let text = String::from_utf8(bytes).map_err(|e| TokenError::BadEncoding(e.to_string()))?;

    let payload: TokenPayload =
        serde_json::from_str(&text).map_err(|e| TokenError::BadPayload(e.to_string()))?;

    let url = match payload.url {
        Some(url) if !url.is_empty() => url,
        _ => return Err(TokenError::MissingUrl),
    };

    debug!("Decoded token: url={}, entry_playlist={}", url, payload.src);

    Ok(RequestDescriptor {
        url,
        origin: payload.origin,
        referer: payload.referer,
        is_entry_playlist: payload.src,
    })
}
