//! Content classification for upstream responses
//!
//! Decides the outbound `Content-Type` of a proxied response and whether the
//! response is a playlist eligible for rewriting.

use url::Url;

/// MIME type for HLS playlists
pub const PLAYLIST_MIME: &str = "application/vnd.apple.mpegurl";

/// MIME type for MPEG transport stream segments
pub const TRANSPORT_STREAM_MIME: &str = "video/mp2t";

/// MIME type for MP4 media
pub const MP4_MIME: &str = "video/mp4";

/// MIME type for WebVTT subtitles
pub const SUBTITLE_MIME: &str = "text/vtt";

/// MIME type for fragmented MP4 segments
pub const SEGMENT_MIME: &str = "video/iso.segment";

/// Fallback when neither the URL nor the upstream declares a type
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Extension table, checked in order
const EXTENSION_TYPES: &[(&[&str], &str)] = &[
    (&[".m3u8"], PLAYLIST_MIME),
    (&[".ts"], TRANSPORT_STREAM_MIME),
    (&[".mp4"], MP4_MIME),
    (&[".vtt", ".webvtt"], SUBTITLE_MIME),
    (&[".m4s"], SEGMENT_MIME),
];

/// Lowercased path component of `url`, without query or fragment
fn lowercase_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => {
            let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
            url[..end].to_ascii_lowercase()
        }
    }
}

/// Content type implied by the URL's file extension, if any
pub fn content_type_for_url(url: &str) -> Option<&'static str> {
    let path = lowercase_path(url);
    EXTENSION_TYPES
        .iter()
        .find(|(extensions, _)| extensions.iter().any(|ext| path.ends_with(ext)))
        .map(|(_, mime)| *mime)
}

/// Resolve the outbound content type
///
/// URL extension wins over the upstream-declared type; an empty or missing
/// upstream type falls back to `application/octet-stream`.
///
/// # Arguments
/// * `url` - The resolved upstream URL
/// * `upstream_content_type` - The upstream `Content-Type` header, if any
pub fn resolve_content_type(url: &str, upstream_content_type: Option<&str>) -> String {
    if let Some(mime) = content_type_for_url(url) {
        return mime.to_string();
    }

    match upstream_content_type {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => DEFAULT_MIME.to_string(),
    }
}

/// Whether a response should be treated as a playlist
///
/// Upstreams serve playlists without the extension or without the right
/// header often enough that either signal is accepted.
pub fn is_playlist(url: &str, content_type: &str) -> bool {
    url.to_ascii_lowercase().contains(".m3u8") || content_type == PLAYLIST_MIME
}
