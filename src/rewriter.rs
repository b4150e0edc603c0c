//! Playlist rewriting
//!
//! Walks an HLS playlist line by line and replaces every media or playlist
//! reference with a proxy URL of the form `<proxy-base>/url/<token>[.m3u8]`,
//! so that a player fetches every dependent resource through this proxy with
//! the same spoofed `Origin`/`Referer` as the playlist itself.
//!
//! Rewriting is best-effort per line: a reference that cannot be resolved or
//! encoded is left exactly as it was, the rest of the playlist is still
//! rewritten.

use crate::models::RequestDescriptor;
use crate::token::{self, PLAYLIST_SUFFIX};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

/// Media and playlist file extensions, optionally followed by a query string
static MEDIA_EXTENSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(ts|m3u8|m4s|mp4|key|aac|mp3|vtt|webvtt)(\?.*)?$")
        .expect("media extension regex is valid")
});

/// How a single playlist line is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Blank line or `#` tag/comment
    Directive,
    /// Looks like a URL or a media/playlist file reference
    Reference,
    /// Anything else; left alone
    Other,
}

/// Outcome of rewriting one reference line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRewrite {
    /// The line was replaced with a proxy URL
    Rewritten(String),
    /// The line is emitted as-is
    Unchanged,
}

/// Classify a playlist line
pub fn classify_line(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        LineKind::Directive
    } else if is_likely_media_reference(trimmed) {
        LineKind::Reference
    } else {
        LineKind::Other
    }
}

/// Whether a trimmed, non-directive line is likely a URL or media reference
///
/// Absolute forms are recognised by prefix; bare relative filenames need the
/// extension check since segment lines usually carry no scheme.
pub fn is_likely_media_reference(line: &str) -> bool {
    if line.is_empty() || line.starts_with('#') {
        return false;
    }

    if line.starts_with("http://") || line.starts_with("https://") || line.starts_with('/') {
        return true;
    }

    MEDIA_EXTENSION_REGEX.is_match(line)
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Resolve `reference` against `base_url`
///
/// Absolute references are returned unchanged. Relative ones go through the
/// standard URL join first and fall back to [`naive_join`] if either side
/// does not parse, so this always produces a result.
pub fn resolve_url(base_url: &str, reference: &str) -> String {
    if is_absolute_url(reference) {
        return reference.to_string();
    }

    match Url::parse(base_url).and_then(|base| base.join(reference)) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            debug!(
                "Standard URL join failed for base={}, reference={}: {}; using string join",
                base_url, reference, e
            );
            naive_join(base_url, reference)
        }
    }
}

/// String-based URL join used when the base does not parse as a URL
pub fn naive_join(base_url: &str, reference: &str) -> String {
    let without_query = base_url
        .find(|c: char| c == '?' || c == '#')
        .map(|idx| &base_url[..idx])
        .unwrap_or(base_url);

    // scheme://authority within `without_query`, or empty when there is no scheme
    let origin_end = without_query
        .find("://")
        .map(|idx| {
            let after = idx + 3;
            without_query[after..]
                .find('/')
                .map(|slash| after + slash)
                .unwrap_or(without_query.len())
        })
        .unwrap_or(0);

    if let Some(rest) = reference.strip_prefix("//") {
        let scheme = without_query.split("://").next().filter(|_| origin_end > 0);
        return match scheme {
            Some(scheme) => format!("{}://{}", scheme, rest),
            None => reference.to_string(),
        };
    }

    if reference.starts_with('/') {
        return format!("{}{}", &without_query[..origin_end], reference);
    }

    match without_query.rfind('/') {
        Some(idx) if idx >= origin_end => format!("{}{}", &without_query[..=idx], reference),
        _ if origin_end > 0 => format!("{}/{}", &without_query[..origin_end], reference),
        _ => reference.to_string(),
    }
}

/// Whether the URL's path names a playlist, for the `.m3u8` extension hint
fn has_playlist_path(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().contains(PLAYLIST_SUFFIX),
        Err(_) => url.to_ascii_lowercase().contains(PLAYLIST_SUFFIX),
    }
}

/// Rewrites playlists fetched for one entry descriptor
pub struct PlaylistRewriter<'a> {
    origin: &'a RequestDescriptor,
    proxy_base: &'a str,
}

impl<'a> PlaylistRewriter<'a> {
    /// Create a new PlaylistRewriter
    ///
    /// # Arguments
    /// * `origin` - Descriptor the playlist was fetched with; its URL is the
    ///   resolution base and its headers propagate to every reference
    /// * `proxy_base` - Externally visible `scheme://host[:port]` of this proxy
    pub fn new(origin: &'a RequestDescriptor, proxy_base: &'a str) -> Self {
        PlaylistRewriter {
            origin,
            proxy_base: proxy_base.trim_end_matches('/'),
        }
    }

    /// Rewrite a whole playlist
    ///
    /// Lines are split on `\n` with a trailing `\r` dropped, and joined back
    /// with `\n`. Directive lines and unrecognised lines are emitted verbatim.
    pub fn rewrite(&self, content: &str) -> String {
        let mut rewritten = 0usize;
        let mut output: Vec<String> = Vec::new();

        for raw_line in content.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            match classify_line(line) {
                LineKind::Directive | LineKind::Other => output.push(line.to_string()),
                LineKind::Reference => match self.rewrite_line(line) {
                    LineRewrite::Rewritten(new_line) => {
                        rewritten += 1;
                        output.push(new_line);
                    }
                    LineRewrite::Unchanged => output.push(line.to_string()),
                },
            }
        }

        debug!(
            "Rewrote playlist from {}: {} references rewritten, {} lines total",
            self.origin.url,
            rewritten,
            output.len()
        );

        output.join("\n")
    }

    /// Rewrite a single reference line
    pub fn rewrite_line(&self, line: &str) -> LineRewrite {
        let reference = line.trim();
        let absolute = resolve_url(&self.origin.url, reference);
        let descriptor = self.origin.for_reference(absolute.as_str());

        let token = match token::encode(&descriptor) {
            Ok(token) => token,
            Err(e) => {
                warn!("Error rewriting URL '{}': {}", reference, e);
                return LineRewrite::Unchanged;
            }
        };

        let mut proxied = format!("{}/url/{}", self.proxy_base, token);
        if has_playlist_path(&absolute) {
            proxied.push_str(PLAYLIST_SUFFIX);
        }

        LineRewrite::Rewritten(proxied)
    }
}

/// Rewrite `content` so every reference routes back through `proxy_base`
pub fn rewrite_playlist(content: &str, origin: &RequestDescriptor, proxy_base: &str) -> String {
    PlaylistRewriter::new(origin, proxy_base).rewrite(content)
}
