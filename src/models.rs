//! Core data models for the HLS proxy

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The upstream request a token stands for
///
/// Field order matches the serialized token payload. Optional headers are
/// omitted from the payload entirely when absent so that a decoded token
/// never gains a key it did not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Absolute upstream URL to fetch
    pub url: String,

    /// Value for the upstream `Origin` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Value for the upstream `Referer` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    /// Rewrite the response if it turns out to be a playlist
    #[serde(rename = "src", default)]
    pub is_entry_playlist: bool,
}

impl RequestDescriptor {
    /// Create a descriptor for `url` with no spoofed headers
    pub fn new(url: impl Into<String>) -> Self {
        RequestDescriptor {
            url: url.into(),
            origin: None,
            referer: None,
            is_entry_playlist: false,
        }
    }

    /// Set the upstream `Origin` header
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the upstream `Referer` header
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Mark this descriptor as a client-initiated playlist request
    pub fn entry_playlist(mut self) -> Self {
        self.is_entry_playlist = true;
        self
    }

    /// Descriptor for a reference discovered inside this descriptor's playlist
    ///
    /// Origin and referer carry over; the entry flag never does.
    pub fn for_reference(&self, url: impl Into<String>) -> Self {
        RequestDescriptor {
            url: url.into(),
            origin: self.origin.clone(),
            referer: self.referer.clone(),
            is_entry_playlist: false,
        }
    }
}

/// A fully assembled proxy response, as stored in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Response body bytes
    pub body: Bytes,
    /// Resolved outbound `Content-Type`
    pub content_type: String,
    /// Additional response headers, in emission order
    pub headers: Vec<(String, String)>,
}

impl CachedResponse {
    /// Create a new CachedResponse
    pub fn new(body: Bytes, content_type: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        CachedResponse {
            body,
            content_type: content_type.into(),
            headers,
        }
    }

    /// Approximate memory footprint, used as the cache cost of this entry
    pub fn size(&self) -> usize {
        let header_bytes: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len())
            .sum();
        self.body.len() + self.content_type.len() + header_bytes
    }

    /// Look up a stored header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_reference_resets_entry_flag() {
        let parent = RequestDescriptor::new("https://cdn.example.com/master.m3u8")
            .with_origin("https://site.example")
            .with_referer("https://site.example/watch")
            .entry_playlist();

        let child = parent.for_reference("https://cdn.example.com/720p/video.m3u8");

        assert_eq!(child.url, "https://cdn.example.com/720p/video.m3u8");
        assert_eq!(child.origin.as_deref(), Some("https://site.example"));
        assert_eq!(child.referer.as_deref(), Some("https://site.example/watch"));
        assert!(!child.is_entry_playlist);
    }

    #[test]
    fn test_serialization_omits_absent_headers() {
        let descriptor = RequestDescriptor::new("https://a.example/x.ts");
        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(json, r#"{"url":"https://a.example/x.ts","src":false}"#);
    }

    #[test]
    fn test_entry_flag_defaults_to_false() {
        let descriptor: RequestDescriptor =
            serde_json::from_str(r#"{"url":"https://a.example/x.m3u8"}"#).unwrap();
        assert!(!descriptor.is_entry_playlist);
        assert!(descriptor.origin.is_none());
    }

    #[test]
    fn test_cached_response_size_and_header_lookup() {
        let response = CachedResponse::new(
            Bytes::from_static(b"12345"),
            "video/mp2t",
            vec![("ETag".to_string(), "\"abc\"".to_string())],
        );
        assert_eq!(response.size(), 5 + "video/mp2t".len() + 4 + 5);
        assert_eq!(response.header("etag"), Some("\"abc\""));
        assert_eq!(response.header("last-modified"), None);
    }
}
