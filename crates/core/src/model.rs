//! Request and response model shared by the store, the gateway and the worker.
//!
//! A [`ResourceRequest`] is the worker's view of one intercepted request:
//! method, URL, headers and an opaque body that is carried through untouched
//! (it never participates in cache keying). A [`StoredResponse`] is the shape
//! responses take both in flight and at rest in the store.

use bytes::Bytes;
use url::Url;

/// File extensions the fallback chain treats as image resources.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "ico"];

/// One intercepted resource request.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResourceRequest {
    /// A plain GET request with no headers and no body.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, headers: Vec::new(), body: Bytes::new() }
    }

    /// Append a header. Convenience for construction sites and tests.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the accept preferences ask for an HTML document.
    ///
    /// A missing accept header resolves to `false` rather than faulting.
    pub fn accepts_html(&self) -> bool {
        self.header("accept").is_some_and(|v| v.contains("text/html"))
    }

    /// Whether the URL path names an image resource.
    pub fn is_image_target(&self) -> bool {
        let path = self.url.path();
        match path.rsplit_once('.') {
            Some((_, ext)) => IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
            None => false,
        }
    }

    /// Whether the URL scheme is one the cache handles.
    pub fn has_cacheable_scheme(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Whether this request is subject to caching logic at all.
    pub fn is_interceptable(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET") && self.has_cacheable_scheme()
    }
}

/// A response as stored in (and served from) the cache.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StoredResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// True for 2xx statuses. Precache requires this of every manifest entry.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
