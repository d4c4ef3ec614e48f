//! Normalized request keys.
//!
//! Cache entries are keyed by the (method, URL) pair. Normalization keeps
//! lookups exact without being brittle: the method is uppercased and the URL
//! fragment is dropped (a fragment never reaches the server), while the query
//! string is preserved as-is. The stored key is a SHA-256 digest of the
//! normalized pair; the plain method and URL ride along for introspection.

use sha2::{Digest, Sha256};
use url::Url;

use crate::model::ResourceRequest;

/// Normalized lookup key for one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKey {
    method: String,
    url: Url,
    digest: String,
}

impl RequestKey {
    /// Build a key from a method and URL, normalizing both.
    pub fn new(method: &str, url: &Url) -> Self {
        let method = method.to_ascii_uppercase();
        let mut url = url.clone();
        url.set_fragment(None);
        let digest = request_digest(&method, &url);
        Self { method, url, digest }
    }

    pub fn from_request(request: &ResourceRequest) -> Self {
        Self::new(&request.method, &request.url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hex digest used as the primary key column.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Compute the digest for a normalized (method, URL) pair.
fn request_digest(method: &str, url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
