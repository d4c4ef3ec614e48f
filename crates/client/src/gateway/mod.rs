//! Upstream HTTP gateway.
//!
//! ### Forwarding
//! - Any method and status pass through; the caller decides what to cache.
//! - Hop-by-hop headers are stripped in both directions.
//! - Host and Content-Length are recomputed by the HTTP client.
//!
//! ### Safety Gates
//! - Only http(s) URLs are forwarded.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! The [`Network`] trait is the seam tests and the worker use; the real
//! implementation is [`HttpGateway`] on reqwest.

use std::time::{Duration, Instant};

use larder_core::Error;
use larder_core::model::{ResourceRequest, StoredResponse};
use reqwest::Client;

/// Headers that describe the connection rather than the resource.
/// Never forwarded upstream and never stored.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Configuration for the upstream gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// User agent string (default: "larder/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            user_agent: "larder/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// Upstream transport the worker fetches through.
///
/// Transport failures surface as [`Error::NetworkUnreachable`]; an upstream
/// response with any HTTP status is `Ok`.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Forward a request to the upstream origin and collect the response.
    async fn forward(&self, request: &ResourceRequest) -> Result<StoredResponse, Error>;
}

/// HTTP gateway with safety checks.
pub struct HttpGateway {
    http: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Gateway(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Network for HttpGateway {
    async fn forward(&self, request: &ResourceRequest) -> Result<StoredResponse, Error> {
        let start = Instant::now();

        if !request.has_cacheable_scheme() {
            return Err(Error::MalformedRequest(format!(
                "cannot forward scheme {}",
                request.url.scheme()
            )));
        }

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::MalformedRequest(format!("invalid method {:?}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            if is_hop_by_hop(name)
                || name.eq_ignore_ascii_case("host")
                || name.eq_ignore_ascii_case("content-length")
            {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::NetworkUnreachable(format!("network error: {}", e)))?;

        let status = response.status();

        let content_length = response.content_length();
        if let Some(len) = content_length
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        // The client transparently decompresses, so the wire Content-Length
        // and Content-Encoding no longer describe the body we hold. Cookies
        // are per-client credentials and must never land in the shared cache.
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| {
                let name = name.as_str();
                !is_hop_by_hop(name)
                    && !name.eq_ignore_ascii_case("content-length")
                    && !name.eq_ignore_ascii_case("content-encoding")
                    && !name.eq_ignore_ascii_case("set-cookie")
                    && !name.eq_ignore_ascii_case("set-cookie2")
            })
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkUnreachable(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            "forwarded {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(StoredResponse::new(status.as_u16(), headers, bytes.to_vec()))
    }
}
