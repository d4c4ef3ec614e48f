//! Per-request decision logic: bypass, cache-first lookup, network fetch
//! with opportunistic caching, or the offline fallback chain.

use std::sync::Arc;

use larder_client::Network;
use larder_core::Error;
use larder_core::cache::{Generation, RequestKey};
use larder_core::model::{ResourceRequest, StoredResponse};
use tokio::task::JoinHandle;
use url::Url;

use crate::active::ActiveSlot;
use crate::config::WorkerConfig;

const OFFLINE_BODY: &str = "Network unavailable and no cached copy of this resource exists.";
const OFFLINE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Non-GET or non-http(s); forwarded with no cache involvement.
    Bypass,
    /// Exact hit in the active generation.
    Cache,
    /// Live upstream response.
    Network,
    /// Offline; cached fallback document for an HTML request.
    FallbackDocument,
    /// Offline; cached default icon for an image request.
    FallbackIcon,
    /// Offline; synthesized plain-text response.
    Offline,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::Cache => "cache",
            Self::Network => "network",
            Self::FallbackDocument => "fallback-document",
            Self::FallbackIcon => "fallback-icon",
            Self::Offline => "offline",
        }
    }
}

/// A served response plus bookkeeping.
///
/// `pending_write` is the in-flight store of a runtime-cached response.
/// Awaiting it observes the write (tests do); dropping it lets the write
/// finish in the background.
pub struct FetchOutcome {
    pub response: StoredResponse,
    pub served_from: ServedFrom,
    pub pending_write: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    fn new(response: StoredResponse, served_from: ServedFrom) -> Self {
        Self { response, served_from, pending_write: None }
    }
}

pub struct FetchInterceptor {
    config: Arc<WorkerConfig>,
    network: Arc<dyn Network>,
    slot: ActiveSlot,
}

impl FetchInterceptor {
    pub fn new(config: Arc<WorkerConfig>, network: Arc<dyn Network>, slot: ActiveSlot) -> Self {
        Self { config, network, slot }
    }

    /// Serve one intercepted request.
    ///
    /// With no active generation the cache steps degrade to plain
    /// forwarding: every lookup misses and nothing is stored.
    ///
    /// # Errors
    ///
    /// Only bypassed requests propagate network errors; intercepted GETs
    /// always resolve to a response via the fallback chain.
    pub async fn handle(&self, request: ResourceRequest) -> Result<FetchOutcome, Error> {
        if !request.is_interceptable() {
            tracing::debug!(method = %request.method, url = %request.url, "bypassing");
            let response = self.network.forward(&request).await?;
            return Ok(FetchOutcome::new(response, ServedFrom::Bypass));
        }

        let generation = self.slot.get();

        if let Some(generation) = &generation {
            let key = RequestKey::from_request(&request);
            match generation.lookup(&key).await {
                Ok(Some(stored)) => {
                    tracing::debug!(url = %request.url, "cache hit");
                    return Ok(FetchOutcome::new(stored, ServedFrom::Cache));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(url = %request.url, error = ?e, "cache lookup failed; treating as miss");
                }
            }
        }

        match self.network.forward(&request).await {
            Ok(response) => {
                let pending_write = if response.status == 200 {
                    generation.map(|generation| spawn_store(generation, &request, &response))
                } else {
                    None
                };
                tracing::debug!(url = %request.url, status = response.status, "served from network");
                Ok(FetchOutcome { response, served_from: ServedFrom::Network, pending_write })
            }
            Err(e) if e.is_network_failure() => {
                tracing::debug!(url = %request.url, error = ?e, "offline; applying fallback chain");
                Ok(self.fallback(&request, generation.as_ref()).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Offline substitution, in order: cached fallback document for HTML
    /// requests, cached icon for image requests, synthesized 503 for the
    /// rest. A missing fallback entry cascades to the next branch.
    async fn fallback(&self, request: &ResourceRequest, generation: Option<&Generation>) -> FetchOutcome {
        if request.accepts_html()
            && let Some(found) = self.fallback_entry(generation, &self.config.fallback_document).await
        {
            return FetchOutcome::new(found, ServedFrom::FallbackDocument);
        }

        if request.is_image_target()
            && let Some(found) = self.fallback_entry(generation, &self.config.fallback_icon).await
        {
            return FetchOutcome::new(found, ServedFrom::FallbackIcon);
        }

        FetchOutcome::new(offline_response(), ServedFrom::Offline)
    }

    async fn fallback_entry(&self, generation: Option<&Generation>, url: &Url) -> Option<StoredResponse> {
        let generation = generation?;
        match generation.lookup(&RequestKey::new("GET", url)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%url, error = ?e, "fallback lookup failed");
                None
            }
        }
    }
}

/// Duplicate a fresh network response into the store without delaying the
/// caller. Write failures are logged; the response is already on its way.
fn spawn_store(generation: Generation, request: &ResourceRequest, response: &StoredResponse) -> JoinHandle<()> {
    let key = RequestKey::from_request(request);
    let copy = response.clone();
    let url = request.url.clone();
    tokio::spawn(async move {
        if let Err(e) = generation.store(&key, &copy).await {
            tracing::warn!(%url, error = ?e, "runtime cache write failed");
        }
    })
}

fn offline_response() -> StoredResponse {
    StoredResponse::new(
        503,
        vec![("content-type".to_string(), OFFLINE_CONTENT_TYPE.to_string())],
        OFFLINE_BODY.as_bytes().to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockNetwork, html, response, worker_config};
    use larder_core::CacheDb;

    async fn fixture() -> (FetchInterceptor, Arc<MockNetwork>, Generation, ActiveSlot) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = Arc::new(worker_config());
        let network = MockNetwork::new();
        let slot = ActiveSlot::new();
        let generation = Generation::open(&db, &config.tag).await.unwrap();
        slot.set(generation.clone());
        let interceptor = FetchInterceptor::new(config, network.clone(), slot.clone());
        (interceptor, network, generation, slot)
    }

    fn get(url: &str) -> ResourceRequest {
        ResourceRequest::get(Url::parse(url).unwrap())
    }

    fn key(url: &str) -> RequestKey {
        RequestKey::new("GET", &Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_cache_hit_never_touches_network() {
        let (interceptor, network, generation, _) = fixture().await;
        generation.store(&key("https://app.example/"), &html("cached root")).await.unwrap();

        let outcome = interceptor.handle(get("https://app.example/")).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Cache);
        assert_eq!(outcome.response.body, b"cached root".to_vec());
        assert_eq!(network.total_calls(), 0);
        assert!(outcome.pending_write.is_none());
    }

    #[tokio::test]
    async fn test_miss_fetches_and_caches_ok_response() {
        let (interceptor, network, generation, _) = fixture().await;
        network.route("https://app.example/data.json", response(200, "application/json", "{}"));

        let outcome = interceptor.handle(get("https://app.example/data.json")).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Network);
        outcome.pending_write.unwrap().await.unwrap();

        let stored = generation.lookup(&key("https://app.example/data.json")).await.unwrap();
        assert_eq!(stored.unwrap().body, b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_cached_copy_serves_later_offline_request() {
        let (interceptor, network, _, _) = fixture().await;
        network.route("https://app.example/data.json", response(200, "application/json", "{}"));

        let first = interceptor.handle(get("https://app.example/data.json")).await.unwrap();
        first.pending_write.unwrap().await.unwrap();

        network.set_offline(true);
        let second = interceptor.handle(get("https://app.example/data.json")).await.unwrap();

        assert_eq!(second.served_from, ServedFrom::Cache);
        assert_eq!(second.response.body, b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_non_200_response_is_not_cached() {
        let (interceptor, network, generation, _) = fixture().await;
        network.route("https://app.example/teapot", response(418, "text/plain", "short and stout"));

        let outcome = interceptor.handle(get("https://app.example/teapot")).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Network);
        assert_eq!(outcome.response.status, 418);
        assert!(outcome.pending_write.is_none());
        assert!(generation.lookup(&key("https://app.example/teapot")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_bypasses_cache() {
        let (interceptor, network, generation, _) = fixture().await;
        generation.store(&key("https://app.example/api"), &html("stale")).await.unwrap();
        network.route("https://app.example/api", response(200, "application/json", "fresh"));

        let mut request = get("https://app.example/api");
        request.method = "POST".to_string();

        let outcome = interceptor.handle(request).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Bypass);
        assert_eq!(outcome.response.body, b"fresh".to_vec());
        assert_eq!(network.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_extension_scheme_bypasses_cache() {
        let (interceptor, network, _, _) = fixture().await;

        let outcome = interceptor
            .handle(get("chrome-extension://abcdef/popup.html"))
            .await
            .unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Bypass);
        assert_eq!(network.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_bypass_propagates_network_error() {
        let (interceptor, network, _, _) = fixture().await;
        network.set_offline(true);

        let mut request = get("https://app.example/api");
        request.method = "POST".to_string();

        let result = interceptor.handle(request).await;
        assert!(matches!(result, Err(Error::NetworkUnreachable(_))));
    }

    #[tokio::test]
    async fn test_offline_html_request_gets_fallback_document() {
        let (interceptor, network, generation, _) = fixture().await;
        generation
            .store(&key("https://app.example/index.html"), &html("<!doctype html>"))
            .await
            .unwrap();
        network.set_offline(true);

        let request = get("https://app.example/reports/today")
            .with_header("accept", "text/html,application/xhtml+xml");
        let outcome = interceptor.handle(request).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::FallbackDocument);
        assert_eq!(outcome.response.body, b"<!doctype html>".to_vec());
    }

    #[tokio::test]
    async fn test_offline_image_request_gets_fallback_icon() {
        let (interceptor, network, generation, _) = fixture().await;
        generation
            .store(&key("https://app.example/icon-192.png"), &response(200, "image/png", "png bytes"))
            .await
            .unwrap();
        network.set_offline(true);

        let outcome = interceptor.handle(get("https://app.example/photos/cat.png")).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::FallbackIcon);
        assert_eq!(outcome.response.body, b"png bytes".to_vec());
    }

    #[tokio::test]
    async fn test_offline_html_beats_image_extension() {
        let (interceptor, network, generation, _) = fixture().await;
        generation
            .store(&key("https://app.example/index.html"), &html("shell"))
            .await
            .unwrap();
        network.set_offline(true);

        let request = get("https://app.example/gallery.png").with_header("accept", "text/html");
        let outcome = interceptor.handle(request).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::FallbackDocument);
    }

    #[tokio::test]
    async fn test_offline_other_request_gets_plain_503() {
        let (interceptor, network, _, _) = fixture().await;
        network.set_offline(true);

        let request = get("https://app.example/api/data").with_header("accept", "application/json");
        let outcome = interceptor.handle(request).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Offline);
        assert_eq!(outcome.response.status, 503);
        assert_eq!(outcome.response.content_type(), Some("text/plain; charset=utf-8"));
        assert_eq!(outcome.response.body, OFFLINE_BODY.as_bytes().to_vec());
    }

    #[tokio::test]
    async fn test_offline_missing_fallback_entry_cascades_to_503() {
        let (interceptor, network, _, _) = fixture().await;
        network.set_offline(true);

        let request = get("https://app.example/page").with_header("accept", "text/html");
        let outcome = interceptor.handle(request).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Offline);
        assert_eq!(outcome.response.status, 503);
    }

    #[tokio::test]
    async fn test_offline_request_without_accept_header_is_safe() {
        let (interceptor, network, _, _) = fixture().await;
        network.set_offline(true);

        let outcome = interceptor.handle(get("https://app.example/api/data")).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Offline);
    }

    #[tokio::test]
    async fn test_no_active_generation_forwards_without_caching() {
        let (interceptor, network, generation, slot) = fixture().await;
        slot.clear();
        network.route("https://app.example/data.json", response(200, "application/json", "{}"));

        let outcome = interceptor.handle(get("https://app.example/data.json")).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Network);
        assert!(outcome.pending_write.is_none());
        assert!(generation.lookup(&key("https://app.example/data.json")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_active_generation_offline_yields_503() {
        let (interceptor, network, _, slot) = fixture().await;
        slot.clear();
        network.set_offline(true);

        let request = get("https://app.example/").with_header("accept", "text/html");
        let outcome = interceptor.handle(request).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Offline);
        assert_eq!(outcome.response.status, 503);
    }

    #[tokio::test]
    async fn test_too_large_fetch_falls_back() {
        let (interceptor, network, _, _) = fixture().await;
        network.fail_with("https://app.example/huge.bin", || {
            Error::FetchTooLarge("9000000 bytes exceeds 5242880".into())
        });

        let outcome = interceptor.handle(get("https://app.example/huge.bin")).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Offline);
    }
}
