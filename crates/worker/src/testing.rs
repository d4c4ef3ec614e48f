//! Shared test doubles: a scriptable upstream and recording host adapters.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use larder_client::Network;
use larder_core::Error;
use larder_core::config::AppConfig;
use larder_core::model::{ResourceRequest, StoredResponse};
use parking_lot::Mutex;
use url::Url;

use crate::config::WorkerConfig;
use crate::host::{ClientRegistry, NotificationSink, WindowClient};

pub(crate) fn worker_config() -> WorkerConfig {
    let app = AppConfig { upstream: "https://app.example".into(), ..Default::default() };
    WorkerConfig::from_app(&app).unwrap()
}

pub(crate) fn response(status: u16, content_type: &str, body: &str) -> StoredResponse {
    StoredResponse::new(
        status,
        vec![("content-type".to_string(), content_type.to_string())],
        body.as_bytes().to_vec(),
    )
}

pub(crate) fn html(body: &str) -> StoredResponse {
    response(200, "text/html", body)
}

type FailFn = Box<dyn Fn() -> Error + Send + Sync>;

/// Scriptable [`Network`]: per-URL responses, per-URL failures, and a global
/// offline switch. Unrouted URLs answer 404. Every call is recorded.
#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, StoredResponse>>,
    fail: Mutex<HashMap<String, FailFn>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A mock answering 200 for every precache URL in the config.
    pub(crate) fn seeded(config: &WorkerConfig) -> Arc<Self> {
        let mock = Self::new();
        for url in &config.precache {
            mock.route(url.as_str(), html(&format!("precached {}", url.path())));
        }
        mock
    }

    pub(crate) fn route(&self, url: &str, response: StoredResponse) {
        self.routes.lock().insert(url.to_string(), response);
    }

    pub(crate) fn fail_with<F>(&self, url: &str, make: F)
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        self.fail.lock().insert(url.to_string(), Box::new(make));
    }

    pub(crate) fn fail_url(&self, url: &str) {
        self.fail_with(url, || Error::NetworkUnreachable("connection refused".into()));
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Network for MockNetwork {
    async fn forward(&self, request: &ResourceRequest) -> Result<StoredResponse, Error> {
        self.calls.lock().push(request.url.to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkUnreachable("offline".into()));
        }
        if let Some(make) = self.fail.lock().get(request.url.as_str()) {
            return Err(make());
        }
        match self.routes.lock().get(request.url.as_str()) {
            Some(response) => Ok(response.clone()),
            None => Ok(StoredResponse::new(404, Vec::new(), b"not found".to_vec())),
        }
    }
}

/// [`ClientRegistry`] that records every call.
#[derive(Default)]
pub(crate) struct RecordingClients {
    pub(crate) windows: Mutex<Vec<WindowClient>>,
    pub(crate) claims: AtomicUsize,
    pub(crate) focused: Mutex<Vec<String>>,
    pub(crate) opened: Mutex<Vec<Url>>,
    pub(crate) fail_claims: AtomicBool,
}

impl RecordingClients {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add_window(&self, id: &str, url: &str) {
        self.windows
            .lock()
            .push(WindowClient { id: id.to_string(), url: Url::parse(url).unwrap() });
    }
}

#[async_trait::async_trait]
impl ClientRegistry for RecordingClients {
    async fn claim(&self) -> Result<usize, Error> {
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(Error::Gateway("claim refused".into()));
        }
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(self.windows.lock().len())
    }

    async fn windows(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.windows.lock().clone())
    }

    async fn focus(&self, id: &str) -> Result<(), Error> {
        self.focused.lock().push(id.to_string());
        Ok(())
    }

    async fn open(&self, url: &Url) -> Result<(), Error> {
        self.opened.lock().push(url.clone());
        Ok(())
    }
}

/// [`NotificationSink`] that records (title, body, icon) triples.
#[derive(Default)]
pub(crate) struct RecordingNotifications {
    pub(crate) shown: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifications {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingNotifications {
    async fn show(&self, title: &str, body: &str, icon: &Url) -> Result<(), Error> {
        self.shown.lock().push((title.to_string(), body.to_string(), icon.to_string()));
        Ok(())
    }
}
