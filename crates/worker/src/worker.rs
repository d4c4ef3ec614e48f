//! The worker itself: an explicit event dispatcher over the lifecycle
//! manager, the fetch interceptor, and the host-facing ports.
//!
//! The host feeds events in and observes typed outcomes; nothing here
//! depends on a live browser runtime, which is what makes the whole
//! machine testable.

use std::sync::Arc;

use larder_core::Error;
use larder_core::cache::CacheDb;
use larder_core::model::ResourceRequest;
use serde::Deserialize;

use larder_client::Network;

use crate::active::ActiveSlot;
use crate::config::WorkerConfig;
use crate::host::{ClientRegistry, NotificationSink};
use crate::interceptor::{FetchInterceptor, FetchOutcome};
use crate::lifecycle::{ActivationReport, CacheLifecycleManager, Takeover, WorkerState};

/// Background sync tag the worker acknowledges.
pub const SYNC_TAG: &str = "sync-data";

const DEFAULT_PUSH_BODY: &str = "New notification";

/// Events delivered by the hosting runtime.
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Retire,
    /// Foreground control message, uninterpreted JSON.
    Message(serde_json::Value),
    /// Push delivery with optional payload text.
    Push(Option<String>),
    NotificationClick,
    /// Background sync firing for a named tag.
    Sync(String),
}

/// Control messages understood on the foreground channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

/// What handling an event did.
#[derive(Debug)]
pub enum EventOutcome {
    Installed { tag: String, precached: usize, took_over: bool },
    Activated(ActivationReport),
    Retired,
    /// Takeover signal arrived before install finished.
    TakeoverArmed,
    /// Takeover signal activated immediately.
    TookOver(ActivationReport),
    AlreadyActive,
    NotificationShown { title: String, body: String },
    WindowFocused(String),
    WindowOpened,
    SyncAcknowledged(String),
    /// Event did not apply in the current state or was not understood.
    Ignored,
}

pub struct Worker {
    config: Arc<WorkerConfig>,
    lifecycle: tokio::sync::Mutex<CacheLifecycleManager>,
    interceptor: FetchInterceptor,
    clients: Arc<dyn ClientRegistry>,
    notifications: Arc<dyn NotificationSink>,
    slot: ActiveSlot,
}

impl Worker {
    pub fn new(
        db: CacheDb,
        config: WorkerConfig,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientRegistry>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let config = Arc::new(config);
        let slot = ActiveSlot::new();
        let lifecycle = CacheLifecycleManager::new(
            db,
            config.clone(),
            network.clone(),
            clients.clone(),
            slot.clone(),
        );
        let interceptor = FetchInterceptor::new(config.clone(), network, slot.clone());
        Self {
            config,
            lifecycle: tokio::sync::Mutex::new(lifecycle),
            interceptor,
            clients,
            notifications,
            slot,
        }
    }

    /// Dispatch one host event.
    ///
    /// Lifecycle events serialize behind the lifecycle lock; boundary
    /// events (push, click, sync) do not contend with it.
    ///
    /// # Errors
    ///
    /// Only a failed install surfaces as an error; every other failure is
    /// absorbed and logged.
    pub async fn handle_event(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => {
                let mut lifecycle = self.lifecycle.lock().await;
                if lifecycle.state() != WorkerState::Installing {
                    tracing::warn!(state = ?lifecycle.state(), "install dispatched out of order");
                    return Ok(EventOutcome::Ignored);
                }
                let precached = lifecycle.install().await?;
                let took_over = lifecycle.state() == WorkerState::Active;
                Ok(EventOutcome::Installed { tag: self.config.tag.clone(), precached, took_over })
            }
            WorkerEvent::Activate => {
                let mut lifecycle = self.lifecycle.lock().await;
                if lifecycle.state() != WorkerState::Waiting {
                    tracing::warn!(state = ?lifecycle.state(), "activate dispatched out of order");
                    return Ok(EventOutcome::Ignored);
                }
                Ok(EventOutcome::Activated(lifecycle.activate().await))
            }
            WorkerEvent::Retire => {
                self.lifecycle.lock().await.retire();
                Ok(EventOutcome::Retired)
            }
            WorkerEvent::Message(value) => match serde_json::from_value::<WorkerMessage>(value) {
                Ok(WorkerMessage::SkipWaiting) => {
                    let takeover = self.lifecycle.lock().await.skip_waiting().await;
                    Ok(match takeover {
                        Takeover::Armed => EventOutcome::TakeoverArmed,
                        Takeover::TookOver(report) => EventOutcome::TookOver(report),
                        Takeover::AlreadyActive => EventOutcome::AlreadyActive,
                        Takeover::Ignored => EventOutcome::Ignored,
                    })
                }
                Err(_) => {
                    tracing::debug!("unrecognized control message");
                    Ok(EventOutcome::Ignored)
                }
            },
            WorkerEvent::Push(payload) => Ok(self.push(payload).await),
            WorkerEvent::NotificationClick => Ok(self.notification_click().await),
            WorkerEvent::Sync(tag) => {
                if tag == SYNC_TAG {
                    tracing::info!(%tag, "background sync");
                    Ok(EventOutcome::SyncAcknowledged(tag))
                } else {
                    tracing::debug!(%tag, "unknown sync tag");
                    Ok(EventOutcome::Ignored)
                }
            }
        }
    }

    /// Serve one intercepted request. Never takes the lifecycle lock.
    ///
    /// # Errors
    ///
    /// Propagates only what the interceptor propagates: network errors on
    /// bypassed requests and malformed-request rejections.
    pub async fn handle_fetch(&self, request: ResourceRequest) -> Result<FetchOutcome, Error> {
        self.interceptor.handle(request).await
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.lock().await.state()
    }

    /// Tag of the generation currently serving, if any.
    pub fn active_tag(&self) -> Option<String> {
        self.slot.tag()
    }

    async fn push(&self, payload: Option<String>) -> EventOutcome {
        let body = payload
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| DEFAULT_PUSH_BODY.to_string());
        if let Err(e) = self
            .notifications
            .show(&self.config.app_title, &body, &self.config.fallback_icon)
            .await
        {
            tracing::warn!(error = ?e, "notification display failed");
        }
        EventOutcome::NotificationShown { title: self.config.app_title.clone(), body }
    }

    /// Focus an open window at the application root, or open a new one.
    async fn notification_click(&self) -> EventOutcome {
        let windows = match self.clients.windows().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = ?e, "could not enumerate windows");
                Vec::new()
            }
        };

        if let Some(window) = windows.iter().find(|w| w.url.path() == "/") {
            match self.clients.focus(&window.id).await {
                Ok(()) => return EventOutcome::WindowFocused(window.id.clone()),
                Err(e) => {
                    tracing::warn!(id = %window.id, error = ?e, "focus failed; opening new window");
                }
            }
        }

        match self.clients.open(&self.config.root).await {
            Ok(()) => EventOutcome::WindowOpened,
            Err(e) => {
                tracing::warn!(error = ?e, "could not open window");
                EventOutcome::Ignored
            }
        }
    }
}
