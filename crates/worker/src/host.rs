//! Ports to the hosting runtime.
//!
//! The worker never owns browsing contexts or a notification surface; the
//! host implements these traits and the worker calls through them. All
//! failures on these ports are absorbed and logged by the caller.

use larder_core::Error;
use url::Url;

/// An open browsing context reported by the host.
#[derive(Debug, Clone)]
pub struct WindowClient {
    pub id: String,
    pub url: Url,
}

/// The host's view of connected clients.
#[async_trait::async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Make every open client use the newly activated generation without a
    /// reload. Returns how many clients are now controlled.
    async fn claim(&self) -> Result<usize, Error>;

    /// Enumerate open window clients.
    async fn windows(&self) -> Result<Vec<WindowClient>, Error>;

    /// Bring an open window to the foreground.
    async fn focus(&self, id: &str) -> Result<(), Error>;

    /// Open a new window at the given URL.
    async fn open(&self, url: &Url) -> Result<(), Error>;
}

/// Notification display surface.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, title: &str, body: &str, icon: &Url) -> Result<(), Error>;
}
