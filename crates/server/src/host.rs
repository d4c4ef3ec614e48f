//! Log-only host adapters.
//!
//! The gateway has no real browser clients or notification surface, so the
//! worker's calls onto its host land in the log where an operator can see
//! them. A richer host would replace these with adapters that talk to
//! actual clients.

use larder_core::Error;
use larder_worker::{ClientRegistry, NotificationSink, WindowClient};
use url::Url;

pub struct LoggingClients;

#[async_trait::async_trait]
impl ClientRegistry for LoggingClients {
    async fn claim(&self) -> Result<usize, Error> {
        tracing::info!("claiming clients");
        Ok(0)
    }

    async fn windows(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(Vec::new())
    }

    async fn focus(&self, id: &str) -> Result<(), Error> {
        tracing::info!(%id, "focus window");
        Ok(())
    }

    async fn open(&self, url: &Url) -> Result<(), Error> {
        tracing::info!(%url, "open window");
        Ok(())
    }
}

pub struct LoggingNotifications;

#[async_trait::async_trait]
impl NotificationSink for LoggingNotifications {
    async fn show(&self, title: &str, body: &str, icon: &Url) -> Result<(), Error> {
        tracing::info!(%title, %body, %icon, "notification");
        Ok(())
    }
}
