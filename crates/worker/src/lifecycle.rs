//! Cache lifecycle: install, activation, takeover, retirement.
//!
//! One manager instance drives one release through
//! `Installing → Waiting → Active → Redundant`. Install stages the precache
//! manifest atomically; activation garbage-collects every other generation
//! and publishes the new one to the slot the interceptor reads.

use std::sync::Arc;

use larder_client::Network;
use larder_core::Error;
use larder_core::cache::{CacheDb, Generation, RequestKey};
use larder_core::model::ResourceRequest;
use serde::Serialize;

use crate::active::ActiveSlot;
use crate::config::WorkerConfig;
use crate::host::ClientRegistry;

/// Lifecycle states, in order of progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
    Redundant,
}

/// What an activation did.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    /// Tag now serving.
    pub tag: String,
    /// Stale generations removed.
    pub deleted: Vec<String>,
    /// Clients claimed by the new generation.
    pub claimed: usize,
}

/// Result of a takeover signal, by the state it arrived in.
#[derive(Debug)]
pub enum Takeover {
    /// Arrived before install finished; activation will chain onto it.
    Armed,
    /// Activated immediately.
    TookOver(ActivationReport),
    /// Already serving.
    AlreadyActive,
    /// Retired instance; signal dropped.
    Ignored,
}

pub struct CacheLifecycleManager {
    db: CacheDb,
    config: Arc<WorkerConfig>,
    network: Arc<dyn Network>,
    clients: Arc<dyn ClientRegistry>,
    slot: ActiveSlot,
    state: WorkerState,
    takeover_armed: bool,
}

impl CacheLifecycleManager {
    pub fn new(
        db: CacheDb,
        config: Arc<WorkerConfig>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientRegistry>,
        slot: ActiveSlot,
    ) -> Self {
        Self { db, config, network, clients, slot, state: WorkerState::Installing, takeover_armed: false }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Precache the manifest into this release's generation.
    ///
    /// Every manifest fetch must return a success status; the staged entries
    /// then land in one transaction. Any failure leaves the store untouched
    /// and the state `Installing`, so the host may retry. On success the
    /// state is `Waiting`, or `Active` when a takeover signal already armed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InstallFailed`] describing the first fetch or write
    /// that went wrong.
    pub async fn install(&mut self) -> Result<usize, Error> {
        let tag = self.config.tag.clone();

        let mut staged = Vec::with_capacity(self.config.precache.len());
        for url in &self.config.precache {
            let request = ResourceRequest::get(url.clone());
            let response = self
                .network
                .forward(&request)
                .await
                .map_err(|e| Error::InstallFailed(format!("precache fetch {url} failed: {e}")))?;
            if !response.is_success() {
                return Err(Error::InstallFailed(format!(
                    "precache fetch {url} returned status {}",
                    response.status
                )));
            }
            staged.push((RequestKey::from_request(&request), response));
        }

        let written = self
            .db
            .put_many(&tag, staged)
            .await
            .map_err(|e| Error::InstallFailed(format!("precache write failed: {e}")))?;

        self.state = WorkerState::Waiting;
        tracing::info!(%tag, entries = written, "install complete");

        if self.takeover_armed {
            self.activate().await;
        }

        Ok(written)
    }

    /// Become the serving instance.
    ///
    /// Deletes every generation whose tag differs from this release's,
    /// publishes the active handle to the shared slot, then claims open
    /// clients. Collection and claim failures are logged and absorbed;
    /// activation itself always completes.
    pub async fn activate(&mut self) -> ActivationReport {
        let tag = self.config.tag.clone();

        let known = match self.db.list_generations().await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(error = ?e, "could not enumerate generations for collection");
                Vec::new()
            }
        };

        let mut deleted = Vec::new();
        for stale in known.into_iter().filter(|t| *t != tag) {
            match self.db.delete_generation(&stale).await {
                Ok(()) => {
                    tracing::info!(tag = %stale, "deleted stale generation");
                    deleted.push(stale);
                }
                Err(e) => {
                    tracing::warn!(tag = %stale, error = ?e, "failed to delete stale generation");
                }
            }
        }

        match Generation::open(&self.db, &tag).await {
            Ok(generation) => self.slot.set(generation),
            Err(e) => {
                tracing::error!(%tag, error = ?e, "could not open active generation; serving pass-through");
            }
        }

        let claimed = match self.clients.claim().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = ?e, "client claim failed");
                0
            }
        };

        self.state = WorkerState::Active;
        tracing::info!(%tag, claimed, "activated");

        ActivationReport { tag, deleted, claimed }
    }

    /// Handle the takeover signal according to the current state.
    pub async fn skip_waiting(&mut self) -> Takeover {
        match self.state {
            WorkerState::Installing => {
                self.takeover_armed = true;
                tracing::info!("takeover armed; will activate when install completes");
                Takeover::Armed
            }
            WorkerState::Waiting => Takeover::TookOver(self.activate().await),
            WorkerState::Active => Takeover::AlreadyActive,
            WorkerState::Redundant => Takeover::Ignored,
        }
    }

    /// Step aside: clear the active slot and stop touching the store.
    pub fn retire(&mut self) {
        self.slot.clear();
        self.state = WorkerState::Redundant;
        tracing::info!(tag = %self.config.tag, "retired");
    }
}
