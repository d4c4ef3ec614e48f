//! The offline-availability worker.
//!
//! This crate glues the versioned cache to a hosting runtime: the
//! [`CacheLifecycleManager`] stages and activates cache generations, the
//! [`FetchInterceptor`] answers intercepted requests cache-first with an
//! offline fallback chain, and [`Worker`] dispatches host events to both.
//! The host supplies the upstream transport and the client/notification
//! adapters; everything else runs self-contained.

pub mod active;
pub mod config;
pub mod host;
pub mod interceptor;
pub mod lifecycle;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use active::ActiveSlot;
pub use config::WorkerConfig;
pub use host::{ClientRegistry, NotificationSink, WindowClient};
pub use interceptor::{FetchInterceptor, FetchOutcome, ServedFrom};
pub use lifecycle::{ActivationReport, CacheLifecycleManager, Takeover, WorkerState};
pub use worker::{EventOutcome, SYNC_TAG, Worker, WorkerEvent, WorkerMessage};
