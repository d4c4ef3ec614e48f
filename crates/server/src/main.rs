//! larder gateway entry point.
//!
//! Boots the reverse proxy that fronts the upstream application server and
//! plays the host runtime for the offline worker: install and activation run
//! at startup, then every incoming request becomes a fetch event. Logging
//! goes to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use larder_client::{GatewayConfig, HttpGateway};
use larder_core::cache::CacheDb;
use larder_core::config::AppConfig;
use larder_worker::{Worker, WorkerConfig, WorkerEvent};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod host;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let worker_config = WorkerConfig::from_app(&config).context("resolving worker configuration")?;
    let upstream = config.upstream_url().context("resolving upstream")?;

    tracing::info!(tag = %worker_config.tag, upstream = %config.upstream, "starting larder gateway");

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;

    let gateway = HttpGateway::new(GatewayConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })
    .context("building upstream gateway")?;

    let worker = Arc::new(Worker::new(
        db,
        worker_config,
        Arc::new(gateway),
        Arc::new(host::LoggingClients),
        Arc::new(host::LoggingNotifications),
    ));

    match worker.handle_event(WorkerEvent::Install).await {
        Ok(installed) => {
            tracing::info!(outcome = ?installed, "installed");
            let activated = worker.handle_event(WorkerEvent::Activate).await?;
            tracing::info!(outcome = ?activated, "activated");
        }
        Err(e) => {
            // Keep serving; every fetch degrades to plain forwarding until
            // a restart retries the install.
            tracing::error!(error = %e, "install failed; serving pass-through");
        }
    }

    let router = routes::router(routes::AppState { worker, upstream });

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, router).await?;

    Ok(())
}
