//! Immutable per-release worker configuration.
//!
//! Built once from [`AppConfig`] at startup and shared by every component;
//! nothing here changes while the worker runs. A new release means a new
//! config with a new generation tag.

use larder_core::config::{AppConfig, ConfigError};
use url::Url;

/// Everything the worker needs to know about the release it serves.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Generation tag for this release.
    pub tag: String,

    /// Application root URL, the focus-or-open target for notification
    /// clicks.
    pub root: Url,

    /// Fully resolved precache manifest.
    pub precache: Vec<Url>,

    /// Document served to offline HTML navigations.
    pub fallback_document: Url,

    /// Icon served to offline image requests, and notification icon.
    pub fallback_icon: Url,

    /// Notification title.
    pub app_title: String,
}

impl WorkerConfig {
    /// Resolve the application configuration against the upstream origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the upstream URL is unusable or
    /// a configured path cannot be joined onto it.
    pub fn from_app(config: &AppConfig) -> Result<Self, ConfigError> {
        let upstream = config.upstream_url()?;

        let precache = config
            .precache
            .iter()
            .map(|path| resolve(&upstream, "precache", path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tag: config.cache_tag(),
            root: resolve(&upstream, "upstream", "/")?,
            precache,
            fallback_document: resolve(&upstream, "fallback_document", &config.fallback_document)?,
            fallback_icon: resolve(&upstream, "fallback_icon", &config.fallback_icon)?,
            app_title: config.app_title.clone(),
        })
    }
}

fn resolve(upstream: &Url, field: &str, path: &str) -> Result<Url, ConfigError> {
    upstream.join(path).map_err(|e| ConfigError::Invalid {
        field: field.into(),
        reason: format!("{path:?}: {e}"),
    })
}
