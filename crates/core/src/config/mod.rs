//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LARDER_*)
//! 2. TOML config file (if LARDER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LARDER_*)
/// 2. TOML config file (if LARDER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via LARDER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the gateway listens on.
    ///
    /// Set via LARDER_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the upstream application server.
    ///
    /// Set via LARDER_UPSTREAM environment variable. Manifest paths and
    /// proxied requests are resolved against this.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Application name, the stable half of the generation tag.
    ///
    /// Set via LARDER_APP_NAME environment variable.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application release version. Bumping this stages a fresh generation.
    ///
    /// Set via LARDER_APP_VERSION environment variable.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Paths precached at install, relative to the upstream origin.
    ///
    /// Set via LARDER_PRECACHE environment variable (comma-separated).
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Path served to navigations when offline with no cached copy.
    ///
    /// Set via LARDER_FALLBACK_DOCUMENT environment variable.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// Path served to image requests when offline with no cached copy.
    ///
    /// Set via LARDER_FALLBACK_ICON environment variable.
    #[serde(default = "default_fallback_icon")]
    pub fallback_icon: String,

    /// Title used for pushed notifications.
    ///
    /// Set via LARDER_APP_TITLE environment variable.
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// User-Agent string for upstream requests.
    ///
    /// Set via LARDER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via LARDER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per upstream response.
    ///
    /// Set via LARDER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./larder-cache.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_upstream() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_app_name() -> String {
    "larder".into()
}

fn default_app_version() -> String {
    "1".into()
}

fn default_precache() -> Vec<String> {
    ["/", "/index.html", "/manifest.json", "/icon-192.png", "/icon-512.png"]
        .map(String::from)
        .to_vec()
}

fn default_fallback_document() -> String {
    "/index.html".into()
}

fn default_fallback_icon() -> String {
    "/icon-192.png".into()
}

fn default_app_title() -> String {
    "Larder".into()
}

fn default_user_agent() -> String {
    "larder/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            upstream: default_upstream(),
            app_name: default_app_name(),
            app_version: default_app_version(),
            precache: default_precache(),
            fallback_document: default_fallback_document(),
            fallback_icon: default_fallback_icon(),
            app_title: default_app_title(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Generation tag for the configured release, `{app_name}-v{app_version}`.
    pub fn cache_tag(&self) -> String {
        format!("{}-v{}", self.app_name, self.app_version)
    }

    /// Upstream base URL, parsed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `upstream` is not an absolute
    /// http(s) URL.
    pub fn upstream_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.upstream).map_err(|e| ConfigError::Invalid {
            field: "upstream".into(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "upstream".into(),
                reason: "scheme must be http or https".into(),
            });
        }
        Ok(url)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LARDER_`
    /// 2. TOML file from `LARDER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LARDER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LARDER_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
