//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent`, `app_name`, or `app_version` is empty
    /// - `upstream` is not an absolute http(s) URL
    /// - any precache or fallback path does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.app_name.is_empty() {
            return Err(ConfigError::Invalid { field: "app_name".into(), reason: "must not be empty".into() });
        }
        if self.app_version.is_empty() {
            return Err(ConfigError::Invalid { field: "app_version".into(), reason: "must not be empty".into() });
        }

        self.upstream_url()?;

        for path in &self.precache {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: "precache".into(),
                    reason: format!("path {path:?} must start with /"),
                });
            }
        }
        for (field, path) in
            [("fallback_document", &self.fallback_document), ("fallback_icon", &self.fallback_icon)]
        {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: format!("path {path:?} must start with /"),
                });
            }
        }

        if self.precache.is_empty() {
            tracing::warn!(
                tag = %self.cache_tag(),
                "precache list is empty; install will stage a generation with no entries"
            );
        } else if !self.precache.contains(&self.fallback_document) {
            tracing::warn!(
                fallback_document = %self.fallback_document,
                "fallback_document is not in the precache list; \
                 offline navigations may get the plain unavailable response"
            );
        }

        Ok(())
    }
}
