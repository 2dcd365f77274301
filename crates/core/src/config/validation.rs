//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::GenerationId;
use crate::config::AppConfig;
use crate::identity::parse_scope;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version` is empty or contains whitespace
    /// - `scope` is not an http(s) URL
    /// - a `manifest` entry is blank
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set OFFCACHE_CACHE_VERSION environment variable".into(),
            });
        }
        GenerationId::new(self.cache_version.clone())
            .map_err(|e| ConfigError::Invalid { field: "cache_version".into(), reason: e.to_string() })?;

        parse_scope(&self.scope).map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })?;

        if let Some(index) = self.manifest.iter().position(|l| l.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "manifest".into(),
                reason: format!("entry {index} is empty"),
            });
        }
        if self.manifest.is_empty() {
            tracing::warn!("manifest is empty; install will capture nothing");
        }

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

        let policy = self.policy();
        if policy.network_fill && policy.ignore_search {
            tracing::warn!(
                "network_fill with ignore_search stores the first fetched variant \
                 and serves it for every query string"
            );
        }

        Ok(())
    }
}
