//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The cache version, scope and manifest are deployment inputs: they are read
//! once at startup and never changed by the worker.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::policy::{Policy, PolicyPreset};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCACHE_*)
/// 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Tag of the current cache generation.
    ///
    /// Set via OFFCACHE_CACHE_VERSION environment variable. Bumping it on
    /// release makes the next install build a fresh generation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Base URL that manifest locators and intercepted requests resolve against.
    ///
    /// Set via OFFCACHE_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Locators that must be captured before install succeeds.
    ///
    /// Set via OFFCACHE_MANIFEST environment variable (`[a, b, ...]`).
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Interception policy preset (`v1`..`v4`).
    ///
    /// Set via OFFCACHE_POLICY environment variable.
    #[serde(default)]
    pub policy: PolicyPreset,

    /// Override the preset's query-insensitive matching.
    #[serde(default)]
    pub ignore_search: Option<bool>,

    /// Override the preset's network fill on miss.
    #[serde(default)]
    pub network_fill: Option<bool>,

    /// Override the preset's stale generation purge on activate.
    #[serde(default)]
    pub purge_stale: Option<bool>,

    /// User-Agent string for network requests.
    ///
    /// Set via OFFCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to capture per response.
    ///
    /// Set via OFFCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OFFCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_manifest() -> Vec<String> {
    ["./", "./index.html", "./manifest.webmanifest", "./styles.css", "./icon.png", "./main.js"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            scope: default_scope(),
            manifest: default_manifest(),
            policy: PolicyPreset::default(),
            ignore_search: None,
            network_fill: None,
            purge_stale: None,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The effective policy: the preset with any overrides applied.
    pub fn policy(&self) -> Policy {
        let mut policy = self.policy.policy();
        if let Some(ignore_search) = self.ignore_search {
            policy.ignore_search = ignore_search;
        }
        if let Some(network_fill) = self.network_fill {
            policy.network_fill = network_fill;
        }
        if let Some(purge_stale) = self.purge_stale {
            policy.purge_stale = purge_stale;
        }
        policy
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
