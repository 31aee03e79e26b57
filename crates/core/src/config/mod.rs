//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheNames;

mod routes;
mod validation;

pub use routes::{PrecacheEntry, RouteConfig, Strategy};
pub use validation::ConfigError;

const DEFAULT_PREFIX: &str = "bed-counter";
const DEFAULT_SUFFIX: &str = "v1.2";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Base URL the worker controls; relative manifest URLs resolve against it.
    ///
    /// Set via SHELLCACHE_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Cache name prefix shared by every version of the app.
    ///
    /// Set via SHELLCACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_prefix")]
    pub cache_prefix: String,

    /// Version suffix; bumping it orphans the previous version's caches.
    ///
    /// Set via SHELLCACHE_CACHE_SUFFIX environment variable.
    #[serde(default = "default_suffix")]
    pub cache_suffix: String,

    /// Activate as soon as install completes instead of waiting.
    ///
    /// Set via SHELLCACHE_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Run the install step when the server starts.
    ///
    /// Set via SHELLCACHE_INSTALL_ON_START environment variable.
    #[serde(default = "default_true")]
    pub install_on_start: bool,

    /// Document served when a navigation fails; must be precached.
    ///
    /// Set via SHELLCACHE_OFFLINE_DOCUMENT environment variable.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Install-time manifest. When unset, the shell documents are precached
    /// with `cache_suffix` as their revision; see [`AppConfig::precache`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precache: Option<Vec<PrecacheEntry>>,

    /// Runtime route table, evaluated in order.
    #[serde(default = "routes::default_routes")]
    pub routes: Vec<RouteConfig>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.into()
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.into()
}

fn default_offline_document() -> String {
    "offline.html".into()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            scope: default_scope(),
            cache_prefix: default_prefix(),
            cache_suffix: default_suffix(),
            skip_waiting: true,
            install_on_start: true,
            offline_document: default_offline_document(),
            precache: None,
            routes: routes::default_routes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Effective install-time manifest.
    ///
    /// The built-in manifest follows the configured version, so bumping
    /// `cache_suffix` changes every precache key and forces a re-fetch.
    pub fn precache(&self) -> Vec<PrecacheEntry> {
        match &self.precache {
            Some(entries) => entries.clone(),
            None => routes::default_precache(&self.cache_suffix),
        }
    }

    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.cache_prefix, &self.cache_suffix)
    }

    /// Parsed scope URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `scope` is not an absolute URL.
    pub fn scope_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.scope).map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(&figment)
    }

    /// Extract and validate a configuration from an assembled figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
