//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use regex::Regex;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent`, `cache_prefix`, `cache_suffix` or `offline_document` is empty
    /// - `scope` is not an absolute http(s) URL
    /// - a route has no matcher, two matchers, an empty cache role or a bad regex
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_suffix.is_empty() {
            return Err(invalid("cache_suffix", "must not be empty"));
        }
        if self.offline_document.is_empty() {
            return Err(invalid("offline_document", "must not be empty"));
        }

        let scope = self.scope_url()?;
        if !matches!(scope.scheme(), "http" | "https") {
            return Err(invalid("scope", format!("unsupported scheme: {}", scope.scheme())));
        }

        for (i, route) in self.routes.iter().enumerate() {
            let field = format!("routes[{i}]");
            match (&route.pattern, route.navigate) {
                (Some(_), true) => return Err(invalid(field, "pattern and navigate are mutually exclusive")),
                (None, false) => return Err(invalid(field, "needs a pattern or navigate = true")),
                (Some(pattern), false) => {
                    Regex::new(pattern).map_err(|e| invalid(format!("{field}.pattern"), e.to_string()))?;
                }
                (None, true) => {}
            }
            if route.cache.is_empty() {
                return Err(invalid(format!("{field}.cache"), "must not be empty"));
            }
        }

        if !self
            .precache()
            .iter()
            .any(|entry| entry.url.trim_start_matches('/') == self.offline_document.trim_start_matches('/'))
        {
            tracing::warn!(
                offline_document = %self.offline_document,
                "offline document is not in the precache manifest; failed navigations will have no fallback"
            );
        }

        Ok(())
    }
}
