//! Route table and precache manifest configuration.
//!
//! The defaults reproduce the application shell's offline setup: fonts and CDN
//! assets, images, navigations, and the precached shell documents.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cache::ExpirationPolicy;

/// Read/write policy for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Serve from cache; fetch and store on miss.
    CacheFirst,
    /// Serve from cache and refresh in the background; block on the network on miss.
    StaleWhileRevalidate,
    /// Fetch first; fall back to the cached copy when the network fails.
    NetworkFirst,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache_first",
            Strategy::StaleWhileRevalidate => "stale_while_revalidate",
            Strategy::NetworkFirst => "network_first",
        }
    }
}

/// One entry of the route table.
///
/// Exactly one of `pattern` and `navigate` selects the requests the route
/// handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteConfig {
    /// Regular expression matched against the full request URL.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Match navigation requests instead of a URL pattern.
    #[serde(default)]
    pub navigate: bool,

    pub strategy: Strategy,

    /// Cache role; the stored cache name is `<prefix>-<cache>-<suffix>`.
    pub cache: String,

    #[serde(default)]
    pub expiration: ExpirationPolicy,

    /// Response statuses eligible for storage. `0` admits opaque responses.
    #[serde(default = "default_cacheable_statuses")]
    pub cacheable_statuses: Vec<u16>,
}

fn default_cacheable_statuses() -> Vec<u16> {
    vec![200]
}

impl RouteConfig {
    pub fn pattern(pattern: &str, strategy: Strategy, cache: &str) -> Self {
        Self {
            pattern: Some(pattern.to_string()),
            navigate: false,
            strategy,
            cache: cache.to_string(),
            expiration: ExpirationPolicy::default(),
            cacheable_statuses: default_cacheable_statuses(),
        }
    }

    pub fn navigation(strategy: Strategy, cache: &str) -> Self {
        Self {
            pattern: None,
            navigate: true,
            strategy,
            cache: cache.to_string(),
            expiration: ExpirationPolicy::default(),
            cacheable_statuses: default_cacheable_statuses(),
        }
    }

    pub fn with_expiration(mut self, max_entries: Option<usize>, max_age_seconds: Option<u64>) -> Self {
        self.expiration = ExpirationPolicy::new(max_entries, max_age_seconds);
        self
    }

    pub fn with_statuses(mut self, statuses: &[u16]) -> Self {
        self.cacheable_statuses = statuses.to_vec();
        self
    }
}

/// A precache manifest entry as supplied by the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheEntry {
    /// Absolute URL or a path relative to the scope.
    pub url: String,

    /// Opaque version marker; a new value forces a re-fetch.
    #[serde(default)]
    pub revision: Option<String>,
}

impl PrecacheEntry {
    pub fn new(url: impl Into<String>, revision: Option<&str>) -> Self {
        Self { url: url.into(), revision: revision.map(str::to_string) }
    }
}

const DAY_SECONDS: u64 = 24 * 60 * 60;

pub(crate) fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::pattern(
            r"^https://fonts\.googleapis\.com",
            Strategy::StaleWhileRevalidate,
            "google-fonts-stylesheets",
        ),
        RouteConfig::pattern(r"^https://fonts\.gstatic\.com", Strategy::CacheFirst, "google-fonts-webfonts")
            .with_statuses(&[0, 200])
            .with_expiration(Some(30), Some(365 * DAY_SECONDS)),
        RouteConfig::pattern(r"^https://cdnjs\.cloudflare\.com", Strategy::StaleWhileRevalidate, "cdn-scripts"),
        RouteConfig::pattern(r"\.(?:png|gif|jpg|jpeg|webp|svg)$", Strategy::CacheFirst, "images")
            .with_expiration(Some(60), Some(30 * DAY_SECONDS)),
        RouteConfig::navigation(Strategy::NetworkFirst, "pages")
            .with_statuses(&[0, 200])
            .with_expiration(Some(20), None),
    ]
}

pub(crate) fn default_precache(revision: &str) -> Vec<PrecacheEntry> {
    [
        "/",
        "index.html",
        "offline.html",
        "manifest.json",
        "android-chrome-192x192.png",
        "android-chrome-512x512.png",
    ]
    .into_iter()
    .map(|url| PrecacheEntry::new(url, Some(revision)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes_order() {
        let routes = default_routes();
        let caches: Vec<&str> = routes.iter().map(|r| r.cache.as_str()).collect();
        assert_eq!(
            caches,
            vec!["google-fonts-stylesheets", "google-fonts-webfonts", "cdn-scripts", "images", "pages"]
        );
        assert!(routes.last().unwrap().navigate);
    }

    #[test]
    fn test_default_precache_uses_revision() {
        let manifest = default_precache("v1.2");
        assert_eq!(manifest.len(), 6);
        assert!(manifest.iter().all(|e| e.revision.as_deref() == Some("v1.2")));
        assert_eq!(manifest[0].url, "/");
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&Strategy::StaleWhileRevalidate).unwrap();
        assert_eq!(json, "\"stale_while_revalidate\"");
        let parsed: Strategy = serde_json::from_str("\"network_first\"").unwrap();
        assert_eq!(parsed, Strategy::NetworkFirst);
    }

    #[test]
    fn test_route_config_defaults_from_json() {
        let route: RouteConfig =
            serde_json::from_str(r#"{"pattern": "\\.css$", "strategy": "cache_first", "cache": "styles"}"#).unwrap();
        assert!(!route.navigate);
        assert_eq!(route.cacheable_statuses, vec![200]);
        assert!(route.expiration.is_unbounded());
    }
}
