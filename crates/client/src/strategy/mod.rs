//! Caching strategies.
//!
//! A strategy decides how a routed GET request is answered from the cache and
//! the network, and how the other source is reconciled:
//!
//! - [`Strategy::CacheFirst`]: cached entry if fresh, otherwise fetch and store.
//! - [`Strategy::StaleWhileRevalidate`]: cached entry now, refreshed in the background.
//! - [`Strategy::NetworkFirst`]: network, falling back to the cached copy.
//!
//! Cache reads and writes are best-effort: a failing store degrades to a
//! miss or a skipped write, never to a failed request. A strategy only
//! returns an error when neither cache nor network produced a response.

mod cache_first;
mod network_first;
mod stale_while_revalidate;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shellcache_core::{CacheEntry, CacheStore, Error, HttpResponse};
use tokio::task::JoinHandle;

pub use shellcache_core::config::Strategy;

use crate::fetch::{Network, Request};
use crate::routing::Route;

/// Where the response handed to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// The offline fallback document.
    Offline,
    /// Not intercepted: non-GET, unrouted, or no active worker.
    Passthrough,
    /// Nothing could answer; the caller gets a network-error response.
    Unavailable,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Offline => "offline",
            ResponseSource::Passthrough => "passthrough",
            ResponseSource::Unavailable => "unavailable",
        }
    }
}

/// The answer to an intercepted request.
#[derive(Debug)]
pub struct Outcome {
    pub response: HttpResponse,
    pub source: ResponseSource,
    /// Cache the response was read from or written to.
    pub cache_name: Option<String>,
    revalidation: Option<JoinHandle<()>>,
}

impl Outcome {
    pub fn new(response: HttpResponse, source: ResponseSource, cache_name: Option<String>) -> Self {
        Self { response, source, cache_name, revalidation: None }
    }

    pub fn from_cache(response: HttpResponse, cache_name: &str) -> Self {
        Self::new(response, ResponseSource::Cache, Some(cache_name.to_string()))
    }

    pub fn from_network(response: HttpResponse, cache_name: Option<&str>) -> Self {
        Self::new(response, ResponseSource::Network, cache_name.map(str::to_string))
    }

    pub fn passthrough(response: HttpResponse) -> Self {
        Self::new(response, ResponseSource::Passthrough, None)
    }

    pub fn unavailable() -> Self {
        Self::new(HttpResponse::network_error(), ResponseSource::Unavailable, None)
    }

    pub(crate) fn with_revalidation(mut self, handle: JoinHandle<()>) -> Self {
        self.revalidation = Some(handle);
        self
    }

    /// A background refresh started by this request is still attached.
    pub fn is_revalidating(&self) -> bool {
        self.revalidation.is_some()
    }

    /// Wait for the background refresh, if any, to finish updating the cache.
    pub async fn settled(&mut self) {
        if let Some(handle) = self.revalidation.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "background revalidation task failed");
        }
    }
}

/// Answer a routed GET request with the route's strategy.
///
/// # Errors
///
/// Returns `Error::RuntimeFetchFailed` (or `FetchTooLarge`) when the network
/// failed and the cache had nothing usable.
pub async fn handle(
    route: &Route, request: &Request, store: &Arc<dyn CacheStore>, network: &Arc<dyn Network>,
) -> Result<Outcome, Error> {
    tracing::debug!(
        url = %request.url,
        strategy = route.strategy.as_str(),
        cache = %route.cache_name,
        "routing request"
    );

    match route.strategy {
        Strategy::CacheFirst => cache_first::handle(route, request, store.as_ref(), network.as_ref()).await,
        Strategy::NetworkFirst => network_first::handle(route, request, store.as_ref(), network.as_ref()).await,
        Strategy::StaleWhileRevalidate => stale_while_revalidate::handle(route, request, store, network).await,
    }
}

/// Fresh cached response for `key`, evicting it lazily when it has aged out.
pub(crate) async fn read_cached(store: &dyn CacheStore, route: &Route, key: &str) -> Option<HttpResponse> {
    match store.get(&route.cache_name, key).await {
        Ok(Some(entry)) if route.expiration.is_fresh(&entry, Utc::now()) => Some(entry.response),
        Ok(Some(_)) => {
            tracing::debug!(cache = %route.cache_name, key, "cached entry expired");
            if let Err(e) = store.remove(&route.cache_name, key).await {
                tracing::warn!(cache = %route.cache_name, error = %e, "failed to evict expired entry");
            }
            None
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(cache = %route.cache_name, error = %e, "cache read failed, treating as miss");
            None
        }
    }
}

/// Store a network response if the route admits its status, then apply the
/// route's expiration. Failures are logged and swallowed.
pub(crate) async fn write_cached(store: &dyn CacheStore, route: &Route, key: &str, response: &HttpResponse) {
    if !route.is_cacheable(response) {
        tracing::debug!(cache = %route.cache_name, key, status = response.status, "response not cacheable");
        return;
    }

    if let Err(e) = commit(store, route, key, response).await {
        tracing::warn!(error = %e, "cache write skipped");
    }
}

async fn commit(store: &dyn CacheStore, route: &Route, key: &str, response: &HttpResponse) -> Result<(), Error> {
    store
        .put(&route.cache_name, CacheEntry::new(key, response.clone()))
        .await
        .map_err(|e| Error::CacheWriteFailed(format!("{} {key}: {e}", route.cache_name)))?;

    route
        .expiration
        .enforce(store, &route.cache_name, Utc::now())
        .await
        .map_err(|e| Error::CacheWriteFailed(format!("{} expiration: {e}", route.cache_name)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteMatcher;
    use crate::testing::StubNetwork;
    use chrono::Duration;
    use regex::Regex;
    use shellcache_core::{ExpirationPolicy, MemoryStore};
    use url::Url;

    fn route(expiration: ExpirationPolicy) -> Route {
        Route::new(RouteMatcher::Pattern(Regex::new(r"\.png$").unwrap()), Strategy::CacheFirst, "app-images-v1")
            .with_expiration(expiration)
    }

    #[tokio::test]
    async fn test_read_cached_evicts_expired_entry() {
        let store = MemoryStore::new();
        let mut entry = CacheEntry::new("https://app.test/a.png", HttpResponse::new(200, "png"));
        entry.stored_at = Utc::now() - Duration::seconds(120);
        store.put("app-images-v1", entry).await.unwrap();

        let route = route(ExpirationPolicy::new(None, Some(60)));
        assert!(read_cached(&store, &route, "https://app.test/a.png").await.is_none());
        assert!(store.keys("app-images-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_cached_skips_uncacheable_status() {
        let store = MemoryStore::new();
        let route = route(ExpirationPolicy::default());

        write_cached(&store, &route, "https://app.test/missing.png", &HttpResponse::new(404, "")).await;

        assert!(store.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_cached_enforces_max_entries() {
        let store = MemoryStore::new();
        let route = route(ExpirationPolicy::new(Some(2), None));

        for name in ["a", "b", "c"] {
            let key = format!("https://app.test/{name}.png");
            write_cached(&store, &route, &key, &HttpResponse::new(200, name.to_string())).await;
        }

        assert_eq!(
            store.keys("app-images-v1").await.unwrap(),
            vec!["https://app.test/b.png", "https://app.test/c.png"]
        );
    }

    #[tokio::test]
    async fn test_settled_without_revalidation_is_noop() {
        let mut outcome = Outcome::from_network(HttpResponse::new(200, "x"), None);
        assert!(!outcome.is_revalidating());
        outcome.settled().await;
        assert_eq!(outcome.source, ResponseSource::Network);
    }

    #[tokio::test]
    async fn test_handle_dispatches_by_strategy() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let stub = Arc::new(StubNetwork::new().with_body("https://app.test/a.png", "png"));
        let network: Arc<dyn Network> = stub.clone();
        let route = route(ExpirationPolicy::default());
        let request = Request::get(Url::parse("https://app.test/a.png").unwrap());

        let first = handle(&route, &request, &store, &network).await.unwrap();
        let second = handle(&route, &request, &store, &network).await.unwrap();

        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(stub.call_count("https://app.test/a.png"), 1);
    }
}
