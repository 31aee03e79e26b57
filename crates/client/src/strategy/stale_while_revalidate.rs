use std::sync::Arc;

use shellcache_core::{CacheStore, Error};

use super::{Outcome, read_cached, write_cached};
use crate::fetch::{Network, Request};
use crate::routing::Route;

/// Answer from the cache immediately and refresh the entry in the background.
///
/// On a miss the caller waits for the network like any other fetch. The
/// background refresh outlives the returned [`Outcome`] unless awaited with
/// [`Outcome::settled`].
pub(super) async fn handle(
    route: &Route, request: &Request, store: &Arc<dyn CacheStore>, network: &Arc<dyn Network>,
) -> Result<Outcome, Error> {
    let key = request.cache_key();

    let Some(cached) = read_cached(store.as_ref(), route, key).await else {
        let response = network.fetch(request).await?;
        write_cached(store.as_ref(), route, key, &response).await;
        return Ok(Outcome::from_network(response, Some(&route.cache_name)));
    };

    let store = Arc::clone(store);
    let network = Arc::clone(network);
    let route_bg = route.clone();
    let request_bg = request.clone();

    let revalidation = tokio::spawn(async move {
        match network.fetch(&request_bg).await {
            Ok(response) => {
                write_cached(store.as_ref(), &route_bg, request_bg.cache_key(), &response).await;
            }
            Err(e) => {
                tracing::debug!(url = %request_bg.url, error = %e, "background revalidation failed");
            }
        }
    });

    Ok(Outcome::from_cache(cached, &route.cache_name).with_revalidation(revalidation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteMatcher;
    use crate::strategy::{ResponseSource, Strategy};
    use crate::testing::StubNetwork;
    use regex::Regex;
    use shellcache_core::{CacheEntry, HttpResponse, MemoryStore};
    use url::Url;

    const URL: &str = "https://fonts.googleapis.com/css?family=Roboto";

    fn route() -> Route {
        Route::new(
            RouteMatcher::Pattern(Regex::new(r"^https://fonts\.googleapis\.com").unwrap()),
            Strategy::StaleWhileRevalidate,
            "app-stylesheets-v1",
        )
    }

    fn request() -> Request {
        Request::get(Url::parse(URL).unwrap())
    }

    fn setup() -> (Arc<MemoryStore>, Arc<StubNetwork>, Arc<dyn CacheStore>, Arc<dyn Network>) {
        let memory = Arc::new(MemoryStore::new());
        let stub = Arc::new(StubNetwork::new());
        let store: Arc<dyn CacheStore> = memory.clone();
        let network: Arc<dyn Network> = stub.clone();
        (memory, stub, store, network)
    }

    #[tokio::test]
    async fn test_hit_returns_cached_then_refreshes() {
        let (memory, stub, store, network) = setup();
        memory
            .put("app-stylesheets-v1", CacheEntry::new(URL, HttpResponse::new(200, "old")))
            .await
            .unwrap();
        stub.set_body(URL, "new");

        let mut first = handle(&route(), &request(), &store, &network).await.unwrap();
        assert_eq!(first.source, ResponseSource::Cache);
        assert_eq!(first.response.body, "old");
        assert!(first.is_revalidating());

        first.settled().await;
        assert_eq!(stub.call_count(URL), 1);

        let second = handle(&route(), &request(), &store, &network).await.unwrap();
        assert_eq!(second.response.body, "new");
    }

    #[tokio::test]
    async fn test_miss_waits_for_network() {
        let (memory, stub, store, network) = setup();
        stub.set_body(URL, "css");

        let outcome = handle(&route(), &request(), &store, &network).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Network);
        assert!(!outcome.is_revalidating());
        assert!(memory.contains("app-stylesheets-v1", URL).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cached_entry() {
        let (memory, stub, store, network) = setup();
        memory
            .put("app-stylesheets-v1", CacheEntry::new(URL, HttpResponse::new(200, "old")))
            .await
            .unwrap();
        stub.set_online(false);

        let mut outcome = handle(&route(), &request(), &store, &network).await.unwrap();
        outcome.settled().await;

        let stored = memory.get("app-stylesheets-v1", URL).await.unwrap().unwrap();
        assert_eq!(stored.response.body, "old");
    }

    #[tokio::test]
    async fn test_uncacheable_refresh_keeps_cached_entry() {
        let (memory, stub, store, network) = setup();
        memory
            .put("app-stylesheets-v1", CacheEntry::new(URL, HttpResponse::new(200, "old")))
            .await
            .unwrap();
        stub.set(URL, HttpResponse::new(404, "gone"));

        let mut outcome = handle(&route(), &request(), &store, &network).await.unwrap();
        outcome.settled().await;

        let stored = memory.get("app-stylesheets-v1", URL).await.unwrap().unwrap();
        assert_eq!(stored.response.body, "old");
    }
}
