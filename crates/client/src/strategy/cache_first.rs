use shellcache_core::{CacheStore, Error};

use super::{Outcome, read_cached, write_cached};
use crate::fetch::{Network, Request};
use crate::routing::Route;

/// Serve a fresh cached entry without touching the network; on a miss, fetch
/// and store.
pub(super) async fn handle(
    route: &Route, request: &Request, store: &dyn CacheStore, network: &dyn Network,
) -> Result<Outcome, Error> {
    let key = request.cache_key();

    if let Some(response) = read_cached(store, route, key).await {
        tracing::debug!(cache = %route.cache_name, key, "cache hit");
        return Ok(Outcome::from_cache(response, &route.cache_name));
    }

    let response = network.fetch(request).await?;
    write_cached(store, route, key, &response).await;
    Ok(Outcome::from_network(response, Some(&route.cache_name)))
}
