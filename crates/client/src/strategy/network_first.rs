use shellcache_core::{CacheStore, Error};

use super::{Outcome, read_cached, write_cached};
use crate::fetch::{Network, Request};
use crate::routing::Route;

/// Prefer the network and keep the cache current; fall back to the cached
/// copy only when the network fails outright.
///
/// An HTTP error status is still a network answer and is returned as is.
pub(super) async fn handle(
    route: &Route, request: &Request, store: &dyn CacheStore, network: &dyn Network,
) -> Result<Outcome, Error> {
    let key = request.cache_key();

    match network.fetch(request).await {
        Ok(response) => {
            write_cached(store, route, key, &response).await;
            Ok(Outcome::from_network(response, Some(&route.cache_name)))
        }
        Err(e) => match read_cached(store, route, key).await {
            Some(response) => {
                tracing::info!(cache = %route.cache_name, key, error = %e, "network failed, serving cached copy");
                Ok(Outcome::from_cache(response, &route.cache_name))
            }
            None => Err(e),
        },
    }
}
