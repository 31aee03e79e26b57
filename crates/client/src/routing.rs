//! Ordered route table.
//!
//! Routes are evaluated in registration order and the first match wins.
//! Matching is a pure function of the request and the worker scope.

use regex::Regex;
use shellcache_core::config::{RouteConfig, Strategy};
use shellcache_core::{AppConfig, CacheNames, Error, ExpirationPolicy, HttpResponse};
use url::Url;

use crate::fetch::{Request, same_origin};

#[derive(Debug, Clone)]
pub enum RouteMatcher {
    /// Regex over the full URL string.
    ///
    /// Same-origin URLs may match anywhere; cross-origin URLs only when the
    /// match starts at the first character, so a pattern like `\.png$` does
    /// not pull third-party images into the cache.
    Pattern(Regex),
    /// Navigation requests.
    Navigation,
}

impl RouteMatcher {
    pub fn matches(&self, request: &Request, scope: &Url) -> bool {
        match self {
            RouteMatcher::Navigation => request.is_navigation(),
            RouteMatcher::Pattern(regex) => match regex.find(request.url.as_str()) {
                Some(found) => found.start() == 0 || same_origin(&request.url, scope),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub matcher: RouteMatcher,
    pub strategy: Strategy,
    /// Full, versioned cache name.
    pub cache_name: String,
    pub expiration: ExpirationPolicy,
    pub cacheable_statuses: Vec<u16>,
}

impl Route {
    pub fn new(matcher: RouteMatcher, strategy: Strategy, cache_name: impl Into<String>) -> Self {
        Self {
            matcher,
            strategy,
            cache_name: cache_name.into(),
            expiration: ExpirationPolicy::default(),
            cacheable_statuses: vec![200],
        }
    }

    pub fn with_expiration(mut self, expiration: ExpirationPolicy) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.cacheable_statuses = statuses;
        self
    }

    /// Build a route from configuration, naming its cache for the current version.
    pub fn from_config(config: &RouteConfig, names: &CacheNames) -> Result<Self, Error> {
        let matcher = match (&config.pattern, config.navigate) {
            (Some(pattern), false) => RouteMatcher::Pattern(
                Regex::new(pattern).map_err(|e| Error::InvalidInput(format!("route pattern {pattern}: {e}")))?,
            ),
            (None, true) => RouteMatcher::Navigation,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "route for cache {} needs exactly one of pattern or navigate",
                    config.cache
                )));
            }
        };

        Ok(Self::new(matcher, config.strategy, names.name_for(&config.cache))
            .with_expiration(config.expiration)
            .with_statuses(config.cacheable_statuses.clone()))
    }

    /// Whether a network response may be written to this route's cache.
    pub fn is_cacheable(&self, response: &HttpResponse) -> bool {
        self.cacheable_statuses.contains(&response.status)
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    scope: Url,
    routes: Vec<Route>,
}

impl Router {
    pub fn new(scope: Url) -> Self {
        Self { scope, routes: Vec::new() }
    }

    /// Build the route table from configuration, preserving its order.
    pub fn from_config(config: &AppConfig, scope: Url) -> Result<Self, Error> {
        let names = config.cache_names();
        let mut router = Self::new(scope);
        for route in &config.routes {
            router.register(Route::from_config(route, &names)?);
        }
        Ok(router)
    }

    pub fn register(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// First route accepting the request.
    pub fn find(&self, request: &Request) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(request, &self.scope))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }
}
