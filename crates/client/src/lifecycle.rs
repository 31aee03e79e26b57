//! Worker version lifecycle and event dispatch.
//!
//! ```text
//! Installing --install ok--> Waiting --activate / SKIP_WAITING--> Active
//!      |
//!      +--install failed--> Redundant
//! ```
//!
//! Only an active worker intercepts fetches; until then every request goes
//! straight to the network.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shellcache_core::{AppConfig, CacheNames, CacheStore, Error, HttpResponse};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::{Network, Request, resolve};
use crate::precache::{InstallReport, PrecacheController, PrecacheManifest};
use crate::routing::Router;
use crate::strategy::{self, Outcome, ResponseSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Installing,
    Waiting,
    Active,
    /// Install failed; this version never takes control.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Message posted to the worker by a controlled page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// `{"type": "SKIP_WAITING"}`: activate without waiting.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Parse a posted message; anything unrecognised is `Unknown`.
    pub fn parse(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(ControlMessage::Unknown)
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Message(ControlMessage),
    Fetch(Request),
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallSummary),
    Activated(ActivationReport),
    MessageHandled(LifecycleState),
    Fetched(Outcome),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Caches of other versions that were deleted.
    pub deleted_caches: Vec<String>,
    /// Current-precache keys no longer in the manifest.
    pub removed_precache_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    pub precache: InstallReport,
    pub state: LifecycleState,
    /// Present when install went straight on to activation.
    pub activation: Option<ActivationReport>,
}

#[derive(Debug, Default)]
struct Status {
    state: LifecycleState,
    skip_waiting_requested: bool,
    clients_claimed: bool,
    install_in_progress: bool,
}

/// One version of the offline cache worker.
pub struct Worker {
    names: CacheNames,
    router: Router,
    precache: PrecacheController,
    offline_url: Url,
    skip_waiting: bool,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    status: RwLock<Status>,
}

impl Worker {
    /// Build a worker for the configured version.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable scope, route or manifest entry.
    pub fn from_config(config: &AppConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let scope = config
            .scope_url()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let names = config.cache_names();
        let router = Router::from_config(config, scope.clone())?;
        let manifest = PrecacheManifest::resolve(&scope, &config.precache())?;
        let offline_url = resolve(&scope, &config.offline_document)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.offline_document)))?;

        Ok(Self {
            precache: PrecacheController::new(manifest, names.clone()),
            names,
            router,
            offline_url,
            skip_waiting: config.skip_waiting,
            store,
            network,
            status: RwLock::new(Status::default()),
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn state(&self) -> LifecycleState {
        self.status.read().await.state
    }

    /// Whether activation has taken control of open clients.
    pub async fn clients_claimed(&self) -> bool {
        self.status.read().await.clients_claimed
    }

    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Install => self.install().await.map(EventOutcome::Installed),
            Event::Activate => self.activate().await.map(EventOutcome::Activated),
            Event::Message(message) => self.handle_message(message).await.map(EventOutcome::MessageHandled),
            Event::Fetch(request) => self.handle_fetch(&request).await.map(EventOutcome::Fetched),
        }
    }

    /// Populate the precache and move to `Waiting`, or straight to `Active`
    /// when skip-waiting is configured or was requested.
    ///
    /// Installing again after success re-checks the precache without
    /// changing state.
    ///
    /// # Errors
    ///
    /// `InvalidState` for a redundant worker or an install already running;
    /// otherwise whatever the precache install failed with.
    pub async fn install(&self) -> Result<InstallSummary, Error> {
        {
            let mut status = self.status.write().await;
            if status.state == LifecycleState::Redundant {
                return Err(Error::InvalidState("worker is redundant after a failed install".into()));
            }
            if status.install_in_progress {
                return Err(Error::InvalidState("install already in progress".into()));
            }
            status.install_in_progress = true;
        }

        let result = self
            .precache
            .install(self.store.as_ref(), self.network.as_ref())
            .await;

        let activate_now = {
            let mut status = self.status.write().await;
            status.install_in_progress = false;

            match &result {
                Err(e) => {
                    if status.state == LifecycleState::Installing {
                        status.state = LifecycleState::Redundant;
                    }
                    tracing::warn!(error = %e, state = %status.state, "install failed");
                    false
                }
                Ok(_) if status.state == LifecycleState::Installing => {
                    status.state = LifecycleState::Waiting;
                    tracing::info!(version = self.names.suffix(), "installed, waiting");
                    self.skip_waiting || status.skip_waiting_requested
                }
                Ok(_) => false,
            }
        };

        let precache = result?;
        let activation = if activate_now { Some(self.activate().await?) } else { None };

        Ok(InstallSummary { precache, state: self.state().await, activation })
    }

    /// Delete other versions' caches, prune the precache and take control.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the worker is waiting or already active.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let state = self.state().await;
        if !matches!(state, LifecycleState::Waiting | LifecycleState::Active) {
            return Err(Error::InvalidState(format!("cannot activate while {state}")));
        }

        let mut report = ActivationReport::default();
        for name in self.store.list_names().await? {
            if self.names.is_stale(&name) && self.store.delete(&name).await? {
                tracing::info!(cache = %name, "deleted stale cache");
                report.deleted_caches.push(name);
            }
        }
        report.removed_precache_keys = self.precache.cleanup(self.store.as_ref()).await?;

        let mut status = self.status.write().await;
        if status.state != LifecycleState::Active {
            tracing::info!(version = self.names.suffix(), deleted = report.deleted_caches.len(), "activated");
        }
        status.state = LifecycleState::Active;
        status.clients_claimed = true;

        Ok(report)
    }

    /// React to a posted message, returning the resulting state.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<LifecycleState, Error> {
        match message {
            ControlMessage::SkipWaiting => {
                let state = {
                    let mut status = self.status.write().await;
                    if status.state == LifecycleState::Installing {
                        status.skip_waiting_requested = true;
                    }
                    status.state
                };

                if state == LifecycleState::Waiting {
                    self.activate().await?;
                }
            }
            ControlMessage::Unknown => tracing::debug!("ignoring unknown message"),
        }

        Ok(self.state().await)
    }

    /// Answer an outgoing request.
    ///
    /// Network and cache failures are absorbed into the outcome; the only
    /// error is a failed navigation with no offline document to serve.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Outcome, Error> {
        if !request.is_get() || self.state().await != LifecycleState::Active {
            return Ok(self.passthrough(request).await);
        }

        match self.respond(request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if request.is_navigation() => self.offline_fallback(request, &e).await,
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "request failed");
                Ok(Outcome::unavailable())
            }
        }
    }

    async fn respond(&self, request: &Request) -> Result<Outcome, Error> {
        if let Some(key) = self.precache.key_for(&request.url) {
            match self.store.get(self.precache.cache_name(), key).await {
                Ok(Some(entry)) => return Ok(Outcome::from_cache(entry.response, self.precache.cache_name())),
                Ok(None) => tracing::debug!(key, "precached entry missing, using network"),
                Err(e) => tracing::warn!(key, error = %e, "precache read failed, using network"),
            }
            let response = self.network.fetch(request).await?;
            return Ok(Outcome::from_network(response, None));
        }

        if let Some(route) = self.router.find(request) {
            return strategy::handle(route, request, &self.store, &self.network).await;
        }

        let response = self.network.fetch(request).await?;
        Ok(Outcome::passthrough(response))
    }

    async fn passthrough(&self, request: &Request) -> Outcome {
        match self.network.fetch(request).await {
            Ok(response) => Outcome::passthrough(response),
            Err(e) => {
                tracing::debug!(method = %request.method, url = %request.url, error = %e, "passthrough failed");
                Outcome::unavailable()
            }
        }
    }

    async fn offline_fallback(&self, request: &Request, cause: &Error) -> Result<Outcome, Error> {
        match self.precache.lookup(self.store.as_ref(), &self.offline_url).await {
            Ok(Some(response)) => {
                tracing::info!(url = %request.url, error = %cause, "serving offline document");
                Ok(offline(response, self.precache.cache_name()))
            }
            Ok(None) => Err(Error::OfflineDocumentMissing(self.offline_url.to_string())),
            Err(e) => Err(Error::OfflineDocumentMissing(format!("{}: {e}", self.offline_url))),
        }
    }
}

fn offline(response: HttpResponse, cache_name: &str) -> Outcome {
    Outcome::new(response, ResponseSource::Offline, Some(cache_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RequestMode;
    use crate::testing::StubNetwork;
    use reqwest::Method;
    use shellcache_core::config::PrecacheEntry;
    use shellcache_core::{CacheEntry, MemoryStore};

    const SCOPE: &str = "https://app.example.com/";

    fn config(suffix: &str, skip_waiting: bool) -> AppConfig {
        AppConfig {
            scope: SCOPE.into(),
            cache_prefix: "bed-counter".into(),
            cache_suffix: suffix.into(),
            skip_waiting,
            precache: Some(vec![
                PrecacheEntry::new("/", Some(suffix)),
                PrecacheEntry::new("offline.html", Some(suffix)),
            ]),
            ..Default::default()
        }
    }

    fn online_network() -> Arc<StubNetwork> {
        Arc::new(
            StubNetwork::new()
                .with_body("https://app.example.com/", "shell")
                .with_body("https://app.example.com/offline.html", "you are offline")
                .with_body("https://app.example.com/beds", "beds page")
                .with_body("https://app.example.com/img/ward.png", "png"),
        )
    }

    fn worker(config: &AppConfig, store: &Arc<MemoryStore>, network: &Arc<StubNetwork>) -> Worker {
        let store: Arc<dyn CacheStore> = store.clone();
        let network: Arc<dyn Network> = network.clone();
        Worker::from_config(config, store, network).unwrap()
    }

    fn url(path: &str) -> Url {
        Url::parse(SCOPE).unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_install_then_waiting() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", false), &store, &network);

        let summary = worker.install().await.unwrap();

        assert_eq!(summary.state, LifecycleState::Waiting);
        assert!(summary.activation.is_none());
        assert_eq!(summary.precache.fetched.len(), 2);
        assert!(!worker.clients_claimed().await);
    }

    #[tokio::test]
    async fn test_skip_waiting_config_activates_on_install() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);

        let summary = worker.install().await.unwrap();

        assert_eq!(summary.state, LifecycleState::Active);
        assert!(summary.activation.is_some());
        assert!(worker.clients_claimed().await);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_while_waiting_activates() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", false), &store, &network);
        worker.install().await.unwrap();

        let message = ControlMessage::parse(&serde_json::json!({"type": "SKIP_WAITING"}));
        let state = worker.handle_message(message).await.unwrap();

        assert_eq!(state, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_before_install_is_remembered() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", false), &store, &network);

        let state = worker.handle_message(ControlMessage::SkipWaiting).await.unwrap();
        assert_eq!(state, LifecycleState::Installing);

        let summary = worker.install().await.unwrap();
        assert_eq!(summary.state, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", false), &store, &network);
        worker.install().await.unwrap();

        let message = ControlMessage::parse(&serde_json::json!({"type": "CLAIM"}));
        assert_eq!(message, ControlMessage::Unknown);
        assert_eq!(ControlMessage::parse(&serde_json::json!("SKIP_WAITING")), ControlMessage::Unknown);

        let state = worker.handle_message(message).await.unwrap();
        assert_eq!(state, LifecycleState::Waiting);
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        network.set_online(false);
        let worker = worker(&config("v2", true), &store, &network);

        assert!(matches!(worker.install().await, Err(Error::PrecacheFetchFailed { .. })));
        assert_eq!(worker.state().await, LifecycleState::Redundant);
        assert!(matches!(worker.install().await, Err(Error::InvalidState(_))));
        assert!(store.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", false), &store, &network);

        assert!(matches!(worker.activate().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_version_bump_refetches_default_shell() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(
            [
                "",
                "index.html",
                "offline.html",
                "manifest.json",
                "android-chrome-192x192.png",
                "android-chrome-512x512.png",
            ]
            .into_iter()
            .fold(StubNetwork::new(), |stub, path| stub.with_body(url(path).as_str(), path)),
        );
        let shell = |suffix: &str| AppConfig {
            scope: SCOPE.into(),
            cache_suffix: suffix.into(),
            ..Default::default()
        };

        let first = worker(&shell("v1.2"), &store, &network).install().await.unwrap();
        let bumped = worker(&shell("v1.3"), &store, &network).install().await.unwrap();

        assert_eq!(first.precache.fetched.len(), 6);
        assert_eq!(bumped.precache.fetched.len(), 6);
        assert!(bumped.precache.reused.is_empty());
        assert!(bumped.precache.fetched.iter().all(|key| key.ends_with("__WB_REVISION__=v1.3")));
    }

    #[tokio::test]
    async fn test_reinstall_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);

        worker.install().await.unwrap();
        let again = worker.install().await.unwrap();

        assert!(again.precache.fetched.is_empty());
        assert_eq!(again.state, LifecycleState::Active);
        assert_eq!(network.calls().len(), 2);
        assert_eq!(store.keys("bed-counter-precache-v2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_activation_deletes_only_stale_caches() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        for name in ["bed-counter-images-v1", "bed-counter-precache-v1", "bed-counter-images-v2", "other-app-v1"] {
            store
                .put(name, CacheEntry::new("https://app.example.com/x", HttpResponse::new(200, "x")))
                .await
                .unwrap();
        }
        let worker = worker(&config("v2", false), &store, &network);
        worker.install().await.unwrap();

        let report = worker.activate().await.unwrap();

        assert_eq!(report.deleted_caches, vec!["bed-counter-images-v1", "bed-counter-precache-v1"]);
        assert_eq!(
            store.list_names().await.unwrap(),
            vec!["bed-counter-images-v2", "bed-counter-precache-v2", "other-app-v1"]
        );
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", false), &store, &network);
        worker.install().await.unwrap();

        let outcome = worker.handle_fetch(&Request::get(url("img/ward.png"))).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Passthrough);
        assert!(!store.contains("bed-counter-images-v2", url("img/ward.png").as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_precached_shell_served_from_cache() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);
        worker.install().await.unwrap();
        network.set_online(false);

        let outcome = worker.handle_fetch(&Request::navigate(url("/?utm_source=pwa"))).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body, "shell");
    }

    #[tokio::test]
    async fn test_runtime_route_caches_image() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);
        worker.install().await.unwrap();

        let request = Request::get(url("img/ward.png"));
        let first = worker.handle_fetch(&request).await.unwrap();
        let second = worker.handle_fetch(&request).await.unwrap();

        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.cache_name.as_deref(), Some("bed-counter-images-v2"));
        assert_eq!(network.call_count("https://app.example.com/img/ward.png"), 1);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_document() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);
        worker.install().await.unwrap();
        network.set_online(false);

        let outcome = worker.handle_fetch(&Request::navigate(url("beds/ward-3"))).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Offline);
        assert_eq!(outcome.response.body, "you are offline");
    }

    #[tokio::test]
    async fn test_offline_navigation_prefers_cached_page() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);
        worker.install().await.unwrap();
        worker.handle_fetch(&Request::navigate(url("beds"))).await.unwrap();
        network.set_online(false);

        let outcome = worker.handle_fetch(&Request::navigate(url("beds"))).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body, "beds page");
    }

    #[tokio::test]
    async fn test_offline_navigation_without_document_is_error() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let mut config = config("v2", true);
        config.precache = Some(vec![PrecacheEntry::new("/", Some("v2"))]);
        let worker = worker(&config, &store, &network);
        worker.install().await.unwrap();
        network.set_online(false);

        let result = worker.handle_fetch(&Request::navigate(url("beds"))).await;

        assert!(matches!(result, Err(Error::OfflineDocumentMissing(_))));
    }

    #[tokio::test]
    async fn test_offline_subresource_is_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);
        worker.install().await.unwrap();
        network.set_online(false);

        let outcome = worker.handle_fetch(&Request::get(url("img/other.png"))).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Unavailable);
        assert_eq!(outcome.response.status, 0);
    }

    #[tokio::test]
    async fn test_post_never_touches_cache() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", true), &store, &network);
        worker.install().await.unwrap();
        let before = store.list_names().await.unwrap();

        let post = Request::new(Method::POST, url("img/ward.png"), RequestMode::Subresource);
        let outcome = worker.handle_fetch(&post).await.unwrap();
        worker.handle_fetch(&post).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Passthrough);
        assert_eq!(store.list_names().await.unwrap(), before);
        assert_eq!(network.call_count("https://app.example.com/img/ward.png"), 2);
    }

    #[tokio::test]
    async fn test_dispatch_routes_events() {
        let store = Arc::new(MemoryStore::new());
        let network = online_network();
        let worker = worker(&config("v2", false), &store, &network);

        assert!(matches!(worker.dispatch(Event::Install).await.unwrap(), EventOutcome::Installed(_)));
        assert!(matches!(
            worker.dispatch(Event::Message(ControlMessage::SkipWaiting)).await.unwrap(),
            EventOutcome::MessageHandled(LifecycleState::Active)
        ));
        let fetched = worker
            .dispatch(Event::Fetch(Request::get(url("img/ward.png"))))
            .await
            .unwrap();
        assert!(matches!(fetched, EventOutcome::Fetched(ref o) if o.source == ResponseSource::Network));
    }
}
