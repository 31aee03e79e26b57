//! Stub network for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shellcache_core::{Error, HttpResponse};

use crate::fetch::{Network, Request};

/// In-process [`Network`] serving canned responses.
///
/// Unknown URLs answer 404. Switching it offline makes every fetch fail at
/// the transport level. Every call is recorded, including failed ones.
#[derive(Debug, Default)]
pub struct StubNetwork {
    responses: Mutex<HashMap<String, HttpResponse>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, response: HttpResponse) -> Self {
        self.set(url, response);
        self
    }

    /// Answer `url` with a 200 text body.
    pub fn with_body(self, url: &str, body: &str) -> Self {
        self.with(url, HttpResponse::new(200, body.to_string()).with_header("content-type", "text/plain"))
    }

    pub fn set(&self, url: &str, response: HttpResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), response);
    }

    pub fn set_body(&self, url: &str, body: &str) {
        self.set(url, HttpResponse::new(200, body.to_string()));
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<HttpResponse, Error> {
        let url = request.url.as_str().to_string();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::RuntimeFetchFailed(format!("network error: offline ({url})")));
        }

        let responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(responses
            .get(&url)
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, "not found")))
    }
}
