//! Outgoing requests and the network they go to.
//!
//! ### Requests
//! - Every request carries a method, a resolved URL and a mode.
//! - `Navigate` marks top-level document loads; everything else is a subresource.
//!
//! ### Network
//! - [`Network`] is the seam between strategies and the transport.
//! - [`FetchClient`] implements it with reqwest, buffering the whole body
//!   before returning so cache writes never see a partial response.
//! - Only transport failures are errors; any HTTP status is a response.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, resolve, same_origin};
pub use reqwest::Method;

use shellcache_core::{AppConfig, Error, HttpResponse};

/// Request mode as seen by the interceptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Script, style, image, font, XHR...
    #[default]
    Subresource,
}

/// An intercepted outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: ::url::Url,
    pub mode: RequestMode,
}

impl Request {
    /// Build a request; any fragment is dropped since it never reaches the server.
    pub fn new(method: Method, mut url: ::url::Url, mode: RequestMode) -> Self {
        url.set_fragment(None);
        Self { method, url, mode }
    }

    /// GET subresource request.
    pub fn get(url: ::url::Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Subresource)
    }

    /// GET navigation request.
    pub fn navigate(url: ::url::Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Navigate)
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Runtime cache key: the resolved URL without fragment.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// Transport used by strategies and the precache installer.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request, returning a fully buffered response.
    ///
    /// Errors only on transport failure; HTTP error statuses are responses.
    async fn fetch(&self, request: &Request) -> Result<HttpResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "shellcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::RuntimeFetchFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn collect_headers(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<HttpResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        if request.is_navigation() {
            builder = builder.header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            );
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::RuntimeFetchFailed(format!("network error: {}", e)))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let headers = collect_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::RuntimeFetchFailed(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                body.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(HttpResponse { status: status.as_u16(), headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_drops_fragment() {
        let with_fragment = Request::get(::url::Url::parse("https://app.example.com/img/a.png#x").unwrap());
        let plain = Request::get(::url::Url::parse("https://app.example.com/img/a.png").unwrap());
        assert_eq!(with_fragment.cache_key(), "https://app.example.com/img/a.png");
        assert_eq!(with_fragment, plain);
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "test-agent".into(), timeout_ms: 500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_request_constructors() {
        let url = ::url::Url::parse("https://app.example.com/").unwrap();
        let nav = Request::navigate(url.clone());
        assert!(nav.is_get());
        assert!(nav.is_navigation());

        let post = Request::new(Method::POST, url, RequestMode::Subresource);
        assert!(!post.is_get());
        assert!(!post.is_navigation());
        assert_eq!(post.cache_key(), "https://app.example.com/");
    }

    #[test]
    fn test_collect_headers_skips_non_utf8() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/css"));
        headers.insert(header::ETAG, header::HeaderValue::from_bytes(b"\xff\xfe").unwrap());
        let collected = collect_headers(&headers);
        assert_eq!(collected, vec![("content-type".to_string(), "text/css".to_string())]);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }
}
