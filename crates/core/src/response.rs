//! Buffered HTTP responses as they move between network, cache and caller.

use bytes::Bytes;

/// Status reported for opaque cross-origin responses and synthesized network errors.
pub const OPAQUE_STATUS: u16 = 0;

/// A fully buffered response.
///
/// Bodies are read to completion before a response is handed to a cache, so a
/// stored entry is never a partial write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// The response handed to a caller when nothing could answer a request.
    pub fn network_error() -> Self {
        Self::new(OPAQUE_STATUS, Bytes::new())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers_json(&self) -> String {
        serde_json::to_string(&self.headers).unwrap_or_else(|_| "[]".to_string())
    }

    /// Rebuild a response from its stored columns.
    pub fn from_parts(status: u16, headers_json: &str, body: impl Into<Bytes>) -> Result<Self, serde_json::Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(headers_json)?;
        Ok(Self { status, headers, body: body.into() })
    }
}
