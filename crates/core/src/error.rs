//! Unified error types for shellcache.
//!
//! Every variant carries a stable upper-case code prefix so log lines and tool
//! errors can be grepped without parsing.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the shellcache worker and its tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Lifecycle event received in a state that cannot accept it.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Two manifest entries share a URL but disagree on the revision.
    #[error("PRECACHE_CONFLICT: {url} listed with revisions {first:?} and {second:?}")]
    ConflictingManifestEntry { url: String, first: Option<String>, second: Option<String> },

    /// A manifest entry could not be fetched; the install step fails as a whole.
    #[error("PRECACHE_FETCH_FAILED: {url}: {reason}")]
    PrecacheFetchFailed { url: String, reason: String },

    /// A runtime fetch failed at the transport level.
    #[error("FETCH_FAILED: {0}")]
    RuntimeFetchFailed(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Writing a response into a cache failed.
    #[error("CACHE_WRITE_FAILED: {0}")]
    CacheWriteFailed(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// A navigation failed and the offline document is not cached.
    #[error("OFFLINE_DOCUMENT_MISSING: {0}")]
    OfflineDocumentMissing(String),

    /// Stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::InvalidState(msg) => (-32013, msg.clone()),
            Error::ConflictingManifestEntry { .. } => (-32014, err.to_string()),
            Error::PrecacheFetchFailed { .. } => (-32015, err.to_string()),
            Error::RuntimeFetchFailed(msg) => (-32008, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::CacheWriteFailed(msg) => (-32002, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::OfflineDocumentMissing(msg) => (-32016, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("https://app.test/index.html".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("index.html"));
    }

    #[test]
    fn test_precache_error_display() {
        let err = Error::PrecacheFetchFailed { url: "https://app.test/offline.html".into(), reason: "status 404".into() };
        let text = err.to_string();
        assert!(text.starts_with("PRECACHE_FETCH_FAILED"));
        assert!(text.contains("status 404"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("abc123".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);

        let err = Error::InvalidState("worker is redundant".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32013);
    }
}
