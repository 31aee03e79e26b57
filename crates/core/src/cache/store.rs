//! The cache store interface shared by every backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Error;
use crate::response::HttpResponse;

/// A persisted response, owned by exactly one named cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub response: HttpResponse,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(key: impl Into<String>, response: HttpResponse) -> Self {
        Self { key: key.into(), response, stored_at: Utc::now() }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.stored_at)
    }
}

/// Named collections of request->response entries.
///
/// Caches are created lazily by the first write and only disappear through
/// [`CacheStore::delete`]. Overwriting a key moves it to the newest insertion
/// position, which is the order `keys` and `trim_oldest` observe.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up an entry in a named cache.
    async fn get(&self, cache_name: &str, key: &str) -> Result<Option<CacheEntry>, Error>;

    /// Insert or replace an entry, creating the cache if needed.
    async fn put(&self, cache_name: &str, entry: CacheEntry) -> Result<(), Error>;

    /// Commit several entries together: either all of them become visible or none do.
    async fn put_all(&self, cache_name: &str, entries: Vec<CacheEntry>) -> Result<(), Error>;

    /// Remove a single entry. Returns whether it existed.
    async fn remove(&self, cache_name: &str, key: &str) -> Result<bool, Error>;

    /// Keys of a cache, oldest-inserted first. Empty for an unknown cache.
    async fn keys(&self, cache_name: &str) -> Result<Vec<String>, Error>;

    /// Delete a whole cache. Returns whether it existed.
    async fn delete(&self, cache_name: &str) -> Result<bool, Error>;

    /// Names of all existing caches, sorted.
    async fn list_names(&self) -> Result<Vec<String>, Error>;

    /// Remove oldest-inserted entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    async fn trim_oldest(&self, cache_name: &str, max_entries: usize) -> Result<u64, Error>;

    /// Remove entries stored strictly before `cutoff`.
    ///
    /// Returns the number of deleted entries.
    async fn purge_stored_before(&self, cache_name: &str, cutoff: DateTime<Utc>) -> Result<u64, Error>;

    async fn contains(&self, cache_name: &str, key: &str) -> Result<bool, Error> {
        Ok(self.get(cache_name, key).await?.is_some())
    }
}
