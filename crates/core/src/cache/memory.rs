//! In-memory cache store.
//!
//! Same semantics as the SQLite store without persistence. Used for ephemeral
//! workers and as the fake store in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::store::{CacheEntry, CacheStore};
use crate::Error;

#[derive(Debug)]
struct Slot {
    seq: u64,
    entry: CacheEntry,
}

type Caches = HashMap<String, HashMap<String, Slot>>;

/// Cache store backed by a `HashMap` behind a tokio `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    caches: Arc<RwLock<Caches>>,
    seq: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn ordered_keys(cache: &HashMap<String, Slot>) -> Vec<String> {
    let mut slots: Vec<(&String, u64)> = cache.iter().map(|(k, s)| (k, s.seq)).collect();
    slots.sort_by_key(|(_, seq)| *seq);
    slots.into_iter().map(|(k, _)| k.clone()).collect()
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, cache_name: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        let caches = self.caches.read().await;
        Ok(caches
            .get(cache_name)
            .and_then(|cache| cache.get(key))
            .map(|slot| slot.entry.clone()))
    }

    async fn put(&self, cache_name: &str, entry: CacheEntry) -> Result<(), Error> {
        self.put_all(cache_name, vec![entry]).await
    }

    async fn put_all(&self, cache_name: &str, entries: Vec<CacheEntry>) -> Result<(), Error> {
        let mut caches = self.caches.write().await;
        let cache = caches.entry(cache_name.to_string()).or_default();
        for entry in entries {
            let seq = self.next_seq();
            cache.insert(entry.key.clone(), Slot { seq, entry });
        }
        Ok(())
    }

    async fn remove(&self, cache_name: &str, key: &str) -> Result<bool, Error> {
        let mut caches = self.caches.write().await;
        Ok(caches
            .get_mut(cache_name)
            .is_some_and(|cache| cache.remove(key).is_some()))
    }

    async fn keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let caches = self.caches.read().await;
        Ok(caches.get(cache_name).map(ordered_keys).unwrap_or_default())
    }

    async fn delete(&self, cache_name: &str) -> Result<bool, Error> {
        let mut caches = self.caches.write().await;
        Ok(caches.remove(cache_name).is_some())
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        let caches = self.caches.read().await;
        let mut names: Vec<String> = caches.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn trim_oldest(&self, cache_name: &str, max_entries: usize) -> Result<u64, Error> {
        let mut caches = self.caches.write().await;
        let Some(cache) = caches.get_mut(cache_name) else {
            return Ok(0);
        };
        if cache.len() <= max_entries {
            return Ok(0);
        }

        let excess = cache.len() - max_entries;
        for key in ordered_keys(cache).into_iter().take(excess) {
            cache.remove(&key);
        }
        Ok(excess as u64)
    }

    async fn purge_stored_before(&self, cache_name: &str, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let mut caches = self.caches.write().await;
        let Some(cache) = caches.get_mut(cache_name) else {
            return Ok(0);
        };
        let before = cache.len();
        cache.retain(|_, slot| slot.entry.stored_at >= cutoff);
        Ok((before - cache.len()) as u64)
    }
}
