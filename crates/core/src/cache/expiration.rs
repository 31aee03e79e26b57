//! Count and age caps for a named cache.
//!
//! Enforcement is opportunistic: callers run [`ExpirationPolicy::enforce`]
//! after writing and check [`ExpirationPolicy::is_fresh`] on read. Concurrent
//! writers may briefly overshoot the caps.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::store::{CacheEntry, CacheStore};
use crate::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExpirationPolicy {
    /// Keep at most this many entries, dropping the oldest-inserted first.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Entries older than this are treated as absent.
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
}

impl ExpirationPolicy {
    pub fn new(max_entries: Option<usize>, max_age_seconds: Option<u64>) -> Self {
        Self { max_entries, max_age_seconds }
    }

    /// No caps configured.
    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.max_age_seconds.is_none()
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_seconds.map(|secs| {
            i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX)
        })
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match self.max_age() {
            Some(max_age) => entry.age(now) <= max_age,
            None => true,
        }
    }

    /// Apply both caps to `cache_name`, returning how many entries were removed.
    pub async fn enforce(&self, store: &dyn CacheStore, cache_name: &str, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut removed = 0;

        if let Some(cutoff) = self.max_age().and_then(|max_age| now.checked_sub_signed(max_age)) {
            removed += store.purge_stored_before(cache_name, cutoff).await?;
        }

        if let Some(max_entries) = self.max_entries {
            removed += store.trim_oldest(cache_name, max_entries).await?;
        }

        if removed > 0 {
            tracing::debug!(cache = cache_name, removed, "expired cache entries");
        }

        Ok(removed)
    }
}
