//! Install-time precache.
//!
//! ### Manifest
//! - Entries resolve against the worker scope.
//! - A revisioned entry is keyed `url?__WB_REVISION__=<revision>`, so a new
//!   revision lands under a new key even when the URL is unchanged.
//! - Exact duplicates collapse; the same URL with two revisions is rejected.
//!
//! ### Install
//! - Keys already in the current precache are left alone.
//! - Keys found in an older version's precache are copied over, not fetched.
//! - Everything else is fetched; one failure fails the whole install and
//!   nothing is written.
//!
//! ### Lookup
//! A request URL is tried as is, without tracking parameters, with a
//! directory index, and with a `.html` suffix, in that order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use shellcache_core::config::PrecacheEntry;
use shellcache_core::{CacheEntry, CacheNames, CacheStore, Error, HttpResponse};
use url::Url;

use crate::fetch::{Network, Request, resolve};

/// Query parameter carrying an entry's revision in its cache key.
pub const REVISION_PARAM: &str = "__WB_REVISION__";

const DIRECTORY_INDEX: &str = "index.html";

/// A resolved manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub url: Url,
    pub revision: Option<String>,
    pub cache_key: String,
}

impl ManifestEntry {
    fn new(url: Url, revision: Option<String>) -> Self {
        let cache_key = match &revision {
            Some(revision) => {
                let mut keyed = url.clone();
                keyed.query_pairs_mut().append_pair(REVISION_PARAM, revision);
                keyed.to_string()
            }
            None => url.to_string(),
        };
        Self { url, revision, cache_key }
    }
}

/// Ordered, de-duplicated precache manifest.
#[derive(Debug, Clone, Default)]
pub struct PrecacheManifest {
    entries: Vec<ManifestEntry>,
    url_to_key: HashMap<String, String>,
}

impl PrecacheManifest {
    /// Resolve configured entries against `scope`.
    ///
    /// # Errors
    ///
    /// `InvalidUrl` for an unresolvable entry, `ConflictingManifestEntry` when
    /// one URL is listed with two different revisions.
    pub fn resolve(scope: &Url, entries: &[PrecacheEntry]) -> Result<Self, Error> {
        let mut manifest = Self::default();

        for entry in entries {
            let url = resolve(scope, &entry.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", entry.url)))?;
            let revision = entry.revision.clone().filter(|r| !r.is_empty());
            let resolved = ManifestEntry::new(url, revision);

            match manifest.url_to_key.get(resolved.url.as_str()) {
                Some(existing) if *existing == resolved.cache_key => continue,
                Some(_) => {
                    let first = manifest
                        .entries
                        .iter()
                        .find(|e| e.url == resolved.url)
                        .and_then(|e| e.revision.clone());
                    return Err(Error::ConflictingManifestEntry {
                        url: resolved.url.to_string(),
                        first,
                        second: resolved.revision,
                    });
                }
                None => {
                    manifest
                        .url_to_key
                        .insert(resolved.url.to_string(), resolved.cache_key.clone());
                    manifest.entries.push(resolved);
                }
            }
        }

        Ok(manifest)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Cache key for an exact (revision-free) URL.
    pub fn key_for_url(&self, url: &str) -> Option<&str> {
        self.url_to_key.get(url).map(String::as_str)
    }

    fn cache_keys(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.cache_key.as_str()).collect()
    }
}

/// Outcome of an install pass, by cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub fetched: Vec<String>,
    pub reused: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Populates, cleans and serves the current version's precache.
#[derive(Debug, Clone)]
pub struct PrecacheController {
    manifest: PrecacheManifest,
    names: CacheNames,
    cache_name: String,
}

impl PrecacheController {
    pub fn new(manifest: PrecacheManifest, names: CacheNames) -> Self {
        let cache_name = names.precache();
        Self { manifest, names, cache_name }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Populate the precache from the manifest, all-or-nothing.
    ///
    /// # Errors
    ///
    /// `PrecacheFetchFailed` if any entry fails to fetch or answers with a
    /// non-2xx status; the store is left untouched in that case.
    pub async fn install(&self, store: &dyn CacheStore, network: &dyn Network) -> Result<InstallReport, Error> {
        let previous: Vec<String> = store
            .list_names()
            .await?
            .into_iter()
            .filter(|name| self.names.is_precache(name) && *name != self.cache_name)
            .collect();

        let mut report = InstallReport::default();
        let mut pending = Vec::new();

        for entry in self.manifest.entries() {
            if store.contains(&self.cache_name, &entry.cache_key).await? {
                report.unchanged.push(entry.cache_key.clone());
                continue;
            }

            if let Some(response) = find_previous(store, &previous, &entry.cache_key).await? {
                report.reused.push(entry.cache_key.clone());
                pending.push(CacheEntry::new(entry.cache_key.clone(), response));
                continue;
            }

            let response = fetch_entry(network, entry).await?;
            report.fetched.push(entry.cache_key.clone());
            pending.push(CacheEntry::new(entry.cache_key.clone(), response));
        }

        if !pending.is_empty() {
            store
                .put_all(&self.cache_name, pending)
                .await
                .map_err(|e| Error::CacheWriteFailed(format!("{}: {e}", self.cache_name)))?;
        }

        tracing::info!(
            cache = %self.cache_name,
            fetched = report.fetched.len(),
            reused = report.reused.len(),
            unchanged = report.unchanged.len(),
            "precache installed"
        );

        Ok(report)
    }

    /// Remove keys from the current precache that the manifest no longer lists.
    pub async fn cleanup(&self, store: &dyn CacheStore) -> Result<Vec<String>, Error> {
        let wanted = self.manifest.cache_keys();
        let mut removed = Vec::new();

        for key in store.keys(&self.cache_name).await? {
            if !wanted.contains(key.as_str()) && store.remove(&self.cache_name, &key).await? {
                removed.push(key);
            }
        }

        if !removed.is_empty() {
            tracing::info!(cache = %self.cache_name, removed = removed.len(), "removed outdated precache entries");
        }

        Ok(removed)
    }

    /// Cache key a request URL maps to, if it is precached under any variation.
    pub fn key_for(&self, url: &Url) -> Option<&str> {
        url_variations(url)
            .iter()
            .find_map(|candidate| self.manifest.key_for_url(candidate))
    }

    /// Precached response for a request URL.
    pub async fn lookup(&self, store: &dyn CacheStore, url: &Url) -> Result<Option<HttpResponse>, Error> {
        let Some(key) = self.key_for(url) else {
            return Ok(None);
        };
        Ok(store.get(&self.cache_name, key).await?.map(|entry| entry.response))
    }
}

async fn find_previous(store: &dyn CacheStore, previous: &[String], key: &str) -> Result<Option<HttpResponse>, Error> {
    for name in previous {
        if let Some(entry) = store.get(name, key).await? {
            tracing::debug!(from = %name, key, "reusing precached entry");
            return Ok(Some(entry.response));
        }
    }
    Ok(None)
}

async fn fetch_entry(network: &dyn Network, entry: &ManifestEntry) -> Result<HttpResponse, Error> {
    let response = network
        .fetch(&Request::get(entry.url.clone()))
        .await
        .map_err(|e| Error::PrecacheFetchFailed { url: entry.url.to_string(), reason: e.to_string() })?;

    if !response.is_ok() {
        return Err(Error::PrecacheFetchFailed {
            url: entry.url.to_string(),
            reason: format!("status {}", response.status),
        });
    }

    Ok(response)
}

fn is_ignored_param(name: &str) -> bool {
    name.starts_with("utm_") || name == "fbclid"
}

/// Candidate precache URLs for a request URL, most specific first.
fn url_variations(url: &Url) -> Vec<String> {
    let mut base = url.clone();
    base.set_fragment(None);

    let mut variations = vec![base.to_string()];

    if base.query_pairs().any(|(name, _)| is_ignored_param(&name)) {
        let kept: Vec<(String, String)> = base
            .query_pairs()
            .filter(|(name, _)| !is_ignored_param(name))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            base.set_query(None);
        } else {
            base.query_pairs_mut().clear().extend_pairs(kept);
        }
        variations.push(base.to_string());
    }

    let path = base.path().to_string();
    if path.ends_with('/') {
        let mut index = base.clone();
        index.set_path(&format!("{path}{DIRECTORY_INDEX}"));
        variations.push(index.to_string());
    } else {
        let mut clean = base.clone();
        clean.set_path(&format!("{path}.html"));
        variations.push(clean.to_string());
    }

    variations
}
