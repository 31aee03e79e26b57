//! Versioned cache naming.
//!
//! Every cache is named `<prefix>-<role>-<suffix>`. Bumping the suffix
//! produces a fresh set of names, leaving the previous version's caches as
//! orphans that activation deletes.

/// Role of the cache populated from the install-time manifest.
pub const PRECACHE_ROLE: &str = "precache";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    prefix: String,
    suffix: String,
}

impl CacheNames {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), suffix: suffix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Full name of the cache serving `role` in the current version.
    pub fn name_for(&self, role: &str) -> String {
        format!("{}-{}-{}", self.prefix, role, self.suffix)
    }

    pub fn precache(&self) -> String {
        self.name_for(PRECACHE_ROLE)
    }

    /// Whether the cache carries this app's prefix, in any version.
    pub fn is_owned(&self, name: &str) -> bool {
        name.strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Whether the cache carries this app's prefix and the current suffix.
    pub fn is_current(&self, name: &str) -> bool {
        let Some(rest) = name.strip_prefix(&self.prefix).and_then(|r| r.strip_prefix('-')) else {
            return false;
        };
        rest.strip_suffix(&self.suffix)
            .and_then(|role| role.strip_suffix('-'))
            .is_some_and(|role| !role.is_empty())
    }

    /// Owned by this app but left over from another version.
    pub fn is_stale(&self, name: &str) -> bool {
        self.is_owned(name) && !self.is_current(name)
    }

    /// Whether the cache is a precache of any version of this app.
    pub fn is_precache(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-{}-", self.prefix, PRECACHE_ROLE))
    }
}
