//! cache_purge tool implementation.
//!
//! Applies an expiration pass to one cache, or deletes it.

use chrono::Utc;
use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheStore, ExpirationPolicy};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Cache to purge.
    pub cache_name: String,

    /// Keep only the newest N entries.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Drop entries stored longer ago than this.
    #[serde(default)]
    pub max_age_seconds: Option<u64>,

    /// Delete the whole cache.
    #[serde(default)]
    pub delete: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries removed by the expiration pass.
    pub removed: u64,
    /// Whether the cache itself was deleted.
    pub deleted_cache: bool,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(store: &dyn CacheStore, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.delete {
        let deleted_cache = store.delete(&params.cache_name).await?;
        return json_result(&CachePurgeOutput { removed: 0, deleted_cache });
    }

    let policy = ExpirationPolicy::new(params.max_entries, params.max_age_seconds);
    if policy.is_unbounded() {
        return Err(ToolError::InvalidParams(
            "At least one of max_entries, max_age_seconds, or delete must be specified".to_string(),
        )
        .into());
    }

    let removed = policy.enforce(store, &params.cache_name, Utc::now()).await?;

    json_result(&CachePurgeOutput { removed, deleted_cache: false })
}
