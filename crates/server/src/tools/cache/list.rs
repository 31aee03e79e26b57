//! cache_list tool implementation.
//!
//! Lists cache names, or the keys of one cache oldest first.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheStore, Error};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the keys of this cache instead of the cache names.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Every cache name, sorted.
    pub caches: Vec<String>,
    /// Keys of the requested cache, oldest first.
    pub keys: Option<Vec<String>>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(store: &dyn CacheStore, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let caches = store.list_names().await?;

    let keys = match params.cache_name {
        Some(name) if !caches.contains(&name) => return Err(Error::CacheMiss(name).into()),
        Some(name) => Some(store.keys(&name).await?),
        None => None,
    };

    json_result(&CacheListOutput { caches, keys })
}
