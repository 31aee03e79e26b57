//! shell_fetch tool implementation.
//!
//! Dispatches a fetch event to the worker and reports where the answer came from.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::resolve;
use shellcache_client::{Event, EventOutcome, Method, Request, RequestMode, Worker};
use shellcache_core::Error;

use super::{json_result, unexpected_outcome};
use crate::error::ToolError;

/// Parameters for the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchParams {
    /// Absolute URL, or a path relative to the worker scope.
    pub url: String,

    /// HTTP method (default GET). Anything but GET bypasses every cache.
    #[serde(default)]
    pub method: Option<String>,

    /// Treat the request as a top-level navigation.
    #[serde(default)]
    pub navigate: bool,
}

/// Output from the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchOutput {
    pub url: String,
    pub status: u16,
    /// cache, network, offline, passthrough or unavailable.
    pub source: String,
    pub cache_name: Option<String>,
    pub content_type: Option<String>,
    /// Body as text; absent when it is not valid UTF-8.
    pub body: Option<String>,
    pub body_bytes: usize,
    /// A background refresh of the cached entry is still running.
    pub revalidating: bool,
}

/// Implementation of the shell_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: ShellFetchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(worker.router().scope(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = match params.method.as_deref().map(str::trim) {
        None | Some("") => Method::GET,
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|e| ToolError::InvalidParams(format!("method {m}: {e}")))?,
    };
    let mode = if params.navigate { RequestMode::Navigate } else { RequestMode::Subresource };

    let request = Request::new(method, url, mode);
    let outcome = match worker.dispatch(Event::Fetch(request.clone())).await? {
        EventOutcome::Fetched(outcome) => outcome,
        other => return Err(unexpected_outcome(&other)),
    };

    let response = &outcome.response;
    let output = ShellFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        source: outcome.source.as_str().to_string(),
        cache_name: outcome.cache_name.clone(),
        content_type: response.content_type().map(str::to_string),
        body: std::str::from_utf8(&response.body).ok().map(str::to_string),
        body_bytes: response.body.len(),
        revalidating: outcome.is_revalidating(),
    };

    json_result(&output)
}
