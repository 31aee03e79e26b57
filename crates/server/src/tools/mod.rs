//! MCP tool implementations.
//!
//! Every tool renders its output struct as pretty JSON text content.

pub mod cache;
pub mod fetch;
pub mod lifecycle;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use shellcache_client::EventOutcome;

use crate::error::ToolError;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::Output(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// The worker answered an event with an outcome for a different event.
pub(crate) fn unexpected_outcome(outcome: &EventOutcome) -> McpError {
    ToolError::Output(format!("unexpected worker outcome: {outcome:?}")).into()
}

/// Parse the JSON text content of a tool result.
#[cfg(test)]
pub(crate) fn parse_output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
