//! Tool-layer errors for the shellcache server.
//!
//! Domain failures arrive as `shellcache_core::Error` and convert directly;
//! these cover what only the tool surface can get wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool arguments that parse but make no sense together.
    #[error("INVALID_PARAMS: {0}")]
    InvalidParams(String),

    /// Tool output could not be rendered as JSON.
    #[error("OUTPUT_FAILED: {0}")]
    Output(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidParams(_) => -32602,
            ToolError::Output(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
