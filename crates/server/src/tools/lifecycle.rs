//! shell_install, shell_activate and shell_message tool implementations.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{ActivationReport, ControlMessage, Event, EventOutcome, Worker};

use super::{json_result, unexpected_outcome};

/// Output from the shell_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellInstallOutput {
    /// Lifecycle state after install.
    pub state: String,
    /// Precache keys fetched from the network.
    pub fetched: Vec<String>,
    /// Precache keys copied from a previous version.
    pub reused: Vec<String>,
    /// Precache keys already present.
    pub unchanged: Vec<String>,
    /// Set when install activated immediately.
    pub activation: Option<ShellActivateOutput>,
}

/// Output from the shell_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellActivateOutput {
    pub state: String,
    pub deleted_caches: Vec<String>,
    pub removed_precache_keys: Vec<String>,
}

impl ShellActivateOutput {
    fn new(report: ActivationReport) -> Self {
        Self {
            state: "active".into(),
            deleted_caches: report.deleted_caches,
            removed_precache_keys: report.removed_precache_keys,
        }
    }
}

/// Parameters for the shell_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellMessageParams {
    /// Message posted to the worker, e.g. `{"type": "SKIP_WAITING"}`.
    pub message: serde_json::Value,
}

/// Output from the shell_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellMessageOutput {
    /// Whether the message was understood.
    pub recognized: bool,
    pub state: String,
}

/// Implementation of the shell_install tool.
pub async fn install_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let summary = match worker.dispatch(Event::Install).await? {
        EventOutcome::Installed(summary) => summary,
        other => return Err(unexpected_outcome(&other)),
    };

    let output = ShellInstallOutput {
        state: summary.state.to_string(),
        fetched: summary.precache.fetched,
        reused: summary.precache.reused,
        unchanged: summary.precache.unchanged,
        activation: summary.activation.map(ShellActivateOutput::new),
    };

    json_result(&output)
}

/// Implementation of the shell_activate tool.
pub async fn activate_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let report = match worker.dispatch(Event::Activate).await? {
        EventOutcome::Activated(report) => report,
        other => return Err(unexpected_outcome(&other)),
    };
    json_result(&ShellActivateOutput::new(report))
}

/// Implementation of the shell_message tool.
pub async fn message_impl(worker: &Worker, params: ShellMessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::parse(&params.message);
    let state = match worker.dispatch(Event::Message(message)).await? {
        EventOutcome::MessageHandled(state) => state,
        other => return Err(unexpected_outcome(&other)),
    };

    let output = ShellMessageOutput { recognized: message != ControlMessage::Unknown, state: state.to_string() };

    json_result(&output)
}
