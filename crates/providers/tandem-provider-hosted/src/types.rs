//! Wire types of the agents REST API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tandem_core::{FunctionDefinition, ToolCallRecord};

/// Tool definition attached to a remote agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    /// Client-executed function
    Function {
        /// Definition
        function: FunctionDefinition,
    },
    /// Remote MCP server
    Mcp {
        /// Label the model sees
        server_label: String,
        /// Server URL
        server_url: String,
        /// Restrict to these tools
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_tools: Vec<String>,
    },
    /// Another remote agent
    ConnectedAgent {
        /// Delegate reference
        connected_agent: ConnectedAgentSpec,
    },
}

/// Connected agent reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAgentSpec {
    /// Remote agent ID
    pub id: String,
    /// Tool name
    pub name: String,
    /// When to call it
    pub description: String,
}

/// `POST /assistants`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAgentRequest {
    /// Model deployment
    pub model: String,
    /// Agent name
    pub name: String,
    /// System instructions
    pub instructions: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tools
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// Remote agent
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentObject {
    /// Agent ID
    pub id: String,
    /// Agent name
    #[serde(default)]
    pub name: Option<String>,
}

/// Remote thread
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadObject {
    /// Thread ID
    pub id: String,
}

/// `POST /threads/{id}/messages`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateMessageRequest {
    /// `user` or `assistant`
    pub role: String,
    /// Text
    pub content: String,
}

/// Content part of a thread message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Text part
    Text {
        /// Text body
        text: TextValue,
    },
    /// Anything else (images, files)
    #[serde(other)]
    Other,
}

/// Text body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextValue {
    /// Text
    pub value: String,
}

/// Thread message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMessage {
    /// Message ID
    pub id: String,
    /// Role
    pub role: String,
    /// Content parts
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Last text part, if any
    pub fn last_text(&self) -> Option<&str> {
        self.content.iter().rev().find_map(|c| match c {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

/// MCP settings applied to a single run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpToolResource {
    /// Which server these settings apply to
    pub server_label: String,
    /// `never` or `always`
    pub require_approval: String,
    /// Headers for the server
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// Per-run tool resources
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolResources {
    /// MCP servers
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mcp: Vec<McpToolResource>,
}

impl ToolResources {
    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.mcp.is_empty()
    }
}

/// `POST /threads/{id}/runs`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRunRequest {
    /// Agent to run
    pub assistant_id: String,
    /// Tool resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<ToolResources>,
}

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to start
    Queued,
    /// Running
    InProgress,
    /// Waiting for tool outputs or approvals
    RequiresAction,
    /// Being cancelled
    Cancelling,
    /// Cancelled
    Cancelled,
    /// Failed
    Failed,
    /// Completed
    Completed,
    /// Expired
    Expired,
    /// Unrecognized status
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Still running; keep polling
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            RunStatus::Queued
                | RunStatus::InProgress
                | RunStatus::RequiresAction
                | RunStatus::Cancelling
        )
    }

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

/// Error reported on a failed run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunError {
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Message
    #[serde(default)]
    pub message: String,
}

/// Function name and raw arguments
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCallSpec {
    /// Function name
    pub name: String,
    /// Raw JSON arguments
    #[serde(default)]
    pub arguments: String,
}

/// Tool call the run is waiting on
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequiredToolCall {
    /// Call ID
    pub id: String,
    /// `function` or `mcp`
    #[serde(rename = "type")]
    pub kind: String,
    /// Function details
    #[serde(default)]
    pub function: Option<FunctionCallSpec>,
    /// MCP tool name
    #[serde(default)]
    pub name: Option<String>,
    /// MCP raw arguments
    #[serde(default)]
    pub arguments: Option<String>,
    /// MCP server the call targets
    #[serde(default)]
    pub server_label: Option<String>,
}

/// Calls awaiting outputs or approvals
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequiredToolCalls {
    /// Calls
    pub tool_calls: Vec<RequiredToolCall>,
}

/// What a `requires_action` run needs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequiredAction {
    /// Run local functions and submit their outputs
    SubmitToolOutputs {
        /// Pending calls
        submit_tool_outputs: RequiredToolCalls,
    },
    /// Approve or reject MCP calls
    SubmitToolApproval {
        /// Pending calls
        submit_tool_approval: RequiredToolCalls,
    },
}

/// Run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunObject {
    /// Run ID
    pub id: String,
    /// Status
    pub status: RunStatus,
    /// Pending action
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    /// Failure details
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl RunObject {
    /// Failure message, or the status when the service gave none
    pub fn failure_message(&self) -> String {
        match &self.last_error {
            Some(err) if !err.message.is_empty() => match &err.code {
                Some(code) => format!("{} ({})", err.message, code),
                None => err.message.clone(),
            },
            _ => format!("run {}", self.status.as_str()),
        }
    }
}

/// Output for one function call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    /// Call ID
    pub tool_call_id: String,
    /// Output text
    pub output: String,
}

/// Decision for one MCP call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolApproval {
    /// Call ID
    pub tool_call_id: String,
    /// Approved or rejected
    pub approve: bool,
    /// Headers for the MCP server
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// Step details
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StepDetails {
    /// `message_creation` or `tool_calls`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Raw tool calls; their shape depends on the tool type
    #[serde(default)]
    pub tool_calls: Vec<Value>,
}

/// Run step
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunStep {
    /// Step ID
    pub id: String,
    /// Status
    #[serde(default)]
    pub status: String,
    /// Details
    #[serde(default)]
    pub step_details: StepDetails,
}

impl RunStep {
    /// Tool calls of this step as trace records
    pub fn tool_call_records(&self) -> Vec<ToolCallRecord> {
        self.step_details
            .tool_calls
            .iter()
            .map(tool_call_record)
            .collect()
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Best-effort conversion of a raw step tool call
///
/// Details live under a key named after the call type (`function`,
/// `connected_agent`) or directly on the call (`mcp`).
fn tool_call_record(raw: &Value) -> ToolCallRecord {
    let kind = string_field(raw, "type").unwrap_or_else(|| "unknown".to_string());
    let details = raw.get(kind.as_str()).filter(|d| d.is_object()).unwrap_or(raw);

    ToolCallRecord {
        id: string_field(raw, "id").unwrap_or_default(),
        name: string_field(details, "name"),
        arguments: string_field(details, "arguments"),
        output: string_field(details, "output"),
        kind,
    }
}

/// List envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    /// Items
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_with_required_outputs() {
        let run: RunObject = serde_json::from_value(json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "fetch_weather", "arguments": "{\"location\":\"New York\"}"}
                    }]
                }
            }
        }))
        .unwrap();

        assert!(run.status.is_pending());
        match run.required_action {
            Some(RequiredAction::SubmitToolOutputs { submit_tool_outputs }) => {
                let call = &submit_tool_outputs.tool_calls[0];
                assert_eq!(call.function.as_ref().unwrap().name, "fetch_weather");
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_unknown_status() {
        let run: RunObject =
            serde_json::from_value(json!({"id": "run_2", "status": "paused_for_review"})).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_pending());
        assert_eq!(run.failure_message(), "run unknown");
    }

    #[test]
    fn test_step_records() {
        let step: RunStep = serde_json::from_value(json!({
            "id": "step_1",
            "status": "completed",
            "step_details": {
                "type": "tool_calls",
                "tool_calls": [
                    {"id": "call_a", "type": "mcp", "name": "microsoft_docs_search",
                     "arguments": "{\"query\":\"az cli\"}", "output": "results"},
                    {"id": "call_b", "type": "connected_agent",
                     "connected_agent": {"name": "team_agent", "arguments": "{}", "output": "Frontend"}}
                ]
            }
        }))
        .unwrap();

        let records = step.tool_call_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, "mcp");
        assert_eq!(records[0].name.as_deref(), Some("microsoft_docs_search"));
        assert_eq!(records[1].kind, "connected_agent");
        assert_eq!(records[1].name.as_deref(), Some("team_agent"));
        assert_eq!(records[1].output.as_deref(), Some("Frontend"));
    }

    #[test]
    fn test_message_text() {
        let msg: ThreadMessage = serde_json::from_value(json!({
            "id": "msg_1",
            "role": "assistant",
            "content": [
                {"type": "image_file", "image_file": {"file_id": "f"}},
                {"type": "text", "text": {"value": "Sunny, 25°C", "annotations": []}}
            ]
        }))
        .unwrap();
        assert_eq!(msg.last_text(), Some("Sunny, 25°C"));
    }

    #[test]
    fn test_tool_spec_serialization() {
        let spec = ToolSpec::ConnectedAgent {
            connected_agent: ConnectedAgentSpec {
                id: "asst_1".into(),
                name: "priority_agent".into(),
                description: "Assess the priority of a ticket".into(),
            },
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["type"], "connected_agent");
        assert_eq!(value["connected_agent"]["id"], "asst_1");
    }
}
