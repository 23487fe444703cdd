//! Chat-completions wire types

use serde::{Deserialize, Deserializer, Serialize};
use tandem_core::FunctionDefinition;

/// Request body of `POST /chat/completions`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model name
    pub model: String,
    /// Conversation
    pub messages: Vec<ChatMessage>,
    /// Advertised tools
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatTool>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Server-sent events instead of one body
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// One chat message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant` or `tool`
    pub role: String,
    /// Text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Speaker name for multi-agent transcripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Calls requested by the assistant
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ChatToolCall>,
    /// Call answered by a `tool` message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Some servers send `"tool_calls": null`
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ChatToolCall>, D::Error> {
    Ok(Option::<Vec<ChatToolCall>>::deserialize(d)?.unwrap_or_default())
}

impl ChatMessage {
    /// Plain text message
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Tool output message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }
}

/// Advertised function tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTool {
    /// Always `function`
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Definition
    pub function: FunctionDefinition,
}

impl From<FunctionDefinition> for ChatTool {
    fn from(function: FunctionDefinition) -> Self {
        Self {
            kind: "function",
            function,
        }
    }
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCall {
    /// Call ID
    pub id: String,
    /// Call type
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    /// Function and raw arguments
    pub function: ChatFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// Function name and raw arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatFunctionCall {
    /// Function name
    pub name: String,
    /// Raw JSON arguments
    #[serde(default)]
    pub arguments: String,
}

/// Completion choice
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    /// Assistant message
    pub message: ChatMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response body of `POST /chat/completions`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    /// Choices
    pub choices: Vec<ChatChoice>,
}

/// One server-sent chunk of a streaming completion
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChunk {
    /// Chunk choices
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// Choice of a streaming chunk
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkChoice {
    /// Delta
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// Incremental content
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkDelta {
    /// Text fragment
    #[serde(default)]
    pub content: Option<String>,
}
