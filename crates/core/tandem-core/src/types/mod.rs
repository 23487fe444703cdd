//! Core data model

pub mod agent;
pub mod message;
pub mod result;

pub use agent::{AgentSpec, ApprovalMode, ConnectedAgent, McpServer, ToolBinding};
pub use message::{Context, Message, Role};
pub use result::{PipelineResult, StageRecord, ToolCallRecord};
