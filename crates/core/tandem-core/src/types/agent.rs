//! Agent definitions and tool bindings

use crate::error::ConfigError;
use crate::function_calling::FunctionDefinition;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn name_pattern() -> &'static Regex {
    NAME_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.\-]{1,64}$").unwrap_or_else(|e| {
            panic!("agent name pattern failed to compile: {}", e)
        })
    })
}

/// Static definition of one participating agent
///
/// Built with the consuming `with_*` methods and then shared as
/// `Arc<AgentSpec>`; there is no way to mutate a spec once it is wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    name: String,
    instructions: String,
    description: Option<String>,
    model: Option<String>,
    tools: Vec<ToolBinding>,
}

impl AgentSpec {
    /// Create a new agent spec
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            description: None,
            model: None,
            tools: Vec::new(),
        }
    }

    /// Set a short description (used when the agent is exposed as a connected tool)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the backend's default model / deployment
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach a tool binding
    pub fn with_tool(mut self, tool: ToolBinding) -> Self {
        self.tools.push(tool);
        self
    }

    /// Attach several tool bindings
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolBinding>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Agent name, unique within a pipeline
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role / system instructions
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Optional description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Optional model override
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Tool bindings, forwarded untouched to the executor
    pub fn tools(&self) -> &[ToolBinding] {
        &self.tools
    }

    /// Check a name against the naming rule shared by every backend
    pub fn validate_name(name: &str) -> std::result::Result<(), ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::InvalidName {
                name: name.to_string(),
                reason: "name cannot be empty".to_string(),
            });
        }
        if !name_pattern().is_match(name) {
            return Err(ConfigError::InvalidName {
                name: name.to_string(),
                reason: "use at most 64 letters, digits, '_', '-' or '.'".to_string(),
            });
        }
        Ok(())
    }
}

/// Capability descriptor handed to the executor
///
/// The coordinator never looks inside a binding; only adapters interpret them.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolBinding {
    /// Remote MCP server
    Mcp(McpServer),
    /// Locally executed function
    Function(FunctionDefinition),
    /// Another agent callable as a delegate
    ConnectedAgent(ConnectedAgent),
}

impl ToolBinding {
    /// Expose an agent as a callable delegate
    pub fn connected(spec: Arc<AgentSpec>) -> Self {
        let description = spec
            .description()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Delegate to the {} agent", spec.name()));
        ToolBinding::ConnectedAgent(ConnectedAgent { spec, description })
    }

    /// Short kind label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ToolBinding::Mcp(_) => "mcp",
            ToolBinding::Function(_) => "function",
            ToolBinding::ConnectedAgent(_) => "connected_agent",
        }
    }
}

/// MCP server binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServer {
    /// Label the model sees
    pub server_label: String,

    /// Server URL
    pub server_url: String,

    /// Whether tool calls need approval
    #[serde(default)]
    pub approval_mode: ApprovalMode,

    /// Restrict to these tool names (empty = all)
    #[serde(default)]
    pub allowed_tools: Vec<String>,

    /// Extra headers sent to the server
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl McpServer {
    /// Create an MCP binding that never asks for approval
    pub fn new(server_label: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            server_label: server_label.into(),
            server_url: server_url.into(),
            approval_mode: ApprovalMode::Never,
            allowed_tools: Vec::new(),
            headers: HashMap::new(),
        }
    }

    /// Set the approval mode
    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }
}

/// MCP approval policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Calls run without approval
    #[default]
    Never,
    /// Every call needs approval
    Always,
}

impl ApprovalMode {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Never => "never",
            ApprovalMode::Always => "always",
        }
    }
}

/// Agent exposed to another agent as a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedAgent {
    /// Delegate definition
    pub spec: Arc<AgentSpec>,
    /// What the delegate is for
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = AgentSpec::new("priority_agent", "Assess urgency")
            .with_description("Assess the priority of a ticket")
            .with_model("gpt-4o");

        assert_eq!(spec.name(), "priority_agent");
        assert_eq!(spec.model(), Some("gpt-4o"));
        assert!(spec.tools().is_empty());
    }

    #[test]
    fn test_validate_name() {
        assert!(AgentSpec::validate_name("triage-agent").is_ok());
        assert!(AgentSpec::validate_name("SummarizerAgent").is_ok());
        assert!(AgentSpec::validate_name("").is_err());
        assert!(AgentSpec::validate_name("has space").is_err());
        assert!(AgentSpec::validate_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_connected_binding_description() {
        let team = Arc::new(AgentSpec::new("team_agent", "Pick a team"));
        match ToolBinding::connected(team) {
            ToolBinding::ConnectedAgent(c) => {
                assert_eq!(c.description, "Delegate to the team_agent agent");
            }
            other => panic!("unexpected binding {:?}", other),
        }

        let effort = Arc::new(
            AgentSpec::new("effort_agent", "Estimate")
                .with_description("Determines the effort required"),
        );
        let binding = ToolBinding::connected(effort);
        assert_eq!(binding.kind(), "connected_agent");
    }

    #[test]
    fn test_mcp_defaults() {
        let mcp: McpServer = serde_json::from_value(serde_json::json!({
            "server_label": "mslearn",
            "server_url": "https://learn.microsoft.com/api/mcp"
        }))
        .unwrap();
        assert_eq!(mcp.approval_mode, ApprovalMode::Never);
        assert!(mcp.allowed_tools.is_empty());
    }
}
