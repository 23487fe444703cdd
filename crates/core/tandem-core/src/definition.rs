/*!
# Pipeline Definition Files

JSON description of a pipeline, loaded by the CLI:

```json
{
  "name": "ticket-triage",
  "topology": "fan_out",
  "root": "triage-agent",
  "agents": [
    { "name": "triage-agent", "instructions": "Triage the ticket." },
    { "name": "priority_agent", "instructions": "Assess urgency.",
      "description": "Assess the priority of a ticket" }
  ]
}
```

Tools are tagged by `type`: `mcp`, `function` or `connected_agent`. A
connected agent refers by name to an entry of `agents` or `helpers`; helpers
are available as delegates without becoming pipeline stages.
*/

use crate::error::ConfigError;
use crate::function_calling::FunctionDefinition;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::types::{AgentSpec, McpServer, ToolBinding};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Topology named in a definition file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Stages in order
    #[default]
    Sequential,
    /// Root plus delegates
    FanOut,
}

/// Tool entry of an agent definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    /// MCP server
    Mcp(McpServer),
    /// Local function
    Function(FunctionDefinition),
    /// Another defined agent
    ConnectedAgent {
        /// Referenced agent name
        agent: String,
        /// Override of the delegate description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// One agent entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique name
    pub name: String,

    /// System instructions
    pub instructions: String,

    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Tool bindings
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

/// A whole pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name
    pub name: String,

    /// Topology
    #[serde(default)]
    pub topology: TopologyKind,

    /// Root agent (fan-out only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Participating agents, in stage order
    pub agents: Vec<AgentDefinition>,

    /// Agents only reachable as connected delegates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub helpers: Vec<AgentDefinition>,
}

impl PipelineDefinition {
    /// Load a definition from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded pipeline definition from {}", path.as_ref().display());
        Self::from_json(&content)
    }

    /// Parse a definition from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve references and build the pipeline
    pub fn into_pipeline(self) -> Result<Pipeline> {
        let mut resolver = Resolver::new(&self)?;

        let mut builder = PipelineBuilder::new(&self.name);
        match self.topology {
            TopologyKind::Sequential => {
                if let Some(root) = &self.root {
                    return Err(ConfigError::Invalid(format!(
                        "sequential pipeline '{}' cannot name a root ('{}')",
                        self.name, root
                    ))
                    .into());
                }
                for agent in &self.agents {
                    builder = builder.agent(resolver.resolve(&agent.name)?);
                }
            }
            TopologyKind::FanOut => {
                let root = self.root.as_deref().ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "fan-out pipeline '{}' needs a root",
                        self.name
                    ))
                })?;
                if !self.agents.iter().any(|a| a.name == root) {
                    return Err(ConfigError::UnknownAgent(root.to_string()).into());
                }
                builder = builder.root(resolver.resolve(root)?);
                for agent in self.agents.iter().filter(|a| a.name != root) {
                    builder = builder.agent(resolver.resolve(&agent.name)?);
                }
            }
        }
        builder.build()
    }
}

/// Builds specs depth-first so connected agents exist before their callers
struct Resolver<'a> {
    definitions: HashMap<&'a str, &'a AgentDefinition>,
    built: HashMap<String, Arc<AgentSpec>>,
    visiting: HashSet<String>,
}

impl<'a> Resolver<'a> {
    fn new(def: &'a PipelineDefinition) -> Result<Self> {
        let mut definitions = HashMap::new();
        for agent in def.agents.iter().chain(def.helpers.iter()) {
            if definitions.insert(agent.name.as_str(), agent).is_some() {
                return Err(ConfigError::DuplicateName(agent.name.clone()).into());
            }
        }
        Ok(Self {
            definitions,
            built: HashMap::new(),
            visiting: HashSet::new(),
        })
    }

    fn resolve(&mut self, name: &str) -> Result<Arc<AgentSpec>> {
        if let Some(spec) = self.built.get(name) {
            return Ok(spec.clone());
        }
        let def = *self
            .definitions
            .get(name)
            .ok_or_else(|| ConfigError::UnknownAgent(name.to_string()))?;
        if !self.visiting.insert(name.to_string()) {
            return Err(ConfigError::Invalid(format!(
                "connected agent cycle through '{}'",
                name
            ))
            .into());
        }

        let mut spec = AgentSpec::new(&def.name, &def.instructions);
        if let Some(description) = &def.description {
            spec = spec.with_description(description);
        }
        if let Some(model) = &def.model {
            spec = spec.with_model(model);
        }
        for tool in &def.tools {
            let binding = match tool {
                ToolDefinition::Mcp(server) => ToolBinding::Mcp(server.clone()),
                ToolDefinition::Function(function) => {
                    function
                        .validate()
                        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                    ToolBinding::Function(function.clone())
                }
                ToolDefinition::ConnectedAgent { agent, description } => {
                    let delegate = self.resolve(agent)?;
                    match ToolBinding::connected(delegate) {
                        ToolBinding::ConnectedAgent(mut connected) => {
                            if let Some(description) = description {
                                connected.description = description.clone();
                            }
                            ToolBinding::ConnectedAgent(connected)
                        }
                        other => other,
                    }
                }
            };
            spec = spec.with_tool(binding);
        }

        self.visiting.remove(name);
        let spec = Arc::new(spec);
        self.built.insert(name.to_string(), spec.clone());
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Topology;
    use crate::TandemError;

    #[test]
    fn test_sequential_definition() {
        let def = PipelineDefinition::from_json(
            r#"{
                "name": "feedback",
                "agents": [
                    {"name": "summarizer", "instructions": "Summarize"},
                    {"name": "classifier", "instructions": "Classify"},
                    {"name": "action", "instructions": "Suggest"}
                ]
            }"#,
        )
        .unwrap();

        let pipeline = def.into_pipeline().unwrap();
        assert_eq!(pipeline.topology(), &Topology::Sequential);
        assert_eq!(pipeline.registry().names(), vec!["summarizer", "classifier", "action"]);
    }

    #[test]
    fn test_tools_are_translated() {
        let def = PipelineDefinition::from_json(
            r#"{
                "name": "tools",
                "agents": [{
                    "name": "assistant",
                    "instructions": "Help",
                    "tools": [
                        {"type": "mcp", "server_label": "mslearn",
                         "server_url": "https://learn.microsoft.com/api/mcp"},
                        {"type": "function", "name": "fetch_weather",
                         "description": "Weather for a location",
                         "parameters": {"type": "object", "properties": {}}},
                        {"type": "connected_agent", "agent": "lookup"}
                    ]
                }],
                "helpers": [{"name": "lookup", "instructions": "Look things up"}]
            }"#,
        )
        .unwrap();

        let pipeline = def.into_pipeline().unwrap();
        assert_eq!(pipeline.len(), 1);
        let kinds: Vec<_> = pipeline.stages()[0].tools().iter().map(|t| t.kind()).collect();
        assert_eq!(kinds, vec!["mcp", "function", "connected_agent"]);
    }

    #[test]
    fn test_fan_out_needs_known_root() {
        let def = PipelineDefinition::from_json(
            r#"{"name": "t", "topology": "fan_out", "root": "missing",
                "agents": [{"name": "a", "instructions": "x"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            def.into_pipeline(),
            Err(TandemError::Config(ConfigError::UnknownAgent(_)))
        ));
    }

    #[test]
    fn test_connected_cycle_rejected() {
        let def = PipelineDefinition::from_json(
            r#"{"name": "loop", "agents": [
                {"name": "a", "instructions": "x", "tools": [{"type": "connected_agent", "agent": "b"}]},
                {"name": "b", "instructions": "y", "tools": [{"type": "connected_agent", "agent": "a"}]}
            ]}"#,
        )
        .unwrap();
        assert!(def.into_pipeline().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let def = PipelineDefinition::from_json(
            r#"{"name": "dup", "agents": [
                {"name": "a", "instructions": "x"},
                {"name": "a", "instructions": "y"}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            def.into_pipeline(),
            Err(TandemError::Config(ConfigError::DuplicateName(_)))
        ));
    }
}
