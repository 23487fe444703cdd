/*!
# Pipelines

A pipeline is a uniquely named set of agents plus a topology:

- **Sequential**: agents run in registration order, each one seeing every
  earlier output.
- **Fan-out**: a root agent receives every other agent as a connected
  delegate and runs once; the backend schedules the delegates.
*/

use crate::error::ConfigError;
use crate::registry::AgentRegistry;
use crate::types::{AgentSpec, ToolBinding};
use crate::{Result, TandemError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Pipeline topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Topology {
    /// Chain of agents in order
    Sequential,
    /// Root agent delegating to the others
    FanOut {
        /// Root agent name
        root: String,
    },
}

/// A runnable set of agents
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline ID
    pub id: Uuid,

    /// Pipeline name
    name: String,

    /// Topology
    topology: Topology,

    /// Participating agents
    registry: AgentRegistry,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Pipeline {
    fn with_registry(name: impl Into<String>, topology: Topology, registry: AgentRegistry) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            topology,
            registry,
            created_at: Utc::now(),
        }
    }

    /// Start building a pipeline
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Sequential pipeline over `agents`, in order
    ///
    /// An empty list is accepted here and rejected when the pipeline is run.
    pub fn sequential<I, S>(name: impl Into<String>, agents: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<AgentSpec>>,
    {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(agent)?;
        }
        Ok(Self::with_registry(name, Topology::Sequential, registry))
    }

    /// Fan-out pipeline: `root` delegates to `siblings`
    pub fn fan_out<I, S>(
        name: impl Into<String>,
        root: impl Into<Arc<AgentSpec>>,
        siblings: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<AgentSpec>>,
    {
        let mut registry = AgentRegistry::new();
        let root = registry.register(root)?;
        for sibling in siblings {
            registry.register(sibling)?;
        }
        Ok(Self::with_registry(
            name,
            Topology::FanOut {
                root: root.name().to_string(),
            },
            registry,
        ))
    }

    /// Pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topology
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Participating agents
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Number of agents
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Fail fast on a pipeline that cannot run
    pub fn validate(&self) -> Result<()> {
        if self.registry.is_empty() {
            return Err(ConfigError::EmptyPipeline.into());
        }
        if let Topology::FanOut { root } = &self.topology {
            if !self.registry.contains(root) {
                return Err(ConfigError::UnknownAgent(root.clone()).into());
            }
        }
        Ok(())
    }

    /// Agents in stage order (sequential topology)
    pub fn stages(&self) -> &[Arc<AgentSpec>] {
        self.registry.agents()
    }

    /// Root agent and its delegates (fan-out topology)
    pub fn fan_out_parts(&self) -> Result<(Arc<AgentSpec>, Vec<Arc<AgentSpec>>)> {
        let root_name = match &self.topology {
            Topology::FanOut { root } => root,
            Topology::Sequential => {
                return Err(TandemError::config(format!(
                    "pipeline '{}' is sequential",
                    self.name
                )))
            }
        };
        let root = self.registry.get(root_name)?;
        let siblings = self
            .registry
            .agents()
            .iter()
            .filter(|a| a.name() != root_name)
            .cloned()
            .collect();
        Ok((root, siblings))
    }

    /// The root spec with one connected-agent binding per delegate appended
    ///
    /// Delegates the root already binds by name are not bound again.
    pub fn root_with_delegates(&self) -> Result<AgentSpec> {
        let (root, siblings) = self.fan_out_parts()?;
        let bound: Vec<&str> = root
            .tools()
            .iter()
            .filter_map(|t| match t {
                ToolBinding::ConnectedAgent(c) => Some(c.spec.name()),
                _ => None,
            })
            .collect();
        let missing: Vec<_> = siblings
            .into_iter()
            .filter(|s| !bound.contains(&s.name()))
            .collect();
        Ok(root
            .as_ref()
            .clone()
            .with_tools(missing.into_iter().map(ToolBinding::connected)))
    }
}

/// Incremental pipeline construction
///
/// Registration errors are remembered and reported by `build`.
#[derive(Debug)]
pub struct PipelineBuilder {
    name: String,
    root: Option<String>,
    registry: AgentRegistry,
    error: Option<ConfigError>,
}

impl PipelineBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            registry: AgentRegistry::new(),
            error: None,
        }
    }

    fn register(&mut self, spec: impl Into<Arc<AgentSpec>>) -> Option<Arc<AgentSpec>> {
        if self.error.is_some() {
            return None;
        }
        match self.registry.register(spec) {
            Ok(spec) => Some(spec),
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }

    /// Add an agent (a stage, or a delegate once a root is set)
    pub fn agent(mut self, spec: impl Into<Arc<AgentSpec>>) -> Self {
        self.register(spec);
        self
    }

    /// Add the fan-out root agent
    pub fn root(mut self, spec: impl Into<Arc<AgentSpec>>) -> Self {
        if self.root.is_some() && self.error.is_none() {
            self.error = Some(ConfigError::Invalid(
                "a fan-out pipeline has exactly one root".to_string(),
            ));
            return self;
        }
        if let Some(spec) = self.register(spec) {
            self.root = Some(spec.name().to_string());
        }
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        if self.registry.is_empty() {
            return Err(ConfigError::EmptyPipeline.into());
        }
        let topology = match self.root {
            Some(root) => Topology::FanOut { root },
            None => Topology::Sequential,
        };
        Ok(Pipeline::with_registry(self.name, topology, self.registry))
    }
}
