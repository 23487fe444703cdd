//! Agent registry
//!
//! Holds the agents of one pipeline in registration order. Populated while the
//! pipeline is built and read-only afterwards.

use crate::error::ConfigError;
use crate::types::AgentSpec;
use crate::{Result, TandemError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ordered set of uniquely named agents
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<AgentSpec>>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent
    ///
    /// Fails on a malformed or duplicate name; the registry is unchanged on error.
    pub fn register(
        &mut self,
        spec: impl Into<Arc<AgentSpec>>,
    ) -> std::result::Result<Arc<AgentSpec>, ConfigError> {
        let spec = spec.into();
        AgentSpec::validate_name(spec.name())?;

        if self.index.contains_key(spec.name()) {
            return Err(ConfigError::DuplicateName(spec.name().to_string()));
        }

        debug!(
            "Registering agent {} ({} tool binding(s))",
            spec.name(),
            spec.tools().len()
        );
        self.index.insert(spec.name().to_string(), self.agents.len());
        self.agents.push(spec.clone());
        Ok(spec)
    }

    /// Look up an agent by name
    pub fn get(&self, name: &str) -> Result<Arc<AgentSpec>> {
        self.index
            .get(name)
            .map(|&i| self.agents[i].clone())
            .ok_or_else(|| TandemError::not_found(name))
    }

    /// Check if a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Agents in registration order
    pub fn agents(&self) -> &[Arc<AgentSpec>] {
        &self.agents
    }

    /// Registered names in order
    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Number of agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = AgentRegistry::new();
        registry
            .register(AgentSpec::new("summarizer", "Summarize"))
            .unwrap();
        registry
            .register(AgentSpec::new("classifier", "Classify"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["summarizer", "classifier"]);
        assert_eq!(
            registry.get("classifier").unwrap().instructions(),
            "Classify"
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = AgentRegistry::new();
        registry.register(AgentSpec::new("action", "a")).unwrap();

        let err = registry
            .register(AgentSpec::new("action", "b"))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateName("action".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("action").unwrap().instructions(), "a");
    }

    #[test]
    fn test_missing_agent() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.get("ghost"),
            Err(TandemError::NotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut registry = AgentRegistry::new();
        assert!(matches!(
            registry.register(AgentSpec::new("bad name", "x")),
            Err(ConfigError::InvalidName { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shared_spec_is_not_copied() {
        let spec = Arc::new(AgentSpec::new("team_agent", "Pick a team"));
        let mut registry = AgentRegistry::new();
        let stored = registry.register(spec.clone()).unwrap();
        assert!(Arc::ptr_eq(&spec, &stored));
    }
}
