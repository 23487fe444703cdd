//! Hosted adapter configuration

use std::time::Duration;
use tandem_core::{get_env_int, get_env_or, get_required_env, Result, TandemError};

/// API version sent when `AGENTS_API_VERSION` is unset
pub const DEFAULT_API_VERSION: &str = "2025-05-01";

/// Hosted agents service settings
#[derive(Debug, Clone, PartialEq)]
pub struct HostedConfig {
    /// Project endpoint (`PROJECT_ENDPOINT`)
    pub endpoint: String,

    /// Default model deployment (`MODEL_DEPLOYMENT_NAME`)
    pub model: String,

    /// Bearer token (`AGENTS_API_TOKEN`)
    pub api_token: String,

    /// `api-version` query parameter (`AGENTS_API_VERSION`)
    pub api_version: String,

    /// Delay between run status polls (`AGENTS_POLL_INTERVAL_MS`)
    pub poll_interval: Duration,
}

impl HostedConfig {
    /// Create a configuration with default version and poll interval
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_token: api_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Read settings from the environment
    pub fn from_env() -> Result<Self> {
        let config = Self {
            endpoint: get_required_env("PROJECT_ENDPOINT")?,
            model: get_required_env("MODEL_DEPLOYMENT_NAME")?,
            api_token: get_required_env("AGENTS_API_TOKEN")?,
            api_version: get_env_or("AGENTS_API_VERSION", DEFAULT_API_VERSION),
            poll_interval: Duration::from_millis(get_env_int("AGENTS_POLL_INTERVAL_MS", 1000u64)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check endpoint and model
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(TandemError::config("PROJECT_ENDPOINT cannot be empty"));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(TandemError::config(format!(
                "PROJECT_ENDPOINT must start with http:// or https:// (got '{}')",
                endpoint
            )));
        }
        if self.model.trim().is_empty() {
            return Err(TandemError::config("MODEL_DEPLOYMENT_NAME cannot be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(TandemError::config("AGENTS_POLL_INTERVAL_MS must be positive"));
        }
        Ok(())
    }
}
