//! Chat adapter configuration

use tandem_core::{get_env_int, get_env_or, get_required_env, Result, TandemError};

/// Default base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Base URL, without `/chat/completions` (`CHAT_API_BASE_URL`)
    pub base_url: String,

    /// Bearer key (`CHAT_API_KEY`)
    pub api_key: String,

    /// Model used when the agent names none (`CHAT_MODEL`)
    pub model: String,

    /// Tool-call rounds allowed per invocation (`CHAT_MAX_TOOL_ROUNDS`)
    pub max_tool_rounds: usize,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl ChatConfig {
    /// Configuration for the default endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tool_rounds: 5,
            temperature: None,
        }
    }

    /// Read settings from the environment
    pub fn from_env() -> Result<Self> {
        let config = Self {
            base_url: get_env_or("CHAT_API_BASE_URL", DEFAULT_BASE_URL),
            api_key: get_required_env("CHAT_API_KEY")?,
            model: get_env_or("CHAT_MODEL", DEFAULT_MODEL),
            max_tool_rounds: get_env_int("CHAT_MAX_TOOL_ROUNDS", 5usize),
            temperature: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Use another endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use another default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Check the base URL
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(TandemError::config(format!(
                "CHAT_API_BASE_URL must start with http:// or https:// (got '{}')",
                self.base_url
            )));
        }
        if self.model.trim().is_empty() {
            return Err(TandemError::config("CHAT_MODEL cannot be empty"));
        }
        Ok(())
    }

    /// Completions URL
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        let config = ChatConfig::new("sk-test").with_base_url("http://localhost:8000/v1/");
        assert_eq!(config.completions_url(), "http://localhost:8000/v1/chat/completions");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ChatConfig::new("k").with_base_url("localhost:8000").validate().is_err());
    }
}
