//! Error types for Tandem core

use crate::types::Message;
use std::time::Duration;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum TandemError {
    /// Malformed agent set, rejected before any invocation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Lookup of an unregistered agent
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// A stage failed and the pipeline was aborted
    #[error("{0}")]
    StageFailed(Box<StageFailure>),

    /// The run was cancelled on a stage boundary
    #[error("Pipeline cancelled after {} completed stage(s)", completed.len())]
    Cancelled {
        /// Outputs appended before cancellation took effect
        completed: Vec<Message>,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type using TandemError
pub type Result<T> = std::result::Result<T, TandemError>;

impl TandemError {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        TandemError::NotFound(msg.into())
    }

    /// Create a generic configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TandemError::Config(ConfigError::Invalid(msg.into()))
    }

    /// Whether this error was raised before any executor call
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, TandemError::Config(_))
    }

    /// Failure details when a stage aborted the run
    pub fn stage_failure(&self) -> Option<&StageFailure> {
        match self {
            TandemError::StageFailed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Outputs collected before the run stopped, for diagnostics
    pub fn partial_outputs(&self) -> &[Message] {
        match self {
            TandemError::StageFailed(failure) => &failure.partial_outputs,
            TandemError::Cancelled { completed } => completed,
            _ => &[],
        }
    }
}

/// Malformed pipeline definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two agents share a name within one pipeline
    #[error("duplicate agent name '{0}'")]
    DuplicateName(String),

    /// Sequential pipeline without stages
    #[error("pipeline has no agents")]
    EmptyPipeline,

    /// Name rejected by the naming rule
    #[error("invalid agent name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Definition refers to an agent that was never declared
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    /// Any other malformed setting
    #[error("{0}")]
    Invalid(String),
}

/// Failures reported by an executor adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The invocation exceeded its deadline
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend reported a failure (e.g. a run ended in status "failed")
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// A failure the backend marks as worth retrying (throttling, 5xx, connection reset)
    #[error("transient failure: {0}")]
    Transient(String),

    /// The adapter observed cancellation
    #[error("invocation cancelled")]
    Cancelled,
}

impl AdapterError {
    /// Create an invocation error
    pub fn invocation(msg: impl Into<String>) -> Self {
        AdapterError::Invocation(msg.into())
    }

    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        AdapterError::Transient(msg.into())
    }

    /// Timeouts and transient failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Timeout(_) | AdapterError::Transient(_))
    }
}

/// Where and why a pipeline stage failed
#[derive(Debug, Clone, Error)]
#[error("Stage {index} ('{agent_name}') failed after {attempts} attempt(s): {error}")]
pub struct StageFailure {
    /// Zero-based stage index
    pub index: usize,
    /// Name of the failing agent
    pub agent_name: String,
    /// Number of invocations made for this stage
    pub attempts: usize,
    /// Last adapter error
    pub error: AdapterError,
    /// Outputs of the stages strictly before the failing one
    pub partial_outputs: Vec<Message>,
}

impl StageFailure {
    /// Whether the stage gave up because every attempt timed out
    pub fn timed_out(&self) -> bool {
        matches!(self.error, AdapterError::Timeout(_))
    }
}

/// Error reported by an observer callback
///
/// The coordinator logs these and carries on.
#[derive(Debug, Clone, Error)]
#[error("Observer error: {0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    /// Create an observer error
    pub fn new(msg: impl Into<String>) -> Self {
        ObserverError(msg.into())
    }
}
