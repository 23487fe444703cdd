//! Errors raised while talking to the hosted agents service

use tandem_core::AdapterError;
use thiserror::Error;

/// Hosted adapter error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostedError {
    /// Non-success HTTP status
    #[error("Agents API returned status {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Connection failure or client-side timeout
    #[error("Agents API request failed: {0}")]
    Request(String),

    /// Response body did not match the expected shape
    #[error("Failed to decode Agents API response: {0}")]
    Decode(String),

    /// The run ended in a terminal non-success status
    #[error("Run {run_id} ended with status {status}: {message}")]
    RunFailed {
        /// Run ID
        run_id: String,
        /// Terminal status
        status: String,
        /// `last_error` reported by the service
        message: String,
    },

    /// The service behaved in a way the adapter cannot handle
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl HostedError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            HostedError::Http { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            HostedError::Request(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for HostedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            HostedError::Decode(e.to_string())
        } else {
            HostedError::Request(e.to_string())
        }
    }
}

impl From<HostedError> for AdapterError {
    fn from(e: HostedError) -> Self {
        if e.is_transient() {
            AdapterError::Transient(e.to_string())
        } else {
            AdapterError::Invocation(e.to_string())
        }
    }
}
