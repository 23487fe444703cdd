//! Chat adapter errors

use tandem_core::AdapterError;
use thiserror::Error;

/// Chat adapter error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Non-success HTTP status
    #[error("Chat API returned status {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Connection failure or client-side timeout
    #[error("Chat API request failed: {0}")]
    Request(String),

    /// Unexpected response shape
    #[error("Failed to decode chat response: {0}")]
    Decode(String),

    /// Tool binding this adapter cannot run
    #[error("Agent '{agent}' uses unsupported {kind} tool binding")]
    Unsupported {
        /// Agent name
        agent: String,
        /// Binding kind
        kind: String,
    },

    /// The model kept calling tools
    #[error("Model still requested tools after {0} round(s)")]
    ToolRounds(usize),
}

impl ChatError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::Http { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            ChatError::Request(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ChatError::Decode(e.to_string())
        } else {
            ChatError::Request(e.to_string())
        }
    }
}

impl From<ChatError> for AdapterError {
    fn from(e: ChatError) -> Self {
        if e.is_transient() {
            AdapterError::Transient(e.to_string())
        } else {
            AdapterError::Invocation(e.to_string())
        }
    }
}
