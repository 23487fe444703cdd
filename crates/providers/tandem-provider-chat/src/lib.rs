//! Chat-Completions Provider
//!
//! [`AgentExecutor`](tandem_core::AgentExecutor) for any endpoint speaking the
//! OpenAI chat-completions protocol (OpenAI, Azure OpenAI, vLLM, Ollama's
//! compatibility layer). Supports function tools and streaming; MCP and
//! connected-agent bindings need the hosted provider.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod executor;
pub mod transport;
pub mod types;

pub use config::{ChatConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::ChatError;
pub use executor::{build_messages, ChatExecutor};
pub use transport::{ChatTransport, HttpChatTransport, SseDecoder, StreamAssembler};
