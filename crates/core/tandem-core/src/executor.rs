//! Executor adapter contract
//!
//! The seam between the pipeline coordinator and whatever actually runs an
//! agent: a hosted agent service, a chat-completions endpoint, or a test stub.

use crate::error::AdapterError;
use crate::streaming::EventStream;
use crate::types::{AgentSpec, Context, Message, ToolCallRecord};
use async_trait::async_trait;
use std::time::Duration;

/// Per-call information handed to the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Zero-based stage index
    pub stage_index: usize,

    /// One-based attempt number for this stage
    pub attempt: usize,

    /// Deadline the coordinator enforces for this call
    pub timeout: Duration,
}

impl InvokeOptions {
    /// Options for a first attempt
    pub fn new(stage_index: usize, timeout: Duration) -> Self {
        Self {
            stage_index,
            attempt: 1,
            timeout,
        }
    }
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self::new(0, Duration::from_secs(300))
    }
}

/// Message plus whatever tool calls the backend exposed
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Response message
    pub message: Message,

    /// Tool calls made while producing it (best-effort)
    pub tool_calls: Vec<ToolCallRecord>,
}

impl From<Message> for Invocation {
    fn from(message: Message) -> Self {
        Self {
            message,
            tool_calls: Vec::new(),
        }
    }
}

/// Runs one agent over a context
///
/// Implementations must be safe to retry (the coordinator re-invokes on
/// timeouts and transient failures) and must not rely on the invocation future
/// being polled to completion: timeouts and cancellation drop it.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Produce the agent's response to the context
    async fn invoke(
        &self,
        spec: &AgentSpec,
        context: &Context,
        opts: InvokeOptions,
    ) -> Result<Message, AdapterError>;

    /// Like `invoke`, also returning tool calls made along the way
    async fn invoke_traced(
        &self,
        spec: &AgentSpec,
        context: &Context,
        opts: InvokeOptions,
    ) -> Result<Invocation, AdapterError> {
        self.invoke(spec, context, opts).await.map(Invocation::from)
    }

    /// Streaming variant; the default yields one completed event
    async fn invoke_stream(
        &self,
        spec: &AgentSpec,
        context: &Context,
        opts: InvokeOptions,
    ) -> Result<EventStream, AdapterError> {
        let message = self.invoke(spec, context, opts).await?;
        Ok(EventStream::completed(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::PartialEvent;

    struct Echo;

    #[async_trait]
    impl AgentExecutor for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(
            &self,
            spec: &AgentSpec,
            context: &Context,
            _opts: InvokeOptions,
        ) -> Result<Message, AdapterError> {
            let text = context.last().map(|m| m.text.clone()).unwrap_or_default();
            Ok(Message::assistant(spec.name(), text))
        }
    }

    #[tokio::test]
    async fn test_default_traced_has_no_calls() {
        let spec = AgentSpec::new("echo_agent", "Repeat");
        let ctx = Context::from_task("hello");
        let invocation = Echo
            .invoke_traced(&spec, &ctx, InvokeOptions::default())
            .await
            .unwrap();

        assert_eq!(invocation.message.text, "hello");
        assert!(invocation.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_default_stream_yields_completed() {
        let spec = AgentSpec::new("echo_agent", "Repeat");
        let ctx = Context::from_task("hello");
        let mut stream = Echo
            .invoke_stream(&spec, &ctx, InvokeOptions::default())
            .await
            .unwrap();

        match stream.next().await {
            Some(Ok(PartialEvent::Completed(m))) => assert_eq!(m.text, "hello"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(stream.next().await.is_none());
    }
}
