//! Stub executors and observers for tests and demos
//!
//! None of these talk to a backend. Every stub records which agents it was
//! asked to run, in order.

use crate::error::{AdapterError, ObserverError};
use crate::executor::{AgentExecutor, InvokeOptions, Invocation};
use crate::observer::PipelineObserver;
use crate::streaming::{event_channel, EventStream, PartialEvent, StreamHandler};
use crate::types::{AgentSpec, Context, Message, PipelineResult, ToolCallRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Ordered record of invoked agent names
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    fn record(&self, name: &str) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(name.to_string());
    }

    /// Agent names in invocation order (retries included)
    pub fn names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of invocations
    pub fn len(&self) -> usize {
        self.names().len()
    }

    /// Check if nothing was invoked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replies with the last message's text followed by the agent's name
#[derive(Debug, Default)]
pub struct AppendNameExecutor {
    log: CallLog,
}

impl AppendNameExecutor {
    /// Create a new stub
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations
    pub fn calls(&self) -> usize {
        self.log.len()
    }

    /// Invoked agent names, in order
    pub fn invoked(&self) -> Vec<String> {
        self.log.names()
    }
}

#[async_trait]
impl AgentExecutor for AppendNameExecutor {
    fn name(&self) -> &str {
        "append-name"
    }

    async fn invoke(
        &self,
        spec: &AgentSpec,
        context: &Context,
        _opts: InvokeOptions,
    ) -> Result<Message, AdapterError> {
        self.log.record(spec.name());
        let input = context.last().map(|m| m.text.as_str()).unwrap_or_default();
        Ok(Message::assistant(
            spec.name(),
            format!("{}{}", input, spec.name()),
        ))
    }
}

/// Replies with `"<name>:<context char length>"`
#[derive(Debug, Default)]
pub struct ContextLengthExecutor {
    log: CallLog,
}

impl ContextLengthExecutor {
    /// Create a new stub
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations
    pub fn calls(&self) -> usize {
        self.log.len()
    }

    /// Invoked agent names, in order
    pub fn invoked(&self) -> Vec<String> {
        self.log.names()
    }
}

fn length_reply(spec: &AgentSpec, context: &Context) -> Message {
    Message::assistant(
        spec.name(),
        format!("{}:{}", spec.name(), context.char_len()),
    )
}

#[async_trait]
impl AgentExecutor for ContextLengthExecutor {
    fn name(&self) -> &str {
        "context-length"
    }

    async fn invoke(
        &self,
        spec: &AgentSpec,
        context: &Context,
        _opts: InvokeOptions,
    ) -> Result<Message, AdapterError> {
        self.log.record(spec.name());
        Ok(length_reply(spec, context))
    }
}

/// Sleeps before replying like [`ContextLengthExecutor`]
///
/// With `only_for`, agents other than the named one reply immediately.
#[derive(Debug)]
pub struct SlowExecutor {
    delay: Duration,
    target: Option<String>,
    log: CallLog,
}

impl SlowExecutor {
    /// Delay every invocation
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            target: None,
            log: CallLog::default(),
        }
    }

    /// Only delay the named agent
    pub fn only_for(mut self, agent_name: impl Into<String>) -> Self {
        self.target = Some(agent_name.into());
        self
    }

    /// Number of invocations, retries included
    pub fn calls(&self) -> usize {
        self.log.len()
    }

    /// Invoked agent names, in order
    pub fn invoked(&self) -> Vec<String> {
        self.log.names()
    }
}

#[async_trait]
impl AgentExecutor for SlowExecutor {
    fn name(&self) -> &str {
        "slow"
    }

    async fn invoke(
        &self,
        spec: &AgentSpec,
        context: &Context,
        _opts: InvokeOptions,
    ) -> Result<Message, AdapterError> {
        self.log.record(spec.name());
        let slow = self
            .target
            .as_deref()
            .map_or(true, |target| target == spec.name());
        if slow {
            tokio::time::sleep(self.delay).await;
        }
        Ok(length_reply(spec, context))
    }
}

/// Fails the named agent's first `failures` invocations
#[derive(Debug)]
pub struct FailingExecutor {
    agent_name: String,
    error: AdapterError,
    failures: usize,
    log: CallLog,
}

impl FailingExecutor {
    /// Fail every invocation of `agent_name` with `error`
    pub fn new(agent_name: impl Into<String>, error: AdapterError) -> Self {
        Self {
            agent_name: agent_name.into(),
            error,
            failures: usize::MAX,
            log: CallLog::default(),
        }
    }

    /// Only fail the first `failures` attempts, then recover
    pub fn times(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    /// Number of invocations, retries included
    pub fn calls(&self) -> usize {
        self.log.len()
    }

    /// Invoked agent names, in order
    pub fn invoked(&self) -> Vec<String> {
        self.log.names()
    }
}

#[async_trait]
impl AgentExecutor for FailingExecutor {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(
        &self,
        spec: &AgentSpec,
        context: &Context,
        _opts: InvokeOptions,
    ) -> Result<Message, AdapterError> {
        self.log.record(spec.name());
        if spec.name() == self.agent_name {
            let failed_so_far = self
                .log
                .names()
                .iter()
                .filter(|n| *n == &self.agent_name)
                .count();
            if failed_so_far <= self.failures {
                return Err(self.error.clone());
            }
        }
        Ok(length_reply(spec, context))
    }
}

/// A canned reply for [`ScriptedExecutor`]
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Final text
    pub text: String,
    /// Text deltas emitted before the final message when streaming
    pub deltas: Vec<String>,
    /// Tool calls reported alongside the reply
    pub tool_calls: Vec<ToolCallRecord>,
}

impl Script {
    /// Reply with `text`
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Stream these chunks first
    pub fn with_deltas<I, S>(mut self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deltas = deltas.into_iter().map(Into::into).collect();
        self
    }

    /// Report a tool call
    pub fn with_tool_call(mut self, record: ToolCallRecord) -> Self {
        self.tool_calls.push(record);
        self
    }
}

/// Replies from a per-agent script; unscripted agents echo their name
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    log: CallLog,
    seen_tools: Mutex<HashMap<String, Vec<String>>>,
}

impl ScriptedExecutor {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the named agent
    pub fn with_script(mut self, agent_name: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(agent_name.into(), script);
        self
    }

    /// Invoked agent names, in order
    pub fn invoked(&self) -> Vec<String> {
        self.log.names()
    }

    /// Tool binding kinds the named agent was last invoked with
    pub fn tools_seen_by(&self, agent_name: &str) -> Vec<String> {
        self.seen_tools
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(agent_name)
            .cloned()
            .unwrap_or_default()
    }

    fn script_for(&self, spec: &AgentSpec) -> Script {
        self.log.record(spec.name());
        let kinds = spec
            .tools()
            .iter()
            .map(|t| t.kind().to_string())
            .collect();
        self.seen_tools
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(spec.name().to_string(), kinds);

        self.scripts
            .get(spec.name())
            .cloned()
            .unwrap_or_else(|| Script::reply(spec.name()))
    }
}

#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        spec: &AgentSpec,
        _context: &Context,
        _opts: InvokeOptions,
    ) -> Result<Message, AdapterError> {
        let script = self.script_for(spec);
        Ok(Message::assistant(spec.name(), script.text))
    }

    async fn invoke_traced(
        &self,
        spec: &AgentSpec,
        _context: &Context,
        _opts: InvokeOptions,
    ) -> Result<Invocation, AdapterError> {
        let script = self.script_for(spec);
        Ok(Invocation {
            message: Message::assistant(spec.name(), script.text),
            tool_calls: script.tool_calls,
        })
    }

    async fn invoke_stream(
        &self,
        spec: &AgentSpec,
        _context: &Context,
        _opts: InvokeOptions,
    ) -> Result<EventStream, AdapterError> {
        let script = self.script_for(spec);
        let (tx, stream) = event_channel(script.deltas.len() + script.tool_calls.len() + 1);
        let handler = StreamHandler::new(tx);
        let author = spec.name().to_string();

        tokio::spawn(async move {
            for delta in script.deltas {
                if handler.send_delta(delta).await.is_err() {
                    return;
                }
            }
            for record in script.tool_calls {
                if handler.send_tool_call(record).await.is_err() {
                    return;
                }
            }
            let _ = handler.finish(Message::assistant(author, script.text)).await;
        });

        Ok(stream)
    }
}

/// Observer whose every callback fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingObserver {
    panic: bool,
}

impl FailingObserver {
    /// Return an error from every callback
    pub fn erroring() -> Self {
        Self { panic: false }
    }

    /// Panic in every callback
    pub fn panicking() -> Self {
        Self { panic: true }
    }

    fn fail(&self, hook: &str) -> Result<(), ObserverError> {
        if self.panic {
            panic!("observer panicked in {}", hook);
        }
        Err(ObserverError::new(format!("observer failed in {}", hook)))
    }
}

impl PipelineObserver for FailingObserver {
    fn on_stage_output(&self, _agent_name: &str, _message: &Message) -> Result<(), ObserverError> {
        self.fail("on_stage_output")
    }

    fn on_partial_event(
        &self,
        _agent_name: &str,
        _event: &PartialEvent,
    ) -> Result<(), ObserverError> {
        self.fail("on_partial_event")
    }

    fn on_delegate_call(
        &self,
        _agent_name: &str,
        _record: &ToolCallRecord,
    ) -> Result<(), ObserverError> {
        self.fail("on_delegate_call")
    }

    fn on_complete(&self, _result: &PipelineResult) -> Result<(), ObserverError> {
        self.fail("on_complete")
    }
}
