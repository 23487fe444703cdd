//! Pipeline observers
//!
//! Observers see every stage output as soon as it is appended, partial events
//! when streaming, delegate calls in fan-out mode, and the final result. They
//! cannot affect the run: errors and panics raised inside a callback are
//! logged and dropped by the coordinator.

use crate::error::ObserverError;
use crate::streaming::PartialEvent;
use crate::types::{Message, PipelineResult, ToolCallRecord};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Receives pipeline progress
pub trait PipelineObserver: Send + Sync {
    /// A stage finished; called in stage order before the next stage starts
    fn on_stage_output(&self, _agent_name: &str, _message: &Message) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Streaming event from the running stage
    fn on_partial_event(
        &self,
        _agent_name: &str,
        _event: &PartialEvent,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Tool call surfaced by the executor (connected agents in fan-out mode)
    fn on_delegate_call(
        &self,
        _agent_name: &str,
        _record: &ToolCallRecord,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    /// The run completed; called exactly once, never after a failure or cancellation
    fn on_complete(&self, _result: &PipelineResult) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Run an observer callback, swallowing errors and panics
pub(crate) fn isolate<F>(hook: &str, f: F)
where
    F: FnOnce() -> Result<(), ObserverError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Observer {} failed: {}", hook, e),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("Observer {} panicked: {}", hook, reason);
        }
    }
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// One recorded observer callback
#[derive(Debug, Clone)]
pub enum ObservedEvent {
    /// `on_stage_output`
    StageOutput {
        /// Agent name
        agent_name: String,
        /// Output message
        message: Message,
    },
    /// `on_partial_event`
    Partial {
        /// Agent name
        agent_name: String,
        /// Event
        event: PartialEvent,
    },
    /// `on_delegate_call`
    DelegateCall {
        /// Calling agent
        agent_name: String,
        /// Call record
        record: ToolCallRecord,
    },
    /// `on_complete`
    Complete(Box<PipelineResult>),
}

/// Observer that records every callback in order
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl CollectingObserver {
    /// Create a new collector
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ObservedEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// `(agent_name, text)` of every stage output, in order received
    pub fn stage_outputs(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::StageOutput {
                    agent_name,
                    message,
                } => Some((agent_name, message.text)),
                _ => None,
            })
            .collect()
    }

    /// Delegate call records, in order received
    pub fn delegate_calls(&self) -> Vec<ToolCallRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::DelegateCall { record, .. } => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Number of `on_complete` calls
    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ObservedEvent::Complete(_)))
            .count()
    }
}

impl PipelineObserver for CollectingObserver {
    fn on_stage_output(&self, agent_name: &str, message: &Message) -> Result<(), ObserverError> {
        self.push(ObservedEvent::StageOutput {
            agent_name: agent_name.to_string(),
            message: message.clone(),
        });
        Ok(())
    }

    fn on_partial_event(&self, agent_name: &str, event: &PartialEvent) -> Result<(), ObserverError> {
        self.push(ObservedEvent::Partial {
            agent_name: agent_name.to_string(),
            event: event.clone(),
        });
        Ok(())
    }

    fn on_delegate_call(
        &self,
        agent_name: &str,
        record: &ToolCallRecord,
    ) -> Result<(), ObserverError> {
        self.push(ObservedEvent::DelegateCall {
            agent_name: agent_name.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    fn on_complete(&self, result: &PipelineResult) -> Result<(), ObserverError> {
        self.push(ObservedEvent::Complete(Box::new(result.clone())));
        Ok(())
    }
}

/// Prints `# <agent>` followed by the output text for every stage
#[derive(Debug, Clone, Default)]
pub struct TranscriptPrinter {
    show_tool_calls: bool,
}

impl TranscriptPrinter {
    /// Create a printer
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print delegate / tool calls
    pub fn with_tool_calls(mut self) -> Self {
        self.show_tool_calls = true;
        self
    }
}

impl PipelineObserver for TranscriptPrinter {
    fn on_stage_output(&self, agent_name: &str, message: &Message) -> Result<(), ObserverError> {
        println!("# {}\n{}", agent_name, message.text);
        Ok(())
    }

    fn on_delegate_call(
        &self,
        agent_name: &str,
        record: &ToolCallRecord,
    ) -> Result<(), ObserverError> {
        if self.show_tool_calls {
            println!(
                "  [{}] {} call {} -> {}",
                agent_name,
                record.kind,
                record.id,
                record.name.as_deref().unwrap_or("-")
            );
        }
        Ok(())
    }
}

/// Stage-output callback wrapped as an observer
pub struct FnObserver<F> {
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&str, &Message) + Send + Sync,
{
    /// Wrap a callback
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> PipelineObserver for FnObserver<F>
where
    F: Fn(&str, &Message) + Send + Sync,
{
    fn on_stage_output(&self, agent_name: &str, message: &Message) -> Result<(), ObserverError> {
        (self.callback)(agent_name, message);
        Ok(())
    }
}

/// Forwards every callback to several observers
///
/// Each member is isolated from the others: one failing member does not keep
/// the rest from being notified.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl ObserverSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn with(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl PipelineObserver for ObserverSet {
    fn on_stage_output(&self, agent_name: &str, message: &Message) -> Result<(), ObserverError> {
        for o in &self.observers {
            isolate("on_stage_output", || o.on_stage_output(agent_name, message));
        }
        Ok(())
    }

    fn on_partial_event(&self, agent_name: &str, event: &PartialEvent) -> Result<(), ObserverError> {
        for o in &self.observers {
            isolate("on_partial_event", || o.on_partial_event(agent_name, event));
        }
        Ok(())
    }

    fn on_delegate_call(
        &self,
        agent_name: &str,
        record: &ToolCallRecord,
    ) -> Result<(), ObserverError> {
        for o in &self.observers {
            isolate("on_delegate_call", || o.on_delegate_call(agent_name, record));
        }
        Ok(())
    }

    fn on_complete(&self, result: &PipelineResult) -> Result<(), ObserverError> {
        for o in &self.observers {
            isolate("on_complete", || o.on_complete(result));
        }
        Ok(())
    }
}
