//! Streaming invocation support
//!
//! An [`EventStream`] is a lazy, finite, non-restartable sequence of
//! [`PartialEvent`]s terminated by a [`PartialEvent::Completed`] message.

use crate::error::AdapterError;
use crate::types::{Message, ToolCallRecord};
use tokio::sync::mpsc;

/// Event produced while an invocation is running
#[derive(Debug, Clone, PartialEq)]
pub enum PartialEvent {
    /// Incremental text
    TextDelta {
        /// Chunk text
        text: String,
    },
    /// A tool call finished inside the invocation
    ToolCall(ToolCallRecord),
    /// Final message; nothing follows it
    Completed(Message),
}

/// Stream sender
pub type EventSender = mpsc::Sender<Result<PartialEvent, AdapterError>>;

/// Create a new event stream
pub fn event_channel(buffer_size: usize) -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (tx, EventStream { rx, finished: false })
}

/// Receiving half of a streaming invocation
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Result<PartialEvent, AdapterError>>,
    finished: bool,
}

impl EventStream {
    /// Stream that yields a single completed message
    pub fn completed(message: Message) -> Self {
        let (tx, stream) = event_channel(1);
        // Fresh channel with capacity 1 always has room
        let _ = tx.try_send(Ok(PartialEvent::Completed(message)));
        stream
    }

    /// Next event, or `None` once the final message was yielded or the sender closed
    pub async fn next(&mut self) -> Option<Result<PartialEvent, AdapterError>> {
        if self.finished {
            return None;
        }
        let item = self.rx.recv().await;
        match &item {
            Some(Ok(PartialEvent::Completed(_))) | Some(Err(_)) | None => {
                self.finished = true;
                self.rx.close();
            }
            _ => {}
        }
        item
    }

    /// Drain the stream, handing every intermediate event to `on_event`
    pub async fn for_each_until_complete<F>(mut self, mut on_event: F) -> Result<Message, AdapterError>
    where
        F: FnMut(&PartialEvent),
    {
        while let Some(item) = self.next().await {
            match item? {
                PartialEvent::Completed(message) => return Ok(message),
                event => on_event(&event),
            }
        }
        Err(AdapterError::invocation(
            "stream ended without a final message",
        ))
    }

    /// Drain the stream and return the final message
    pub async fn collect_message(self) -> Result<Message, AdapterError> {
        self.for_each_until_complete(|_| {}).await
    }
}

/// Convenience wrapper adapters use to produce a stream
pub struct StreamHandler {
    sender: EventSender,
}

impl StreamHandler {
    /// Create a new stream handler
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }

    /// Send a text delta
    pub async fn send_delta(&self, text: impl Into<String>) -> Result<(), AdapterError> {
        self.send(Ok(PartialEvent::TextDelta { text: text.into() }))
            .await
    }

    /// Send a tool call record
    pub async fn send_tool_call(&self, record: ToolCallRecord) -> Result<(), AdapterError> {
        self.send(Ok(PartialEvent::ToolCall(record))).await
    }

    /// Send an error; the stream ends after it
    pub async fn send_error(&self, error: AdapterError) -> Result<(), AdapterError> {
        self.send(Err(error)).await
    }

    /// Send the final message and close the stream
    pub async fn finish(self, message: Message) -> Result<(), AdapterError> {
        self.send(Ok(PartialEvent::Completed(message))).await
    }

    async fn send(&self, item: Result<PartialEvent, AdapterError>) -> Result<(), AdapterError> {
        self.sender
            .send(item)
            .await
            .map_err(|_| AdapterError::Cancelled)
    }
}
