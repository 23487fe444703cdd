//! Chat-completions executor
//!
//! The agent's instructions become the system prompt and the context follows
//! as chat messages. Function bindings are advertised as tools and answered
//! from the local registry until the model replies with text.

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::transport::{ChatTransport, HttpChatTransport};
use crate::types::{ChatMessage, ChatRequest, ChatTool};
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::{
    event_channel, AdapterError, AgentExecutor, AgentSpec, Context, EventStream, FunctionCall,
    FunctionRegistry, InvokeOptions, Invocation, Message, Role, StreamHandler, ToolBinding,
    ToolCallRecord,
};
use tracing::{debug, info};

/// Executor for OpenAI-compatible chat endpoints
pub struct ChatExecutor {
    transport: Arc<dyn ChatTransport>,
    functions: FunctionRegistry,
    model: String,
    max_tool_rounds: usize,
    temperature: Option<f32>,
}

impl ChatExecutor {
    /// Create an executor over HTTP
    pub fn new(config: &ChatConfig) -> Self {
        Self::with_transport(Arc::new(HttpChatTransport::new(config)), config)
    }

    /// Create an executor over any transport
    pub fn with_transport(transport: Arc<dyn ChatTransport>, config: &ChatConfig) -> Self {
        Self {
            transport,
            functions: FunctionRegistry::new(),
            model: config.model.clone(),
            max_tool_rounds: config.max_tool_rounds,
            temperature: config.temperature,
        }
    }

    /// Functions answered locally
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    fn request(&self, spec: &AgentSpec, context: &Context) -> Result<ChatRequest, ChatError> {
        let mut tools = Vec::new();
        for binding in spec.tools() {
            match binding {
                ToolBinding::Function(function) => tools.push(ChatTool::from(function.clone())),
                other => {
                    return Err(ChatError::Unsupported {
                        agent: spec.name().to_string(),
                        kind: other.kind().to_string(),
                    })
                }
            }
        }

        Ok(ChatRequest {
            model: spec.model().unwrap_or(self.model.as_str()).to_string(),
            messages: build_messages(spec, context),
            tools,
            temperature: self.temperature,
            stream: false,
        })
    }

    async fn run_tool_loop(
        &self,
        spec: &AgentSpec,
        mut request: ChatRequest,
    ) -> Result<Invocation, ChatError> {
        let mut records = Vec::new();

        for round in 0..=self.max_tool_rounds {
            let response = self.transport.complete(&request).await?;
            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ChatError::Decode("response has no choices".to_string()))?;
            let reply = choice.message;

            if reply.tool_calls.is_empty() {
                return Ok(Invocation {
                    message: Message::assistant(spec.name(), reply.content.unwrap_or_default()),
                    tool_calls: records,
                });
            }
            if round == self.max_tool_rounds {
                break;
            }

            debug!(
                "{} requested {} tool call(s) in round {}",
                spec.name(),
                reply.tool_calls.len(),
                round + 1
            );
            let calls = reply.tool_calls.clone();
            request.messages.push(reply);

            for call in calls {
                let result = self
                    .functions
                    .execute(FunctionCall::from_raw(
                        &call.id,
                        &call.function.name,
                        &call.function.arguments,
                    ))
                    .await;
                let output = result.output_string();
                records.push(ToolCallRecord {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    name: Some(call.function.name.clone()),
                    arguments: Some(call.function.arguments.clone()),
                    output: Some(output.clone()),
                });
                request.messages.push(ChatMessage::tool(call.id, output));
            }
        }

        Err(ChatError::ToolRounds(self.max_tool_rounds))
    }
}

/// Chat names allow `[A-Za-z0-9_-]` only
fn chat_name(author: &str) -> String {
    author
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// System prompt followed by the context
pub fn build_messages(spec: &AgentSpec, context: &Context) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 1);
    messages.push(ChatMessage::text("system", spec.instructions()));
    for message in context {
        let mut chat = ChatMessage::text(message.role.as_str(), message.text.clone());
        if message.role == Role::Assistant {
            chat.name = message.author.as_deref().map(chat_name);
        }
        messages.push(chat);
    }
    messages
}

#[async_trait]
impl AgentExecutor for ChatExecutor {
    fn name(&self) -> &str {
        "chat"
    }

    async fn invoke(
        &self,
        spec: &AgentSpec,
        context: &Context,
        opts: InvokeOptions,
    ) -> Result<Message, AdapterError> {
        self.invoke_traced(spec, context, opts)
            .await
            .map(|invocation| invocation.message)
    }

    async fn invoke_traced(
        &self,
        spec: &AgentSpec,
        context: &Context,
        opts: InvokeOptions,
    ) -> Result<Invocation, AdapterError> {
        let request = self.request(spec, context)?;
        info!(
            "Invoking {} on {} (attempt {})",
            spec.name(),
            request.model,
            opts.attempt
        );
        Ok(self.run_tool_loop(spec, request).await?)
    }

    /// Streams text deltas; agents with function tools fall back to one final event
    async fn invoke_stream(
        &self,
        spec: &AgentSpec,
        context: &Context,
        opts: InvokeOptions,
    ) -> Result<EventStream, AdapterError> {
        let mut request = self.request(spec, context)?;
        if !request.tools.is_empty() {
            let message = self.invoke(spec, context, opts).await?;
            return Ok(EventStream::completed(message));
        }
        request.stream = true;

        let (tx, stream) = event_channel(64);
        let transport = self.transport.clone();
        let author = spec.name().to_string();

        tokio::spawn(async move {
            let handler = StreamHandler::new(tx);
            match transport.complete_stream(&request, &handler).await {
                Ok(text) => {
                    let _ = handler.finish(Message::assistant(author, text)).await;
                }
                Err(e) => {
                    let _ = handler.send_error(e.into()).await;
                }
            }
        });

        Ok(stream)
    }
}
