//! HTTP transport for chat completions

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::types::{ChatChunk, ChatRequest, ChatResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tandem_core::StreamHandler;
use tracing::debug;

/// Shared HTTP client for connection pooling
static HTTP_CLIENT: OnceLock<Arc<Client>> = OnceLock::new();

fn get_http_client() -> Arc<Client> {
    HTTP_CLIENT
        .get_or_init(|| {
            Arc::new(
                Client::builder()
                    .pool_max_idle_per_host(50)
                    .pool_idle_timeout(Duration::from_secs(300))
                    .tcp_keepalive(Duration::from_secs(60))
                    .timeout(Duration::from_secs(300))
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .unwrap_or_else(|e| {
                        panic!(
                            "Failed to create HTTP client: {}. This is a configuration error.",
                            e
                        )
                    }),
            )
        })
        .clone()
}

/// Sends completion requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One non-streaming completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError>;

    /// Streaming completion; text deltas go to `handler`, the full text is returned
    async fn complete_stream(
        &self,
        request: &ChatRequest,
        handler: &StreamHandler,
    ) -> Result<String, ChatError>;
}

/// Transport over `reqwest`
pub struct HttpChatTransport {
    client: Arc<Client>,
    url: String,
    api_key: String,
}

impl HttpChatTransport {
    /// Create a transport for the configured endpoint
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            client: get_http_client(),
            url: config.completions_url(),
            api_key: config.api_key.clone(),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, ChatError> {
        debug!(
            "POST {} (model {}, {} message(s), stream {})",
            self.url,
            request.model,
            request.messages.len(),
            request.stream
        );
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        self.send(request)
            .await?
            .json::<ChatResponse>()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        handler: &StreamHandler,
    ) -> Result<String, ChatError> {
        let mut response = self.send(request).await?;
        let mut assembler = StreamAssembler::default();

        while let Some(chunk) = response.chunk().await? {
            for delta in assembler.feed(&chunk) {
                if handler.send_delta(delta).await.is_err() {
                    debug!("Stream receiver dropped; stopping");
                    return assembler.finish();
                }
            }
            if assembler.is_done() {
                break;
            }
        }
        assembler.finish()
    }
}

/// Splits a server-sent event byte stream into `data:` payloads
///
/// Bytes are buffered until a full line arrives, so characters split across
/// network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk; returns the payloads of every complete line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(payload) = line.trim().strip_prefix("data:") {
                let payload = payload.trim();
                if !payload.is_empty() {
                    payloads.push(payload.to_string());
                }
            }
        }
        payloads
    }
}

/// Collects the text of one streamed completion
#[derive(Debug, Default)]
pub struct StreamAssembler {
    decoder: SseDecoder,
    text: String,
    done: bool,
}

impl StreamAssembler {
    /// Feed raw bytes; returns the new text deltas
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        if self.done {
            return deltas;
        }
        for payload in self.decoder.push(chunk) {
            if payload == "[DONE]" {
                self.done = true;
                break;
            }
            if let Some(delta) = delta_text(&payload) {
                self.text.push_str(&delta);
                deltas.push(delta);
            }
        }
        deltas
    }

    /// Whether the `[DONE]` marker arrived
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The full text; a stream cut off before `[DONE]` is an error
    pub fn finish(self) -> Result<String, ChatError> {
        if self.done {
            Ok(self.text)
        } else {
            Err(ChatError::Request(format!(
                "stream ended before [DONE] after {} character(s)",
                self.text.chars().count()
            )))
        }
    }
}

/// Text fragment of a streaming chunk, if any
pub fn delta_text(payload: &str) -> Option<String> {
    let chunk: ChatChunk = serde_json::from_str(payload).ok()?;
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();
    (!text.is_empty()).then_some(text)
}
