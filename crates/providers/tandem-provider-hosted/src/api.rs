//! Agents REST API client

use crate::config::HostedConfig;
use crate::error::HostedError;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Shared HTTP client for connection pooling to the agents service
static HTTP_CLIENT: OnceLock<Arc<Client>> = OnceLock::new();

fn get_http_client() -> Arc<Client> {
    HTTP_CLIENT
        .get_or_init(|| {
            Arc::new(
                Client::builder()
                    .pool_max_idle_per_host(16)
                    .pool_idle_timeout(Duration::from_secs(90))
                    .tcp_keepalive(Duration::from_secs(60))
                    .timeout(Duration::from_secs(120))
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

/// Error bodies are cut to this many characters
const MAX_ERROR_BODY: usize = 2048;

/// Operations of the hosted agents service used by the executor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentsApi: Send + Sync {
    /// Create an agent
    async fn create_agent(&self, request: &CreateAgentRequest) -> Result<AgentObject, HostedError>;

    /// Delete an agent
    async fn delete_agent(&self, agent_id: &str) -> Result<(), HostedError>;

    /// Create an empty thread
    async fn create_thread(&self) -> Result<ThreadObject, HostedError>;

    /// Delete a thread
    async fn delete_thread(&self, thread_id: &str) -> Result<(), HostedError>;

    /// Append a message to a thread
    async fn create_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> Result<ThreadMessage, HostedError>;

    /// Start a run
    async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> Result<RunObject, HostedError>;

    /// Fetch a run
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, HostedError>;

    /// Ask the service to stop a run
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, HostedError>;

    /// Submit function outputs for a `requires_action` run
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunObject, HostedError>;

    /// Submit MCP approvals for a `requires_action` run
    async fn submit_tool_approvals(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: &[ToolApproval],
    ) -> Result<RunObject, HostedError>;

    /// Thread messages, oldest first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, HostedError>;

    /// Steps of a run
    async fn list_run_steps(&self, thread_id: &str, run_id: &str)
        -> Result<Vec<RunStep>, HostedError>;
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    body
}

/// `AgentsApi` over HTTP
pub struct HttpAgentsApi {
    client: Arc<Client>,
    endpoint: String,
    api_token: String,
    api_version: String,
}

impl HttpAgentsApi {
    /// Create a client from configuration
    pub fn new(config: &HostedConfig) -> Self {
        Self {
            client: get_http_client(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            api_version: config.api_version.clone(),
        }
    }

    /// Service endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HostedError> {
        let response = request
            .bearer_auth(&self.api_token)
            .query(&[("api-version", self.api_version.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostedError::Http {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| HostedError::Decode(e.to_string()))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HostedError> {
        debug!("POST {}", path);
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HostedError> {
        debug!("GET {}", path);
        self.send(self.client.get(self.url(path))).await
    }

    async fn delete(&self, path: &str) -> Result<(), HostedError> {
        debug!("DELETE {}", path);
        self.send::<serde_json::Value>(self.client.delete(self.url(path)))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl AgentsApi for HttpAgentsApi {
    async fn create_agent(&self, request: &CreateAgentRequest) -> Result<AgentObject, HostedError> {
        self.post("assistants", request).await
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), HostedError> {
        self.delete(&format!("assistants/{}", agent_id)).await
    }

    async fn create_thread(&self) -> Result<ThreadObject, HostedError> {
        self.post("threads", &serde_json::json!({})).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), HostedError> {
        self.delete(&format!("threads/{}", thread_id)).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> Result<ThreadMessage, HostedError> {
        self.post(&format!("threads/{}/messages", thread_id), request)
            .await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> Result<RunObject, HostedError> {
        self.post(&format!("threads/{}/runs", thread_id), request)
            .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, HostedError> {
        self.get(&format!("threads/{}/runs/{}", thread_id, run_id))
            .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, HostedError> {
        self.post(
            &format!("threads/{}/runs/{}/cancel", thread_id, run_id),
            &serde_json::json!({}),
        )
        .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunObject, HostedError> {
        self.post(
            &format!("threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            &serde_json::json!({ "tool_outputs": outputs }),
        )
        .await
    }

    async fn submit_tool_approvals(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: &[ToolApproval],
    ) -> Result<RunObject, HostedError> {
        self.post(
            &format!("threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            &serde_json::json!({ "tool_approvals": approvals }),
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, HostedError> {
        let page: ListResponse<ThreadMessage> = self
            .get(&format!("threads/{}/messages?order=asc", thread_id))
            .await?;
        Ok(page.data)
    }

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Vec<RunStep>, HostedError> {
        let page: ListResponse<RunStep> = self
            .get(&format!("threads/{}/runs/{}/steps", thread_id, run_id))
            .await?;
        Ok(page.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("short".into()), "short");

        let long = format!("{}°C", "x".repeat(MAX_ERROR_BODY - 1));
        let cut = truncate_body(long);
        assert_eq!(cut.len(), MAX_ERROR_BODY - 1);
        assert!(cut.chars().all(|c| c == 'x'));
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let config = HostedConfig::new(
            "https://example.services.ai.azure.com/api/projects/demo/",
            "gpt-4o",
            "token",
        )
        .with_poll_interval(Duration::from_millis(10));
        let api = HttpAgentsApi::new(&config);
        assert_eq!(
            api.url("threads"),
            "https://example.services.ai.azure.com/api/projects/demo/threads"
        );
    }
}
