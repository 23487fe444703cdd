/*!
# Hosted Executor

Runs one agent invocation against the hosted agents service:

1. create connected delegate agents (depth first), then the agent itself
2. create a thread and post the context
3. create a run and poll it, answering `requires_action` with local function
   outputs or MCP approvals
4. read the last assistant message and the run-step tool calls

Everything created on the way is held in a [`ResourceScope`] and deleted
when the invocation ends, however it ends.
*/

use crate::api::{AgentsApi, HttpAgentsApi};
use crate::config::HostedConfig;
use crate::error::HostedError;
use crate::scope::{Resource, ResourceScope};
use crate::types::*;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{
    AdapterError, AgentExecutor, AgentSpec, ApprovalMode, Context, FunctionCall,
    FunctionRegistry, InvokeOptions, Invocation, Logger, Message, Role, ToolBinding,
    ToolCallRecord,
};
use tracing::{debug, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executor backed by the hosted agents service
pub struct HostedExecutor {
    api: Arc<dyn AgentsApi>,
    functions: FunctionRegistry,
    default_model: String,
    poll_interval: Duration,
}

impl HostedExecutor {
    /// Create an executor talking HTTP to the configured service
    pub fn new(config: &HostedConfig) -> Self {
        Self::with_api(Arc::new(HttpAgentsApi::new(config)), config)
    }

    /// Create an executor over any `AgentsApi`
    pub fn with_api(api: Arc<dyn AgentsApi>, config: &HostedConfig) -> Self {
        Self {
            api,
            functions: FunctionRegistry::new(),
            default_model: config.model.clone(),
            poll_interval: config.poll_interval,
        }
    }

    /// Functions answered locally when a run asks for tool outputs
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Registered local functions
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    async fn run_in_scope(
        &self,
        scope: &mut ResourceScope,
        spec: &AgentSpec,
        context: &Context,
    ) -> Result<Invocation, HostedError> {
        let log = Logger::new(spec.name());

        let system_notes: Vec<&str> = context
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text.as_str())
            .collect();
        let agent_id = self.create_agent(scope, spec, &system_notes).await?;
        log.debug(&format!("Created agent {}", agent_id));

        let thread = self.api.create_thread().await?;
        scope.track(Resource::Thread(thread.id.clone()));

        for message in context.iter().filter(|m| m.role != Role::System) {
            let request = CreateMessageRequest {
                role: message.role.as_str().to_string(),
                content: message.text.clone(),
            };
            self.api.create_message(&thread.id, &request).await?;
        }

        let resources = tool_resources(spec);
        let run = self
            .api
            .create_run(
                &thread.id,
                &CreateRunRequest {
                    assistant_id: agent_id,
                    tool_resources: (!resources.is_empty()).then_some(resources),
                },
            )
            .await?;
        scope.track(Resource::Run {
            thread_id: thread.id.clone(),
            run_id: run.id.clone(),
        });
        log.info(&format!("Started run {}", run.id));

        let run = self.poll_run(spec, &thread.id, run).await?;
        scope.run_finished(&run.id);

        if run.status != RunStatus::Completed {
            return Err(HostedError::RunFailed {
                run_id: run.id.clone(),
                status: run.status.as_str().to_string(),
                message: run.failure_message(),
            });
        }

        let messages = self.api.list_messages(&thread.id).await?;
        let text = messages
            .iter()
            .rev()
            .filter(|m| m.role == "assistant")
            .find_map(|m| m.last_text())
            .ok_or_else(|| {
                HostedError::Protocol(format!("run {} completed without an assistant reply", run.id))
            })?
            .to_string();

        let tool_calls = match self.api.list_run_steps(&thread.id, &run.id).await {
            Ok(steps) => steps.iter().flat_map(RunStep::tool_call_records).collect(),
            Err(e) => {
                warn!("Could not list steps of run {}: {}", run.id, e);
                Vec::new()
            }
        };
        log.info(&format!(
            "Run {} completed ({} tool call(s))",
            run.id,
            tool_calls.len()
        ));

        Ok(Invocation {
            message: Message::assistant(spec.name(), text),
            tool_calls,
        })
    }

    /// Create `spec` and, first, every connected delegate it references
    fn create_agent<'a>(
        &'a self,
        scope: &'a mut ResourceScope,
        spec: &'a AgentSpec,
        system_notes: &'a [&'a str],
    ) -> BoxFuture<'a, Result<String, HostedError>> {
        Box::pin(async move {
            let mut tools = Vec::with_capacity(spec.tools().len());
            for binding in spec.tools() {
                let tool = match binding {
                    ToolBinding::Function(function) => ToolSpec::Function {
                        function: function.clone(),
                    },
                    ToolBinding::Mcp(server) => ToolSpec::Mcp {
                        server_label: server.server_label.clone(),
                        server_url: server.server_url.clone(),
                        allowed_tools: server.allowed_tools.clone(),
                    },
                    ToolBinding::ConnectedAgent(connected) => {
                        let id = self.create_agent(scope, &connected.spec, &[]).await?;
                        ToolSpec::ConnectedAgent {
                            connected_agent: ConnectedAgentSpec {
                                id,
                                name: connected.spec.name().to_string(),
                                description: connected.description.clone(),
                            },
                        }
                    }
                };
                tools.push(tool);
            }

            let mut instructions = spec.instructions().to_string();
            for note in system_notes {
                instructions.push_str("\n\n");
                instructions.push_str(note);
            }

            let request = CreateAgentRequest {
                model: spec.model().unwrap_or(&self.default_model).to_string(),
                name: spec.name().to_string(),
                instructions,
                description: spec.description().map(str::to_string),
                tools,
            };
            let agent = self.api.create_agent(&request).await?;
            scope.track(Resource::Agent(agent.id.clone()));
            debug!("Agent {} created as {}", spec.name(), agent.id);
            Ok(agent.id)
        })
    }

    async fn poll_run(
        &self,
        spec: &AgentSpec,
        thread_id: &str,
        mut run: RunObject,
    ) -> Result<RunObject, HostedError> {
        while run.status.is_pending() {
            if run.status == RunStatus::RequiresAction {
                if let Some(action) = run.required_action.take() {
                    run = self.handle_action(spec, thread_id, &run.id, action).await?;
                    continue;
                }
            }
            tokio::time::sleep(self.poll_interval).await;
            run = self.api.get_run(thread_id, &run.id).await?;
            debug!("Run {} status: {}", run.id, run.status.as_str());
        }
        Ok(run)
    }

    async fn handle_action(
        &self,
        spec: &AgentSpec,
        thread_id: &str,
        run_id: &str,
        action: RequiredAction,
    ) -> Result<RunObject, HostedError> {
        match action {
            RequiredAction::SubmitToolOutputs {
                submit_tool_outputs,
            } => {
                let mut outputs = Vec::with_capacity(submit_tool_outputs.tool_calls.len());
                for call in submit_tool_outputs.tool_calls {
                    let Some(function) = call.function else {
                        warn!("Tool call {} of type {} has no function", call.id, call.kind);
                        outputs.push(ToolOutput {
                            tool_call_id: call.id,
                            output: serde_json::json!({ "error": "not a function call" })
                                .to_string(),
                        });
                        continue;
                    };
                    let result = self
                        .functions
                        .execute(FunctionCall::from_raw(
                            call.id,
                            function.name,
                            &function.arguments,
                        ))
                        .await;
                    outputs.push(ToolOutput {
                        output: result.output_string(),
                        tool_call_id: result.call_id,
                    });
                }
                debug!("Submitting {} tool output(s) for run {}", outputs.len(), run_id);
                self.api
                    .submit_tool_outputs(thread_id, run_id, &outputs)
                    .await
            }
            RequiredAction::SubmitToolApproval {
                submit_tool_approval,
            } => {
                let approvals: Vec<ToolApproval> = submit_tool_approval
                    .tool_calls
                    .into_iter()
                    .map(|call| approval_for(spec, call))
                    .collect();
                debug!("Submitting {} approval(s) for run {}", approvals.len(), run_id);
                self.api
                    .submit_tool_approvals(thread_id, run_id, &approvals)
                    .await
            }
        }
    }
}

/// MCP settings for the run
fn tool_resources(spec: &AgentSpec) -> ToolResources {
    let mcp = spec
        .tools()
        .iter()
        .filter_map(|binding| match binding {
            ToolBinding::Mcp(server) => Some(McpToolResource {
                server_label: server.server_label.clone(),
                require_approval: server.approval_mode.as_str().to_string(),
                headers: server.headers.clone(),
            }),
            _ => None,
        })
        .collect();
    ToolResources { mcp }
}

/// Approve calls to servers bound with `ApprovalMode::Never`, reject the rest
fn approval_for(spec: &AgentSpec, call: RequiredToolCall) -> ToolApproval {
    let server = spec.tools().iter().find_map(|binding| match binding {
        ToolBinding::Mcp(server) if Some(&server.server_label) == call.server_label.as_ref() => {
            Some(server)
        }
        _ => None,
    });

    match server {
        Some(server) => ToolApproval {
            tool_call_id: call.id,
            approve: server.approval_mode == ApprovalMode::Never,
            headers: server.headers.clone(),
        },
        None => {
            warn!(
                "Rejecting call {} to unbound MCP server {:?}",
                call.id, call.server_label
            );
            ToolApproval {
                tool_call_id: call.id,
                approve: false,
                headers: Default::default(),
            }
        }
    }
}

#[async_trait]
impl AgentExecutor for HostedExecutor {
    fn name(&self) -> &str {
        "hosted"
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
        debug!(
            "Invoking {} (stage {}, attempt {})",
            spec.name(),
            opts.stage_index,
            opts.attempt
        );
        let mut scope = ResourceScope::new(self.api.clone());
        let result = self.run_in_scope(&mut scope, spec, context).await;

        let leaked = scope.release_all().await;
        if leaked > 0 {
            warn!("{} remote resource(s) of {} were not released", leaked, spec.name());
        }
        result.map_err(AdapterError::from)
    }
}

/// Every delegate record of an invocation, for display
pub fn delegate_calls(invocation: &Invocation) -> Vec<&ToolCallRecord> {
    invocation
        .tool_calls
        .iter()
        .filter(|r| r.kind == "connected_agent")
        .collect()
}
