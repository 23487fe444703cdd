//! Agent with an MCP server
//!
//! One agent answers questions through the Microsoft Learn MCP server. Tool
//! approvals are granted automatically (`ApprovalMode::Never`), and the tool
//! calls recorded in the run steps are listed after the answer.
//!
//! ```bash
//! cargo run -p tandem-run --example mcp_agent
//! ```

use anyhow::bail;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tandem_core::{
    init_logging, load_env, AgentSpec, ApprovalMode, CollectingObserver, McpServer,
    ObserverSet, Pipeline, PipelineCoordinator, ToolBinding, TranscriptPrinter,
};
use tandem_provider_hosted::{HostedConfig, HostedExecutor};

const MCP_SERVER_URL: &str = "https://learn.microsoft.com/api/mcp";
const MCP_SERVER_LABEL: &str = "mslearn";

const INSTRUCTIONS: &str = "You have access to an MCP server called `microsoft.docs.mcp` - this tool \
allows you to search through Microsoft's latest official documentation. Use the available MCP \
tools to answer questions and perform tasks.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let _ = load_env();

    let config = match HostedConfig::from_env() {
        Ok(config) => config,
        Err(e) => bail!(
            "{}\nSet PROJECT_ENDPOINT, MODEL_DEPLOYMENT_NAME and AGENTS_API_TOKEN first.",
            e
        ),
    };

    let mcp = McpServer::new(MCP_SERVER_LABEL, MCP_SERVER_URL)
        .with_approval_mode(ApprovalMode::Never);
    println!("MCP Server: {} at {}", mcp.server_label, mcp.server_url);

    let pipeline = Pipeline::sequential(
        "mcp-agent",
        vec![AgentSpec::new("my-mcp-agent", INSTRUCTIONS).with_tool(ToolBinding::Mcp(mcp))],
    )?;

    let collector = Arc::new(CollectingObserver::new());
    let observers = ObserverSet::new()
        .with(Arc::new(TranscriptPrinter::new()))
        .with(collector.clone());
    let coordinator = PipelineCoordinator::new(Arc::new(HostedExecutor::new(&config)))
        .with_observer(Arc::new(observers));

    print!("\nHow can I help?: ");
    io::stdout().flush()?;
    let mut prompt = String::new();
    io::stdin().lock().read_line(&mut prompt)?;

    let result = coordinator.run(&pipeline, prompt.trim()).await?;

    let calls = collector.delegate_calls();
    if !calls.is_empty() {
        println!("\nMCP Tool calls:");
        for call in &calls {
            println!("    Tool Call ID: {}", call.id);
            println!("    Type: {}", call.kind);
            println!("    Name: {}", call.name.as_deref().unwrap_or("-"));
        }
    }

    println!("\nConversation:");
    println!("{}", "-".repeat(50));
    for message in result.transcript.iter() {
        println!("{}: {}", message.label().to_uppercase(), message.text);
        println!("{}", "-".repeat(50));
    }
    Ok(())
}
