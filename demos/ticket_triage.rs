//! Ticket triage with connected agents
//!
//! A triage agent delegates to priority, team and effort agents exposed to it
//! as connected-agent tools. The hosted service schedules the delegates; the
//! calls it reports are printed as they are recorded.
//!
//! Needs `PROJECT_ENDPOINT`, `MODEL_DEPLOYMENT_NAME` and `AGENTS_API_TOKEN`;
//! without them a scripted stub answers.
//!
//! ```bash
//! cargo run -p tandem-run --example ticket_triage
//! ```

use anyhow::bail;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tandem_core::testing::{Script, ScriptedExecutor};
use tandem_core::{
    init_logging, load_env, AgentExecutor, AgentSpec, Pipeline, PipelineCoordinator,
    ToolCallRecord, TranscriptPrinter,
};
use tandem_provider_hosted::{HostedConfig, HostedExecutor};

const PRIORITY: &str = "Assess how urgent a ticket is based on its description.

Respond with one of the following levels:
- High: User-facing or blocking issues
- Medium: Time-sensitive but not breaking anything
- Low: Cosmetic or non-urgent tasks

Only output the urgency level and a very brief explanation.";

const TEAM: &str = "Decide which team should own each ticket.

Choose from the following teams:
- Frontend
- Backend
- Infrastructure
- Marketing

Base your answer on the content of the ticket. Respond with the team name and a very brief explanation.";

const EFFORT: &str = "Estimate how much work each ticket will require.

Use the following scale:
- Small: Can be completed in a day
- Medium: 2-3 days of work
- Large: Multi-day or cross-team effort

Base your estimate on the complexity implied by the ticket. Respond with the effort level and a brief justification.";

const TRIAGE: &str = "Triage the given ticket. Use the connected tools to determine the ticket's priority, \
which team it should be assigned to, and how much effort it may take.";

fn delegate(id: &str, name: &str) -> ToolCallRecord {
    ToolCallRecord {
        id: id.to_string(),
        kind: "connected_agent".to_string(),
        name: Some(name.to_string()),
        arguments: None,
        output: None,
    }
}

fn executor() -> Arc<dyn AgentExecutor> {
    match HostedConfig::from_env() {
        Ok(config) => Arc::new(HostedExecutor::new(&config)),
        Err(e) => {
            println!("Hosted backend unavailable ({}); using a scripted stub\n", e);
            let script = Script::reply(
                "Priority: High (blocking for users)\nTeam: Frontend\nEffort: Medium (2-3 days)",
            )
            .with_tool_call(delegate("call_1", "priority_agent"))
            .with_tool_call(delegate("call_2", "team_agent"))
            .with_tool_call(delegate("call_3", "effort_agent"));
            Arc::new(ScriptedExecutor::new().with_script("triage-agent", script))
        }
    }
}

fn read_ticket() -> anyhow::Result<String> {
    print!("\nWhat's the support problem you need to resolve?: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let ticket = line.trim().to_string();
    if ticket.is_empty() {
        bail!("No ticket given");
    }
    Ok(ticket)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let _ = load_env();

    let pipeline = Pipeline::fan_out(
        "ticket-triage",
        AgentSpec::new("triage-agent", TRIAGE),
        vec![
            AgentSpec::new("priority_agent", PRIORITY)
                .with_description("Assess the priority of a ticket"),
            AgentSpec::new("team_agent", TEAM)
                .with_description("Determines which team should take the ticket"),
            AgentSpec::new("effort_agent", EFFORT)
                .with_description("Determines the effort required to complete the ticket"),
        ],
    )?;

    let coordinator = PipelineCoordinator::new(executor())
        .with_observer(Arc::new(TranscriptPrinter::new().with_tool_calls()));

    let ticket = read_ticket()?;
    println!("\nProcessing agent thread. Please wait.");
    let result = coordinator.run(&pipeline, &ticket).await?;

    println!("\nConversation:");
    for message in result.transcript.iter() {
        println!("{}:\n{}\n", message.label(), message.text);
    }
    Ok(())
}
