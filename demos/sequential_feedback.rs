//! Sequential feedback pipeline
//!
//! Summarizer, classifier and action agents run in order over one customer
//! message; each stage output is printed as `# <agent>` when it arrives.
//!
//! Uses the chat backend when `CHAT_API_KEY` is set and the offline
//! `<agent>:<context length>` stub otherwise.
//!
//! ```bash
//! cargo run -p tandem-run --example sequential_feedback
//! ```

use std::sync::Arc;
use std::time::Duration;
use tandem_core::testing::ContextLengthExecutor;
use tandem_core::{
    init_logging, load_env, AgentExecutor, AgentSpec, CoordinatorConfig, Pipeline,
    PipelineCoordinator, TranscriptPrinter,
};
use tandem_provider_chat::{ChatConfig, ChatExecutor};

const SUMMARIZER: &str = "Summarize the customer's feedback in one short sentence. \
Keep it neutral and concise.\n\
Example output:\n\
App crashes during photo upload.\n\
User praises dark mode feature.";

const CLASSIFIER: &str = "Classify the feedback as one of the following: \
Positive, Negative, or Feature request.";

const ACTION: &str = "Based on the summary and classification, suggest the next action \
in one short sentence.\n\
Example output:\n\
Escalate as a high-priority bug for the mobile team.\n\
Log as positive feedback to share with design and marketing.\n\
Log as enhancement request for product backlog.";

const TASK: &str = "I tried updating my profile picture several times today, but the app \
kept freezing halfway through the process. I had to restart it three times, and in the end, \
the picture still wouldn't upload. It's really frustrating and makes the app feel unreliable.";

fn executor() -> Arc<dyn AgentExecutor> {
    match ChatConfig::from_env() {
        Ok(config) => Arc::new(ChatExecutor::new(&config)),
        Err(e) => {
            println!("Chat backend unavailable ({}); using the offline stub\n", e);
            Arc::new(ContextLengthExecutor::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let _ = load_env();

    let pipeline = Pipeline::sequential(
        "customer-feedback",
        vec![
            AgentSpec::new("SummarizerAgent", SUMMARIZER),
            AgentSpec::new("ClassifierAgent", CLASSIFIER),
            AgentSpec::new("ActionAgent", ACTION),
        ],
    )?;

    let config = CoordinatorConfig {
        stage_timeout: Duration::from_secs(20),
        ..CoordinatorConfig::default()
    };
    let coordinator = PipelineCoordinator::new(executor())
        .with_config(config)
        .with_observer(Arc::new(TranscriptPrinter::new()));

    let result = coordinator.run(&pipeline, TASK).await?;

    println!("\n****** Task Input ******\n{}", TASK);
    println!("***** Final Result *****\n{}", result.final_text());
    Ok(())
}
