//! Pipeline Runner for Tandem
//!
//! Loads a JSON pipeline definition, runs it against the selected backend and
//! prints every stage output as it arrives.

use anyhow::{bail, Context as _};
use clap::{Parser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::testing::ContextLengthExecutor;
use tandem_core::{
    init_logging, load_env, load_env_from_path, AgentExecutor, CancellationToken,
    CoordinatorConfig, ObserverError, ObserverSet, PartialEvent, PipelineCoordinator,
    PipelineDefinition, PipelineObserver, TandemError, TranscriptPrinter,
};
use tandem_provider_chat::{ChatConfig, ChatExecutor};
use tandem_provider_hosted::{HostedConfig, HostedExecutor};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline definition file (JSON)
    #[arg(short, long)]
    pipeline: PathBuf,

    /// Initial task; read from stdin when omitted
    #[arg(short, long)]
    task: Option<String>,

    /// Agent backend
    #[arg(short, long, value_enum, default_value = "hosted")]
    backend: Backend,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Total attempts per stage
    #[arg(long)]
    max_attempts: Option<usize>,

    /// Stream text deltas while stages run
    #[arg(long)]
    stream: bool,

    /// Load environment variables from this file instead of `.env`
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Hosted agents service (PROJECT_ENDPOINT, MODEL_DEPLOYMENT_NAME, AGENTS_API_TOKEN)
    Hosted,
    /// OpenAI-compatible chat completions (CHAT_API_KEY, CHAT_API_BASE_URL, CHAT_MODEL)
    Chat,
    /// Offline stub replying `<agent>:<context length>`
    Echo,
}

/// Prints text deltas inline while a stage streams
struct DeltaPrinter;

impl PipelineObserver for DeltaPrinter {
    fn on_partial_event(&self, _agent_name: &str, event: &PartialEvent) -> Result<(), ObserverError> {
        if let PartialEvent::TextDelta { text } = event {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{}", text).map_err(|e| ObserverError::new(e.to_string()))?;
            stdout.flush().map_err(|e| ObserverError::new(e.to_string()))?;
        }
        Ok(())
    }
}

/// Load `.env` (or `--env-file`), then install logging so filters set there apply
fn prepare(cli: &Cli) -> anyhow::Result<()> {
    let skipped = match &cli.env_file {
        Some(path) => {
            load_env_from_path(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            None
        }
        None => load_env().err(),
    };

    init_logging();
    if let Some(e) = skipped {
        warn!("No .env loaded: {}", e);
    }
    Ok(())
}

fn coordinator_config(cli: &Cli) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::from_env();
    if let Some(secs) = cli.timeout_secs {
        config.stage_timeout = Duration::from_secs(secs);
    }
    if let Some(attempts) = cli.max_attempts {
        config.retry.max_attempts = attempts;
    }
    if cli.stream {
        config.streaming = true;
    }
    config
}

fn build_executor(backend: Backend) -> anyhow::Result<Arc<dyn AgentExecutor>> {
    Ok(match backend {
        Backend::Hosted => {
            let config = HostedConfig::from_env().context("Hosted backend is not configured")?;
            Arc::new(HostedExecutor::new(&config))
        }
        Backend::Chat => {
            let config = ChatConfig::from_env().context("Chat backend is not configured")?;
            Arc::new(ChatExecutor::new(&config))
        }
        Backend::Echo => Arc::new(ContextLengthExecutor::new()),
    })
}

fn read_task(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let task = line.trim().to_string();
    if task.is_empty() {
        bail!("No task given");
    }
    Ok(task)
}

fn report_failure(error: &TandemError) {
    eprintln!("\nPipeline failed: {}", error);
    if let Some(failure) = error.stage_failure() {
        eprintln!(
            "  stage {} ({}) after {} attempt(s)",
            failure.index, failure.agent_name, failure.attempts
        );
    }
    let partial = error.partial_outputs();
    if !partial.is_empty() {
        eprintln!("  completed before the failure:");
        for message in partial {
            eprintln!("  # {}\n  {}", message.label(), message.text);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    prepare(&cli)?;

    let definition = PipelineDefinition::from_file(&cli.pipeline)
        .with_context(|| format!("Failed to read {}", cli.pipeline.display()))?;
    let pipeline = definition.into_pipeline()?;
    let executor = build_executor(cli.backend)?;

    let mut observers = ObserverSet::new().with(Arc::new(TranscriptPrinter::new().with_tool_calls()));
    if cli.stream {
        observers = observers.with(Arc::new(DeltaPrinter));
    }
    let coordinator = PipelineCoordinator::new(executor)
        .with_config(coordinator_config(&cli))
        .with_observer(Arc::new(observers));

    let task = match cli.task {
        Some(task) => task,
        None => read_task("\nWhat should the agents work on?: ")?,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling the run");
            on_signal.cancel();
        }
    });

    match coordinator.run_with_cancel(&pipeline, &task, cancel).await {
        Ok(result) => {
            println!(
                "\nFinished {} in {} ms ({} stage(s), {} attempt(s))",
                result.pipeline_name,
                result.duration_ms,
                result.stages.len(),
                result.total_attempts()
            );
            println!("{}", result.final_text());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_failure(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
