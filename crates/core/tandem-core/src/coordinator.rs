/*!
# Pipeline Coordinator

Runs a [`Pipeline`] against an [`AgentExecutor`]:

- sequential pipelines invoke one agent per stage over a growing context;
  stage `i + 1` starts only after stage `i`'s output is appended and observed
- fan-out pipelines invoke the root agent once, with every other agent bound
  as a connected delegate

Every invocation runs under the configured timeout and retry policy. A failed
stage aborts the run with [`TandemError::StageFailed`]; cancellation is honored
on stage boundaries (and in flight when configured).
*/

use crate::config::CoordinatorConfig;
use crate::error::{AdapterError, ConfigError, StageFailure};
use crate::executor::{AgentExecutor, InvokeOptions, Invocation};
use crate::observer::{isolate, NoopObserver, PipelineObserver};
use crate::pipeline::{Pipeline, Topology};
use crate::resilience::retry_with_backoff;
use crate::streaming::PartialEvent;
use crate::types::{AgentSpec, Context, Message, PipelineResult, Role, StageRecord};
use crate::{Result, TandemError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a single stage ended
enum StageOutcome {
    Done {
        invocation: Invocation,
        attempts: usize,
        duration_ms: u64,
    },
    Failed {
        error: AdapterError,
        attempts: usize,
    },
    Cancelled,
}

/// Outputs accumulated during one run
struct RunState {
    run_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
    context: Context,
    outputs: Vec<Message>,
    stages: Vec<StageRecord>,
}

impl RunState {
    fn new(task: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            clock: Instant::now(),
            context: Context::from_task(task),
            outputs: Vec::new(),
            stages: Vec::new(),
        }
    }

    fn cancelled(self) -> TandemError {
        TandemError::Cancelled {
            completed: self.outputs,
        }
    }

    fn failed(self, index: usize, agent_name: &str, error: AdapterError, attempts: usize) -> TandemError {
        TandemError::StageFailed(Box::new(StageFailure {
            index,
            agent_name: agent_name.to_string(),
            attempts,
            error,
            partial_outputs: self.outputs,
        }))
    }

    fn finish(self, pipeline_name: &str) -> Result<PipelineResult> {
        let final_output = self
            .outputs
            .last()
            .cloned()
            .ok_or(TandemError::Config(ConfigError::EmptyPipeline))?;

        Ok(PipelineResult {
            run_id: self.run_id,
            pipeline_name: pipeline_name.to_string(),
            per_stage_outputs: self.outputs,
            final_output,
            stages: self.stages,
            transcript: self.context,
            started_at: self.started_at,
            ended_at: Utc::now(),
            duration_ms: self.clock.elapsed().as_millis() as u64,
        })
    }
}

/// Multi-agent pipeline coordinator
///
/// Holds no per-run state, so one coordinator can serve concurrent runs;
/// each run owns its own context.
pub struct PipelineCoordinator {
    executor: Arc<dyn AgentExecutor>,
    observer: Arc<dyn PipelineObserver>,
    config: CoordinatorConfig,
}

impl PipelineCoordinator {
    /// Create a coordinator with default configuration and no observer
    pub fn new(executor: Arc<dyn AgentExecutor>) -> Self {
        Self {
            executor,
            observer: Arc::new(NoopObserver),
            config: CoordinatorConfig::default(),
        }
    }

    /// Use custom configuration
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach an observer
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run a pipeline to completion
    pub async fn run(&self, pipeline: &Pipeline, task: &str) -> Result<PipelineResult> {
        self.run_with_cancel(pipeline, task, CancellationToken::new())
            .await
    }

    /// Run a pipeline, stopping when `cancel` fires
    ///
    /// After cancellation no further stage starts and `on_complete` is not
    /// called; the error carries the outputs appended so far.
    pub async fn run_with_cancel(
        &self,
        pipeline: &Pipeline,
        task: &str,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        self.config.validate()?;
        pipeline.validate()?;

        let run = RunState::new(task);
        info!(
            "Starting pipeline {} (run {}, {} agent(s), backend {})",
            pipeline.name(),
            run.run_id,
            pipeline.len(),
            self.executor.name()
        );

        let result = match pipeline.topology() {
            Topology::Sequential => self.run_sequential(pipeline, run, &cancel).await,
            Topology::FanOut { .. } => self.run_fan_out(pipeline, run, &cancel).await,
        }?;

        info!(
            "Pipeline {} completed in {}ms ({} stage(s), {} attempt(s))",
            pipeline.name(),
            result.duration_ms,
            result.stages.len(),
            result.total_attempts()
        );
        isolate("on_complete", || self.observer.on_complete(&result));
        Ok(result)
    }

    async fn run_sequential(
        &self,
        pipeline: &Pipeline,
        mut run: RunState,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        let total = pipeline.stages().len();

        for (index, spec) in pipeline.stages().iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Pipeline {} cancelled before stage {}", pipeline.name(), index);
                return Err(run.cancelled());
            }

            info!("Stage {}/{}: {}", index + 1, total, spec.name());
            match self.execute_stage(spec, &run.context, index, cancel).await {
                StageOutcome::Done {
                    invocation,
                    attempts,
                    duration_ms,
                } => self.record_stage(&mut run, spec, index, invocation, attempts, duration_ms),
                StageOutcome::Failed { error, attempts } => {
                    warn!("Stage {} ({}) failed: {}", index, spec.name(), error);
                    return Err(run.failed(index, spec.name(), error, attempts));
                }
                StageOutcome::Cancelled => {
                    info!("Pipeline {} cancelled during stage {}", pipeline.name(), index);
                    return Err(run.cancelled());
                }
            }
        }

        run.finish(pipeline.name())
    }

    async fn run_fan_out(
        &self,
        pipeline: &Pipeline,
        mut run: RunState,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        let root = pipeline.root_with_delegates()?;
        debug!(
            "Fan-out root {} with {} delegate(s)",
            root.name(),
            pipeline.len() - 1
        );

        if cancel.is_cancelled() {
            return Err(run.cancelled());
        }

        match self.execute_stage(&root, &run.context, 0, cancel).await {
            StageOutcome::Done {
                invocation,
                attempts,
                duration_ms,
            } => {
                self.record_stage(&mut run, &root, 0, invocation, attempts, duration_ms);
                run.finish(pipeline.name())
            }
            StageOutcome::Failed { error, attempts } => {
                warn!("Root agent {} failed: {}", root.name(), error);
                Err(run.failed(0, root.name(), error, attempts))
            }
            StageOutcome::Cancelled => Err(run.cancelled()),
        }
    }

    /// Append a finished stage's output and notify the observer
    fn record_stage(
        &self,
        run: &mut RunState,
        spec: &AgentSpec,
        index: usize,
        invocation: Invocation,
        attempts: usize,
        duration_ms: u64,
    ) {
        let mut message = invocation.message;
        message.role = Role::Assistant;
        message.author = Some(spec.name().to_string());

        for call in &invocation.tool_calls {
            isolate("on_delegate_call", || {
                self.observer.on_delegate_call(spec.name(), call)
            });
        }

        run.context.append(message.clone());
        run.outputs.push(message.clone());
        run.stages.push(StageRecord {
            index,
            agent_name: spec.name().to_string(),
            attempts,
            duration_ms,
        });

        isolate("on_stage_output", || {
            self.observer.on_stage_output(spec.name(), &message)
        });
    }

    async fn execute_stage(
        &self,
        spec: &AgentSpec,
        context: &Context,
        index: usize,
        cancel: &CancellationToken,
    ) -> StageOutcome {
        let start = Instant::now();
        let timeout = self.config.stage_timeout;

        let retried = retry_with_backoff(&self.config.retry, move |attempt| async move {
            // A cancel raised during an earlier attempt stops the retries
            if attempt > 1 && cancel.is_cancelled() {
                return Err(AdapterError::Cancelled);
            }
            let opts = InvokeOptions {
                stage_index: index,
                attempt,
                timeout,
            };
            match tokio::time::timeout(timeout, self.invoke_once(spec, context, opts)).await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Timeout(timeout)),
            }
        });

        let outcome = if self.config.cancel_in_flight {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return StageOutcome::Cancelled,
                outcome = retried => outcome,
            }
        } else {
            retried.await
        };

        match outcome.result {
            Ok(invocation) => StageOutcome::Done {
                invocation,
                attempts: outcome.attempts,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Err(AdapterError::Cancelled) => StageOutcome::Cancelled,
            Err(error) => StageOutcome::Failed {
                error,
                attempts: outcome.attempts,
            },
        }
    }

    async fn invoke_once(
        &self,
        spec: &AgentSpec,
        context: &Context,
        opts: InvokeOptions,
    ) -> std::result::Result<Invocation, AdapterError> {
        if opts.attempt > 1 {
            info!("Retrying {} (attempt {})", spec.name(), opts.attempt);
        }

        if !self.config.streaming {
            return self.executor.invoke_traced(spec, context, opts).await;
        }

        let stream = self.executor.invoke_stream(spec, context, opts).await?;
        let mut tool_calls = Vec::new();
        let message = stream
            .for_each_until_complete(|event| {
                if let PartialEvent::ToolCall(record) = event {
                    tool_calls.push(record.clone());
                }
                isolate("on_partial_event", || {
                    self.observer.on_partial_event(spec.name(), event)
                });
            })
            .await?;

        Ok(Invocation {
            message,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::CollectingObserver;
    use crate::testing::{AppendNameExecutor, ContextLengthExecutor, FailingObserver};

    fn feedback_pipeline() -> Pipeline {
        Pipeline::sequential(
            "feedback",
            vec![
                AgentSpec::new("summarizer", "Summarize"),
                AgentSpec::new("classifier", "Classify"),
                AgentSpec::new("action", "Suggest"),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sequential_run() {
        let executor = Arc::new(AppendNameExecutor::new());
        let coordinator = PipelineCoordinator::new(executor.clone());

        let result = coordinator.run(&feedback_pipeline(), "").await.unwrap();

        assert_eq!(result.final_text(), "summarizerclassifieraction");
        assert_eq!(result.per_stage_outputs.len(), 3);
        assert_eq!(result.transcript.len(), 4);
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test]
    async fn test_outputs_tagged_with_agent() {
        let coordinator = PipelineCoordinator::new(Arc::new(ContextLengthExecutor::new()));
        let result = coordinator
            .run(&feedback_pipeline(), "App crashes on upload")
            .await
            .unwrap();

        for (msg, stage) in result.per_stage_outputs.iter().zip(["summarizer", "classifier", "action"]) {
            assert_eq!(msg.role, Role::Assistant);
            assert_eq!(msg.author.as_deref(), Some(stage));
        }
        assert_eq!(result.stages[2].index, 2);
        assert_eq!(result.total_attempts(), 3);
    }

    #[tokio::test]
    async fn test_failing_observer_is_isolated() {
        let collector = Arc::new(CollectingObserver::new());
        let coordinator = PipelineCoordinator::new(Arc::new(AppendNameExecutor::new()))
            .with_observer(Arc::new(
                crate::observer::ObserverSet::new()
                    .with(Arc::new(FailingObserver::panicking()))
                    .with(collector.clone()),
            ));

        let result = coordinator.run(&feedback_pipeline(), "x").await.unwrap();
        assert_eq!(result.final_text(), "xsummarizerclassifieraction");
        assert_eq!(collector.stage_outputs().len(), 3);
        assert_eq!(collector.completions(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_invocation() {
        let executor = Arc::new(AppendNameExecutor::new());
        let mut config = CoordinatorConfig::default();
        config.retry.max_attempts = 0;

        let err = PipelineCoordinator::new(executor.clone())
            .with_config(config)
            .run(&feedback_pipeline(), "x")
            .await
            .unwrap_err();

        assert!(err.is_configuration_error());
        assert_eq!(executor.calls(), 0);
    }
}
