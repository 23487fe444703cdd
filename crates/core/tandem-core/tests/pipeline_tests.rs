//! Integration tests for the pipeline coordinator
//!
//! Every test runs real pipelines against the stub executors in
//! `tandem_core::testing` and checks outputs, observer callbacks and errors.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tandem_core::testing::*;
use tandem_core::*;

fn feedback_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new("summarizer", "Summarize the customer feedback in one short sentence."),
        AgentSpec::new("classifier", "Classify the feedback as Positive, Neutral or Negative."),
        AgentSpec::new("action", "Recommend the next action based on the summary and classification."),
    ]
}

fn feedback_pipeline() -> Pipeline {
    Pipeline::sequential("customer-feedback", feedback_agents()).unwrap()
}

fn fast_retry(max_attempts: usize) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
        jitter: false,
        retry_invocation_errors: false,
    }
}

fn triage_pipeline() -> Pipeline {
    Pipeline::fan_out(
        "ticket-triage",
        AgentSpec::new("triage-agent", "Triage the ticket using the connected agents."),
        vec![
            AgentSpec::new("priority_agent", "Assess urgency").with_description("Assess the priority of a ticket"),
            AgentSpec::new("team_agent", "Pick a team").with_description("Determine which team should take the ticket"),
            AgentSpec::new("effort_agent", "Estimate").with_description("Determine the effort required"),
        ],
    )
    .unwrap()
}

fn delegate_record(id: &str, agent: &str) -> ToolCallRecord {
    ToolCallRecord {
        id: id.to_string(),
        kind: "connected_agent".to_string(),
        name: Some(agent.to_string()),
        arguments: None,
        output: Some(format!("{} says ok", agent)),
    }
}

/// Final text is the task followed by every stage name, in order
#[tokio::test]
async fn test_append_name_ordering() {
    let executor = Arc::new(AppendNameExecutor::new());
    let coordinator = PipelineCoordinator::new(executor.clone());

    let result = coordinator.run(&feedback_pipeline(), "ticket: ").await.unwrap();

    assert_eq!(result.final_text(), "ticket: summarizerclassifieraction");
    assert_eq!(executor.invoked(), vec!["summarizer", "classifier", "action"]);
    assert_eq!(result.pipeline_name, "customer-feedback");
    assert_eq!(result.final_output, result.per_stage_outputs[2]);
}

#[tokio::test]
async fn test_end_to_end_context_lengths() {
    let collector = Arc::new(CollectingObserver::new());
    let coordinator = PipelineCoordinator::new(Arc::new(ContextLengthExecutor::new()))
        .with_observer(collector.clone());

    let result = coordinator
        .run(&feedback_pipeline(), "App crashes on upload")
        .await
        .unwrap();

    assert_eq!(
        result.output_texts(),
        vec!["summarizer:21", "classifier:34", "action:47"]
    );
    assert_eq!(result.final_text(), "action:47");
    assert_eq!(
        collector.stage_outputs(),
        vec![
            ("summarizer".to_string(), "summarizer:21".to_string()),
            ("classifier".to_string(), "classifier:34".to_string()),
            ("action".to_string(), "action:47".to_string()),
        ]
    );

    let transcript = result.transcript.transcript();
    assert!(transcript.starts_with("user:\nApp crashes on upload\n"));
    assert!(transcript.contains("classifier:\nclassifier:34\n"));
}

#[tokio::test]
async fn test_observer_sees_stage_before_next_starts() {
    let executor = Arc::new(ContextLengthExecutor::new());
    let seen_calls = Arc::new(std::sync::Mutex::new(Vec::new()));

    let probe_executor = executor.clone();
    let probe_calls = seen_calls.clone();
    let observer = FnObserver::new(move |_name: &str, _msg: &Message| {
        probe_calls.lock().unwrap().push(probe_executor.calls());
    });

    PipelineCoordinator::new(executor.clone())
        .with_observer(Arc::new(observer))
        .run(&feedback_pipeline(), "App crashes on upload")
        .await
        .unwrap();

    assert_eq!(*seen_calls.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_on_complete_called_once_and_last() {
    let collector = Arc::new(CollectingObserver::new());
    PipelineCoordinator::new(Arc::new(AppendNameExecutor::new()))
        .with_observer(collector.clone())
        .run(&feedback_pipeline(), "x")
        .await
        .unwrap();

    let events = collector.events();
    assert_eq!(collector.completions(), 1);
    assert!(matches!(events.last(), Some(ObservedEvent::Complete(r)) if r.final_text() == "xsummarizerclassifieraction"));
}

#[tokio::test]
async fn test_empty_pipeline_never_invokes() {
    let executor = Arc::new(AppendNameExecutor::new());
    let collector = Arc::new(CollectingObserver::new());
    let pipeline = Pipeline::sequential("empty", Vec::<AgentSpec>::new()).unwrap();

    let err = PipelineCoordinator::new(executor.clone())
        .with_observer(collector.clone())
        .run(&pipeline, "task")
        .await
        .unwrap_err();

    assert!(matches!(err, TandemError::Config(ConfigError::EmptyPipeline)));
    assert_eq!(executor.calls(), 0);
    assert!(collector.events().is_empty());
}

#[test]
fn test_duplicate_names_fail_at_construction() {
    let err = Pipeline::sequential(
        "dup",
        vec![
            AgentSpec::new("summarizer", "a"),
            AgentSpec::new("classifier", "b"),
            AgentSpec::new("summarizer", "c"),
        ],
    )
    .unwrap_err();

    assert!(matches!(
        err,
        TandemError::Config(ConfigError::DuplicateName(ref name)) if name == "summarizer"
    ));
}

#[test]
fn test_invalid_agent_name_rejected() {
    let err = Pipeline::sequential("bad", vec![AgentSpec::new("has space", "a")]).unwrap_err();
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn test_failing_observers_do_not_change_result() {
    let baseline = PipelineCoordinator::new(Arc::new(ContextLengthExecutor::new()))
        .run(&feedback_pipeline(), "App crashes on upload")
        .await
        .unwrap();

    for observer in [FailingObserver::erroring(), FailingObserver::panicking()] {
        let result = PipelineCoordinator::new(Arc::new(ContextLengthExecutor::new()))
            .with_observer(Arc::new(observer))
            .run(&feedback_pipeline(), "App crashes on upload")
            .await
            .unwrap();

        assert_eq!(result.output_texts(), baseline.output_texts());
        assert_eq!(result.final_text(), baseline.final_text());
    }
}

#[tokio::test]
async fn test_timeout_exhausts_attempts() {
    let executor = Arc::new(SlowExecutor::new(Duration::from_millis(500)).only_for("classifier"));
    let collector = Arc::new(CollectingObserver::new());
    let config = CoordinatorConfig {
        stage_timeout: Duration::from_millis(20),
        retry: fast_retry(3),
        ..Default::default()
    };

    let err = PipelineCoordinator::new(executor.clone())
        .with_config(config)
        .with_observer(collector.clone())
        .run(&feedback_pipeline(), "App crashes on upload")
        .await
        .unwrap_err();

    let failure = err.stage_failure().expect("stage failure");
    assert_eq!(failure.index, 1);
    assert_eq!(failure.agent_name, "classifier");
    assert_eq!(failure.attempts, 3);
    assert!(failure.timed_out());
    assert_eq!(failure.partial_outputs.len(), 1);
    assert_eq!(failure.partial_outputs[0].text, "summarizer:21");
    assert_eq!(err.partial_outputs().len(), 1);

    assert_eq!(
        executor.invoked(),
        vec!["summarizer", "classifier", "classifier", "classifier"]
    );
    assert_eq!(collector.stage_outputs().len(), 1);
    assert_eq!(collector.completions(), 0);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let executor = Arc::new(
        FailingExecutor::new("classifier", AdapterError::transient("503 Service Unavailable")).times(2),
    );
    let result = PipelineCoordinator::new(executor.clone())
        .with_config(CoordinatorConfig {
            retry: fast_retry(3),
            ..Default::default()
        })
        .run(&feedback_pipeline(), "App crashes on upload")
        .await
        .unwrap();

    assert_eq!(result.stages[1].attempts, 3);
    assert_eq!(result.total_attempts(), 5);
    assert_eq!(
        result.output_texts(),
        vec!["summarizer:21", "classifier:34", "action:47"]
    );
}

#[tokio::test]
async fn test_invocation_failure_not_retried() {
    let executor = Arc::new(FailingExecutor::new(
        "action",
        AdapterError::invocation("run failed: rate limit policy"),
    ));
    let err = PipelineCoordinator::new(executor.clone())
        .with_config(CoordinatorConfig {
            retry: fast_retry(3),
            ..Default::default()
        })
        .run(&feedback_pipeline(), "App crashes on upload")
        .await
        .unwrap_err();

    let failure = err.stage_failure().expect("stage failure");
    assert_eq!(failure.index, 2);
    assert_eq!(failure.attempts, 1);
    assert!(!failure.timed_out());
    assert_eq!(failure.partial_outputs.len(), 2);
    assert_eq!(executor.calls(), 3);
    assert!(err.to_string().contains("'action'"));
}

#[tokio::test]
async fn test_empty_output_passes_through() {
    let executor = Arc::new(ScriptedExecutor::new().with_script("classifier", Script::reply("")));
    let result = PipelineCoordinator::new(executor)
        .run(&feedback_pipeline(), "task")
        .await
        .unwrap();

    assert_eq!(result.output_texts(), vec!["summarizer", "", "action"]);
    assert_eq!(result.transcript.len(), 4);
}

#[tokio::test]
async fn test_cancel_at_stage_boundary() {
    let executor = Arc::new(AppendNameExecutor::new());
    let collector = Arc::new(CollectingObserver::new());
    let token = CancellationToken::new();

    let trigger = token.clone();
    let canceller = FnObserver::new(move |name: &str, _msg: &Message| {
        if name == "summarizer" {
            trigger.cancel();
        }
    });

    let err = PipelineCoordinator::new(executor.clone())
        .with_observer(Arc::new(
            ObserverSet::new()
                .with(Arc::new(canceller))
                .with(collector.clone()),
        ))
        .run_with_cancel(&feedback_pipeline(), "x", token)
        .await
        .unwrap_err();

    match err {
        TandemError::Cancelled { completed } => {
            assert_eq!(completed.len(), 1);
            assert_eq!(completed[0].text, "xsummarizer");
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert_eq!(executor.invoked(), vec!["summarizer"]);
    assert_eq!(collector.completions(), 0);
}

#[tokio::test]
async fn test_cancel_in_flight() {
    let executor = Arc::new(SlowExecutor::new(Duration::from_secs(10)).only_for("classifier"));
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = PipelineCoordinator::new(executor.clone())
        .run_with_cancel(&feedback_pipeline(), "App crashes on upload", token)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(err, TandemError::Cancelled { ref completed } if completed.len() == 1));
    assert_eq!(executor.invoked(), vec!["summarizer", "classifier"]);
}

/// Cancels the run on its first call and fails transiently
struct CancelThenFail {
    token: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl AgentExecutor for CancelThenFail {
    fn name(&self) -> &str {
        "cancel-then-fail"
    }

    async fn invoke(
        &self,
        _spec: &AgentSpec,
        _context: &Context,
        _opts: InvokeOptions,
    ) -> std::result::Result<Message, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        Err(AdapterError::transient("connection reset"))
    }
}

#[tokio::test]
async fn test_cancel_stops_retries_between_attempts() {
    let token = CancellationToken::new();
    let executor = Arc::new(CancelThenFail {
        token: token.clone(),
        calls: AtomicUsize::new(0),
    });

    let err = PipelineCoordinator::new(executor.clone())
        .with_config(CoordinatorConfig {
            retry: fast_retry(3),
            cancel_in_flight: false,
            ..Default::default()
        })
        .run_with_cancel(&feedback_pipeline(), "x", token)
        .await
        .unwrap_err();

    assert!(matches!(err, TandemError::Cancelled { ref completed } if completed.is_empty()));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let executor = Arc::new(AppendNameExecutor::new());
    let token = CancellationToken::new();
    token.cancel();

    let err = PipelineCoordinator::new(executor.clone())
        .run_with_cancel(&feedback_pipeline(), "x", token)
        .await
        .unwrap_err();

    assert!(matches!(err, TandemError::Cancelled { ref completed } if completed.is_empty()));
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_fan_out_invokes_root_once() {
    let executor = Arc::new(ScriptedExecutor::new().with_script(
        "triage-agent",
        Script::reply("Priority: High. Team: Frontend. Effort: Medium.")
            .with_tool_call(delegate_record("call_1", "priority_agent"))
            .with_tool_call(delegate_record("call_2", "team_agent"))
            .with_tool_call(delegate_record("call_3", "effort_agent")),
    ));
    let collector = Arc::new(CollectingObserver::new());

    let result = PipelineCoordinator::new(executor.clone())
        .with_observer(collector.clone())
        .run(
            &triage_pipeline(),
            "Users can't reset their password from the mobile app.",
        )
        .await
        .unwrap();

    assert_eq!(executor.invoked(), vec!["triage-agent"]);
    assert_eq!(
        executor.tools_seen_by("triage-agent"),
        vec!["connected_agent", "connected_agent", "connected_agent"]
    );
    assert_eq!(result.per_stage_outputs.len(), 1);
    assert_eq!(result.final_output.author.as_deref(), Some("triage-agent"));
    assert_eq!(
        result.final_text(),
        "Priority: High. Team: Frontend. Effort: Medium."
    );

    let delegated: Vec<_> = collector
        .delegate_calls()
        .into_iter()
        .filter_map(|r| r.name)
        .collect();
    assert_eq!(delegated, vec!["priority_agent", "team_agent", "effort_agent"]);
    assert_eq!(collector.completions(), 1);
}

#[tokio::test]
async fn test_fan_out_definition_binds_each_delegate_once() {
    let pipeline = PipelineDefinition::from_json(
        r#"{
            "name": "ticket-triage",
            "topology": "fan_out",
            "root": "triage-agent",
            "agents": [
                {"name": "triage-agent", "instructions": "Triage the ticket.",
                 "tools": [{"type": "connected_agent", "agent": "team_agent"}]},
                {"name": "team_agent", "instructions": "Pick the team."}
            ]
        }"#,
    )
    .unwrap()
    .into_pipeline()
    .unwrap();
    let executor = Arc::new(ScriptedExecutor::new());

    PipelineCoordinator::new(executor.clone())
        .run(&pipeline, "Dark mode toggle is missing.")
        .await
        .unwrap();

    assert_eq!(executor.tools_seen_by("triage-agent"), vec!["connected_agent"]);
}

#[tokio::test]
async fn test_fan_out_root_failure() {
    let executor = Arc::new(FailingExecutor::new(
        "triage-agent",
        AdapterError::invocation("run failed"),
    ));
    let err = PipelineCoordinator::new(executor)
        .run(&triage_pipeline(), "ticket")
        .await
        .unwrap_err();

    let failure = err.stage_failure().expect("stage failure");
    assert_eq!(failure.agent_name, "triage-agent");
    assert!(failure.partial_outputs.is_empty());
}

#[tokio::test]
async fn test_streaming_forwards_partial_events() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .with_script("summarizer", Script::reply("Upload crash").with_deltas(["Upload", " crash"]))
            .with_script("classifier", Script::reply("Negative").with_deltas(["Neg", "ative"])),
    );
    let collector = Arc::new(CollectingObserver::new());
    let config = CoordinatorConfig {
        streaming: true,
        ..Default::default()
    };

    let result = PipelineCoordinator::new(executor)
        .with_config(config)
        .with_observer(collector.clone())
        .run(&feedback_pipeline(), "App crashes on upload")
        .await
        .unwrap();

    let deltas: Vec<(String, String)> = collector
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ObservedEvent::Partial {
                agent_name,
                event: PartialEvent::TextDelta { text },
            } => Some((agent_name, text)),
            _ => None,
        })
        .collect();

    assert_eq!(deltas.len(), 4);
    assert_eq!(deltas[0], ("summarizer".to_string(), "Upload".to_string()));
    assert_eq!(deltas[3], ("classifier".to_string(), "ative".to_string()));
    assert_eq!(result.output_texts(), vec!["Upload crash", "Negative", "action"]);
}

#[tokio::test]
async fn test_concurrent_runs_share_coordinator() {
    let coordinator = Arc::new(PipelineCoordinator::new(Arc::new(ContextLengthExecutor::new())));
    let pipeline = feedback_pipeline();

    let (a, b) = tokio::join!(
        coordinator.run(&pipeline, "App crashes on upload"),
        coordinator.run(&pipeline, "Love it")
    );

    assert_eq!(a.unwrap().final_text(), "action:47");
    assert_eq!(b.unwrap().final_text(), "action:32");
}

#[tokio::test]
async fn test_definition_file_round_trip_to_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "name": "customer-feedback",
            "topology": "sequential",
            "agents": [
                {{"name": "summarizer", "instructions": "Summarize"}},
                {{"name": "classifier", "instructions": "Classify"}},
                {{"name": "action", "instructions": "Suggest"}}
            ]
        }}"#
    )
    .unwrap();

    let pipeline = PipelineDefinition::from_file(file.path())
        .unwrap()
        .into_pipeline()
        .unwrap();

    let result = PipelineCoordinator::new(Arc::new(ContextLengthExecutor::new()))
        .run(&pipeline, "App crashes on upload")
        .await
        .unwrap();
    assert_eq!(result.final_text(), "action:47");
}

#[tokio::test]
async fn test_missing_definition_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = PipelineDefinition::from_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, TandemError::Io(_)));
}

#[tokio::test]
async fn test_stage_records() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let observer = FnObserver::new(move |_: &str, _: &Message| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let result = PipelineCoordinator::new(Arc::new(AppendNameExecutor::new()))
        .with_observer(Arc::new(observer))
        .run(&feedback_pipeline(), "")
        .await
        .unwrap();

    let indices: Vec<_> = result.stages.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(result.ended_at >= result.started_at);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
