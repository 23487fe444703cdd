//! Tandem Core
//!
//! Runs a fixed set of named agents over a shared conversation and collects
//! their outputs in order. This crate provides:
//!
//! - Agent specs, tool bindings and the per-pipeline agent registry
//! - The [`AgentExecutor`] trait every backend implements
//! - Sequential and fan-out pipelines and the [`PipelineCoordinator`]
//! - Observers for intermediate outputs, streaming events and delegate calls
//! - Timeouts, retry with backoff and cancellation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem_core::testing::ContextLengthExecutor;
//! use tandem_core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pipeline = Pipeline::sequential(
//!         "feedback",
//!         vec![
//!             AgentSpec::new("summarizer", "Summarize the feedback"),
//!             AgentSpec::new("classifier", "Classify the feedback"),
//!             AgentSpec::new("action", "Suggest an action"),
//!         ],
//!     )?;
//!
//!     let coordinator = PipelineCoordinator::new(Arc::new(ContextLengthExecutor::new()))
//!         .with_observer(Arc::new(TranscriptPrinter::new()));
//!     let result = coordinator.run(&pipeline, "App crashes on upload").await?;
//!     println!("{}", result.final_text());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use uuid::Uuid;

pub mod config;
pub mod coordinator;
pub mod definition;
pub mod error;
pub mod executor;
pub mod function_calling;
pub mod logging;
pub mod observer;
pub mod pipeline;
pub mod registry;
pub mod resilience;
pub mod streaming;
pub mod testing;
pub mod types;

pub use config::{
    get_env_bool, get_env_int, get_env_or, get_required_env, load_env, load_env_from_path,
    CoordinatorConfig,
};
pub use coordinator::PipelineCoordinator;
pub use definition::{AgentDefinition, PipelineDefinition, ToolDefinition, TopologyKind};
pub use error::{AdapterError, ConfigError, ObserverError, Result, StageFailure, TandemError};
pub use executor::{AgentExecutor, InvokeOptions, Invocation};
pub use function_calling::{
    create_function_definition, FunctionCall, FunctionDefinition, FunctionError,
    FunctionHandler, FunctionRegistry, FunctionResult,
};
pub use logging::{init_logging, Logger};
pub use observer::{
    CollectingObserver, FnObserver, NoopObserver, ObservedEvent, ObserverSet, PipelineObserver,
    TranscriptPrinter,
};
pub use pipeline::{Pipeline, PipelineBuilder, Topology};
pub use registry::AgentRegistry;
pub use resilience::{retry_with_backoff, RetryConfig, RetryOutcome};
pub use streaming::{event_channel, EventSender, EventStream, PartialEvent, StreamHandler};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    AgentSpec, ApprovalMode, ConnectedAgent, Context, McpServer, Message, PipelineResult, Role,
    StageRecord, ToolBinding, ToolCallRecord,
};
