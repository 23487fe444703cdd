//! Hosted Agents Provider
//!
//! [`AgentExecutor`](tandem_core::AgentExecutor) for hosted agent services
//! exposing the agents / threads / runs REST surface:
//! - function tools answered from a local `FunctionRegistry`
//! - MCP servers with per-run approval policy
//! - connected agents (fan-out delegates) created on demand
//! - run-step tool calls surfaced as trace records
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem_core::{AgentSpec, Pipeline, PipelineCoordinator};
//! use tandem_provider_hosted::{HostedConfig, HostedExecutor};
//!
//! # async fn run() -> tandem_core::Result<()> {
//! let config = HostedConfig::from_env()?;
//! let coordinator = PipelineCoordinator::new(Arc::new(HostedExecutor::new(&config)));
//! let pipeline = Pipeline::sequential("one", vec![AgentSpec::new("helper", "Be helpful")])?;
//! let result = coordinator.run(&pipeline, "Hello").await?;
//! println!("{}", result.final_text());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod scope;
pub mod types;

pub use api::{AgentsApi, HttpAgentsApi};
pub use config::{HostedConfig, DEFAULT_API_VERSION};
pub use error::HostedError;
pub use executor::{delegate_calls, HostedExecutor};
pub use scope::{Resource, ResourceScope};
