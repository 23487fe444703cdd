//! Agent with a local function tool
//!
//! `fetch_weather` is registered with the executor's function registry. When
//! the run asks for tool outputs the executor answers from the registry and
//! submits them before polling on.
//!
//! ```bash
//! cargo run -p tandem-run --example function_tools
//! ```

use anyhow::Context as _;
use serde_json::json;
use std::sync::Arc;
use tandem_core::{
    create_function_definition, init_logging, load_env, AgentSpec, FunctionError,
    FunctionRegistry, Pipeline, PipelineCoordinator, ToolBinding, TranscriptPrinter,
};
use tandem_provider_hosted::{HostedConfig, HostedExecutor};

fn weather_for(location: &str) -> &'static str {
    match location {
        "New York" => "Sunny, 25°C",
        "London" => "Cloudy, 18°C",
        "Tokyo" => "Rainy, 22°C",
        _ => "Weather data not available for this location.",
    }
}

fn functions() -> anyhow::Result<FunctionRegistry> {
    let mut registry = FunctionRegistry::new();
    registry.register_fn(
        create_function_definition(
            "fetch_weather",
            "Fetches the weather information for the specified location.",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The location to fetch weather for."
                    }
                },
                "required": ["location"]
            }),
        ),
        |args| async move {
            let location = args
                .get("location")
                .and_then(|v| v.as_str())
                .ok_or_else(|| FunctionError::new("missing 'location'"))?;
            Ok(json!({ "weather": weather_for(location) }))
        },
    )?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let _ = load_env();

    let config = HostedConfig::from_env()
        .context("Set PROJECT_ENDPOINT, MODEL_DEPLOYMENT_NAME and AGENTS_API_TOKEN")?;
    let registry = functions()?;

    let agent = AgentSpec::new("my-agent", "You are a helpful agent")
        .with_tools(registry.definitions().into_iter().map(ToolBinding::Function));
    let pipeline = Pipeline::sequential("function-tools", vec![agent])?;

    let executor = HostedExecutor::new(&config).with_functions(registry);
    let coordinator = PipelineCoordinator::new(Arc::new(executor))
        .with_observer(Arc::new(TranscriptPrinter::new().with_tool_calls()));

    let result = coordinator
        .run(
            &pipeline,
            "Hello, send an email with the datetime and weather information in New York?",
        )
        .await?;

    for message in result.transcript.iter() {
        println!("Role: {}, Content: {}", message.role.as_str(), message.text);
    }
    Ok(())
}
