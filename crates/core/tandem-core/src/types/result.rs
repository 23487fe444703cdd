//! Pipeline run results

use super::{Context, Message};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of one tool call made inside an invocation
///
/// Surfaced best-effort; adapters that cannot see inside the backend report none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Backend call ID
    pub id: String,

    /// Tool kind ("function", "mcp", "connected_agent", ...)
    pub kind: String,

    /// Tool or delegate name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,

    /// Raw output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Per-stage bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Zero-based stage index
    pub index: usize,

    /// Agent name
    pub agent_name: String,

    /// Invocations made (1 when the first attempt succeeded)
    pub attempts: usize,

    /// Duration in milliseconds, retries included
    pub duration_ms: u64,
}

/// Outcome of one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Stage outputs in stage order
    pub per_stage_outputs: Vec<Message>,

    /// Last chain output, or the root agent's answer in fan-out mode
    pub final_output: Message,

    /// Stage bookkeeping
    pub stages: Vec<StageRecord>,

    /// Full conversation, starting with the task
    pub transcript: Context,

    /// Start time
    pub started_at: DateTime<Utc>,

    /// End time
    pub ended_at: DateTime<Utc>,

    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl PipelineResult {
    /// Final answer text
    pub fn final_text(&self) -> &str {
        &self.final_output.text
    }

    /// Stage output texts in order
    pub fn output_texts(&self) -> Vec<&str> {
        self.per_stage_outputs.iter().map(|m| m.text.as_str()).collect()
    }

    /// Total attempts over all stages
    pub fn total_attempts(&self) -> usize {
        self.stages.iter().map(|s| s.attempts).sum()
    }
}
