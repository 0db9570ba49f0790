//! Agent lifecycle state, tasks, and task results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::bus::BusError;
use crate::generation::GenerationError;

/// Errors an agent implementation may raise from `process`.
///
/// The runner converts every one of these into a failed [`TaskResult`].
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid task: {0}")]
    InvalidTask(String),
}

impl From<BusError> for AgentError {
    fn from(e: BusError) -> Self {
        Self::Processing(e.to_string())
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Lifecycle status of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Processing,
    Error,
    Stopped,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Processing => write!(f, "processing"),
            Self::Error => write!(f, "error"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Mutable lifecycle counters kept by the runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: String,
    pub status: AgentStatus,
    pub last_activity: Option<DateTime<Utc>>,
    pub processed_count: u64,
    pub successful_count: u64,
    pub total_processing_time_ms: u64,
    pub current_task: Option<String>,
}

impl AgentState {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: AgentStatus::Idle,
            last_activity: None,
            processed_count: 0,
            successful_count: 0,
            total_processing_time_ms: 0,
            current_task: None,
        }
    }

    /// 100 before any task; otherwise round(successful / processed × 100).
    pub fn success_rate(&self) -> u32 {
        if self.processed_count == 0 {
            return 100;
        }
        (self.successful_count as f64 / self.processed_count as f64 * 100.0).round() as u32
    }
}

/// Snapshot returned by `AgentRunner::status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub state: AgentState,
    pub success_rate: u32,
    pub capabilities: Vec<String>,
}

/// Work carried in a `task_assignment` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default = "Task::new_id")]
    pub id: String,
    pub task_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Task {
    pub fn new(task_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Self::new_id(),
            task_type: task_type.into(),
            payload,
        }
    }

    pub fn new_id() -> String {
        format!("task-{}", Uuid::new_v4())
    }
}

/// Reply carried in a `task_result` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub agent_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn success(task_id: &str, agent_id: &str, output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            success: true,
            output: Some(output),
            error: None,
            duration_ms,
        }
    }

    pub fn failure(task_id: &str, agent_id: &str, error: String, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            success: false,
            output: None,
            error: Some(error),
            duration_ms,
        }
    }
}
