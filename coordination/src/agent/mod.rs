//! Agent capability contract
//!
//! Domain workers implement [`Agent`]; the shared [`AgentRunner`] wraps any
//! implementation with lifecycle state, bus subscription, task replies and
//! coaching bookkeeping.
//!
//! ```text
//! bus ──▶ subscription callback ──▶ mpsc queue ──▶ worker
//!                                                  │
//!            task_assignment ──▶ Agent::process ───┴─▶ task_result reply
//!            coaching_feedback ──▶ Agent::apply_coaching ──▶ learning registry
//!            insight_share / data_request ──▶ optional hooks
//! ```

pub mod context;
pub mod runner;
pub mod types;

use async_trait::async_trait;

use crate::bus::Message;
use crate::learning::CoachingFeedback;

pub use context::{AgentContext, InsightOptions};
pub use runner::{AgentRunner, SharedAgentRunner};
pub use types::{
    AgentError, AgentResult, AgentState, AgentStatus, AgentStatusReport, Task, TaskResult,
};

/// Capability contract every domain worker satisfies.
#[async_trait]
pub trait Agent: Send {
    /// Stable agent id; also the bus channel the agent listens on.
    fn id(&self) -> &str;

    /// Capability tags advertised in status reports.
    fn capabilities(&self) -> Vec<String>;

    /// Run one task. Errors become a failed `TaskResult`.
    async fn process(&mut self, task: &Task, ctx: &AgentContext) -> AgentResult<serde_json::Value>;

    /// Tune internal thresholds from coaching and describe each change.
    fn apply_coaching(&mut self, feedback: &CoachingFeedback) -> Vec<String>;

    /// Called for insights broadcast by other agents.
    async fn on_insight_share(&mut self, _message: &Message, _ctx: &AgentContext) {}

    /// Answer a data request; `Some` is sent back as a `data_response`.
    async fn on_data_request(
        &mut self,
        _message: &Message,
        _ctx: &AgentContext,
    ) -> Option<serde_json::Value> {
        None
    }
}
