//! Message types for agent coordination
//!
//! The tag set is closed: every producer and consumer on the bus agrees on
//! [`MessageType`], and payloads are free-form JSON keyed by that tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for messages
pub type MessageId = String;

/// Closed set of message tags carried on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Work handed to an agent
    TaskAssignment,
    /// Reply to a task assignment
    TaskResult,
    /// Feedback-driven tuning for an agent
    CoachingFeedback,
    /// An agent surfaced a new insight
    InsightShare,
    /// Ask another agent for data
    DataRequest,
    /// Answer to a data request
    DataResponse,
    /// Ask governance reviewers to look at a debate
    GovernanceReviewRequest,
    /// A governance reviewer's verdict
    GovernanceReviewResult,
    /// State slice changed
    StateSync,
    /// A debate was admitted and started
    DebateStarted,
    /// A debate round (thesis/antithesis/synthesis) was recorded
    DebateRoundCompleted,
    /// A governance review was appended to a debate
    DebateReviewed,
    /// A debate reached its final decision
    DebateCompleted,
    /// A debate was cancelled
    DebateCancelled,
    /// A debate request was queued behind the concurrency cap
    DebateQueued,
}

impl MessageType {
    /// All tags, in declaration order.
    pub fn all() -> &'static [MessageType] {
        &[
            Self::TaskAssignment,
            Self::TaskResult,
            Self::CoachingFeedback,
            Self::InsightShare,
            Self::DataRequest,
            Self::DataResponse,
            Self::GovernanceReviewRequest,
            Self::GovernanceReviewResult,
            Self::StateSync,
            Self::DebateStarted,
            Self::DebateRoundCompleted,
            Self::DebateReviewed,
            Self::DebateCompleted,
            Self::DebateCancelled,
            Self::DebateQueued,
        ]
    }

    /// Get the tag as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAssignment => "task_assignment",
            Self::TaskResult => "task_result",
            Self::CoachingFeedback => "coaching_feedback",
            Self::InsightShare => "insight_share",
            Self::DataRequest => "data_request",
            Self::DataResponse => "data_response",
            Self::GovernanceReviewRequest => "governance_review_request",
            Self::GovernanceReviewResult => "governance_review_result",
            Self::StateSync => "state_sync",
            Self::DebateStarted => "debate_started",
            Self::DebateRoundCompleted => "debate_round_completed",
            Self::DebateReviewed => "debate_reviewed",
            Self::DebateCompleted => "debate_completed",
            Self::DebateCancelled => "debate_cancelled",
            Self::DebateQueued => "debate_queued",
        }
    }

    /// Whether this tag belongs to the debate lifecycle
    pub fn is_debate_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::DebateStarted
                | Self::DebateRoundCompleted
                | Self::DebateReviewed
                | Self::DebateCompleted
                | Self::DebateCancelled
                | Self::DebateQueued
        )
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a message is addressed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MessageTarget {
    /// A single agent
    Agent(String),
    /// Every agent subscribed to the broadcast channel
    Broadcast,
}

impl MessageTarget {
    /// Address a single agent
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }

    /// Whether this is the broadcast target
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }
}

impl std::fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "agent:{}", id),
            Self::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// Delivery priority hint. The bus itself delivers synchronously and does
/// not reorder by priority; consumers may.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// A message as handed to [`MessageBus::publish`](super::MessageBus::publish):
/// the bus assigns the id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub source: String,
    pub target: MessageTarget,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl OutgoingMessage {
    /// Create a normal-priority message with no correlation id
    pub fn new(
        source: impl Into<String>,
        target: MessageTarget,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            source: source.into(),
            target,
            message_type,
            payload,
            priority: Priority::Normal,
            correlation_id: None,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the correlation id
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A delivered message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub source: String,
    pub target: MessageTarget,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Stamp an outgoing message with a fresh id and the current time
    pub fn stamp(outgoing: OutgoingMessage) -> Self {
        Self {
            id: Self::new_id(),
            source: outgoing.source,
            target: outgoing.target,
            message_type: outgoing.message_type,
            payload: outgoing.payload,
            priority: outgoing.priority,
            correlation_id: outgoing.correlation_id,
            timestamp: Utc::now(),
        }
    }

    /// Generate a new message ID
    pub fn new_id() -> MessageId {
        format!("msg-{}", Uuid::new_v4())
    }

    /// Whether this message is addressed to the given agent (directly or
    /// by broadcast)
    pub fn is_for_agent(&self, agent_id: &str) -> bool {
        match &self.target {
            MessageTarget::Agent(id) => id == agent_id,
            MessageTarget::Broadcast => true,
        }
    }
}
