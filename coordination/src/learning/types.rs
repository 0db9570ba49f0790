//! Learning records, feedback and coaching types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Human verdict on an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    /// The insight was useful as-is.
    Helpful,
    /// The insight was ignored or rejected.
    Dismissed,
    /// The insight was useful only after a correction.
    Corrected,
}

impl FeedbackType {
    /// Whether this verdict counts against the agent.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Dismissed | Self::Corrected)
    }
}

impl std::fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Helpful => write!(f, "helpful"),
            Self::Dismissed => write!(f, "dismissed"),
            Self::Corrected => write!(f, "corrected"),
        }
    }
}

impl std::str::FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "helpful" => Ok(Self::Helpful),
            "dismissed" => Ok(Self::Dismissed),
            "corrected" => Ok(Self::Corrected),
            other => Err(format!("unknown feedback type: {}", other)),
        }
    }
}

/// Feedback attached to a learning record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback_type: FeedbackType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Coaching adjustments stamped onto the records they addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingEntry {
    pub applied_at: DateTime<Utc>,
    pub adjustments: Vec<String>,
}

/// One agent output, later correlated with human feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub id: String,
    pub agent_id: String,
    pub insight_id: String,
    pub output: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coaching: Option<CoachingEntry>,
}

impl LearningRecord {
    pub fn new(agent_id: &str, insight_id: &str, output: serde_json::Value) -> Self {
        Self {
            id: format!("learn-{}", Uuid::new_v4()),
            agent_id: agent_id.to_string(),
            insight_id: insight_id.to_string(),
            output,
            created_at: Utc::now(),
            feedback: None,
            coaching: None,
        }
    }

    /// Whether the attached feedback (if any) is a failure.
    pub fn is_failure(&self) -> bool {
        self.feedback
            .as_ref()
            .is_some_and(|f| f.feedback_type.is_failure())
    }
}

/// Cached per-agent performance, recomputed on every feedback event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    /// Retained records for this agent, with or without feedback.
    pub total_insights: usize,
    pub total_with_feedback: usize,
    pub helpful: usize,
    pub dismissed: usize,
    pub corrected: usize,
    /// round((helpful + corrected × 0.5) / total_with_feedback × 100)
    pub accuracy: u32,
    /// round(helpful / total_with_feedback × 100)
    pub acceptance_rate: u32,
    pub last_updated: DateTime<Utc>,
}

impl AgentPerformance {
    /// Compute performance over an agent's records.
    ///
    /// Both rates are 0 while no record carries feedback.
    pub fn from_records<'a>(
        agent_id: &str,
        records: impl Iterator<Item = &'a LearningRecord>,
    ) -> Self {
        let mut perf = Self {
            agent_id: agent_id.to_string(),
            total_insights: 0,
            total_with_feedback: 0,
            helpful: 0,
            dismissed: 0,
            corrected: 0,
            accuracy: 0,
            acceptance_rate: 0,
            last_updated: Utc::now(),
        };

        for record in records.filter(|r| r.agent_id == agent_id) {
            perf.total_insights += 1;
            if let Some(feedback) = &record.feedback {
                perf.total_with_feedback += 1;
                match feedback.feedback_type {
                    FeedbackType::Helpful => perf.helpful += 1,
                    FeedbackType::Dismissed => perf.dismissed += 1,
                    FeedbackType::Corrected => perf.corrected += 1,
                }
            }
        }

        if perf.total_with_feedback > 0 {
            let total = perf.total_with_feedback as f64;
            perf.accuracy =
                ((perf.helpful as f64 + perf.corrected as f64 * 0.5) / total * 100.0).round() as u32;
            perf.acceptance_rate = (perf.helpful as f64 / total * 100.0).round() as u32;
        }

        perf
    }
}

/// Metric a coaching suggestion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachingMetric {
    /// Dismissals dominate: the agent surfaces too much noise.
    UserAcceptance,
    /// Corrections dominate: the agent's findings are off.
    Accuracy,
}

impl std::fmt::Display for CoachingMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserAcceptance => write!(f, "user_acceptance"),
            Self::Accuracy => write!(f, "accuracy"),
        }
    }
}

/// A recent failing output attached to coaching feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureExample {
    pub insight_id: String,
    pub feedback_type: FeedbackType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    pub output: serde_json::Value,
}

/// Templated improvement suggestion for an under-performing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingFeedback {
    pub agent_id: String,
    pub metric: CoachingMetric,
    pub current_score: u32,
    pub benchmark: u32,
    pub suggestion: String,
    pub examples: Vec<FailureExample>,
    pub generated_at: DateTime<Utc>,
}
