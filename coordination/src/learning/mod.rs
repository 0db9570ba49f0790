//! Feedback-driven learning
//!
//! Correlates every published insight with the human verdict it later
//! receives, keeps per-agent acceptance and accuracy scores, and derives
//! coaching suggestions for agents that fall below the acceptance threshold.

pub mod registry;
pub mod types;

pub use registry::{LearningConfig, LearningRegistry, SharedLearningRegistry};
pub use types::{
    AgentPerformance, CoachingEntry, CoachingFeedback, CoachingMetric, FailureExample, Feedback,
    FeedbackType, LearningRecord,
};
