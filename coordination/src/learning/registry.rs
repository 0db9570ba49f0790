//! Learning registry: correlates agent outputs with later human feedback.
//!
//! Records are appended on every insight an agent publishes. Feedback is
//! attached by insight id, the agent's cached performance is recomputed, and
//! coaching suggestions are derived from that performance once the agent has
//! enough samples.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::*;

/// Tunables for the learning registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Records retained before the oldest is dropped.
    pub record_capacity: usize,
    /// Acceptance rate below which an agent needs coaching.
    pub coaching_threshold: u32,
    /// Minimum retained insights before coaching is considered.
    pub min_insights_for_coaching: usize,
    /// Score reported as the target in coaching feedback.
    pub benchmark: u32,
    /// Failing examples attached to coaching feedback.
    pub max_examples: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            record_capacity: 5_000,
            coaching_threshold: 70,
            min_insights_for_coaching: 5,
            benchmark: 80,
            max_examples: 5,
        }
    }
}

#[derive(Default)]
struct Inner {
    records: VecDeque<LearningRecord>,
    performance: HashMap<String, AgentPerformance>,
}

/// Shared reference to LearningRegistry
pub type SharedLearningRegistry = Arc<LearningRegistry>;

/// Feedback-driven learning registry.
pub struct LearningRegistry {
    config: LearningConfig,
    inner: RwLock<Inner>,
}

impl LearningRegistry {
    pub fn new() -> Self {
        Self::with_config(LearningConfig::default())
    }

    pub fn with_config(config: LearningConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn shared(self) -> SharedLearningRegistry {
        Arc::new(self)
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Append a record for an agent output and return its id.
    pub fn record_output(
        &self,
        agent_id: &str,
        insight_id: &str,
        output: serde_json::Value,
    ) -> String {
        let record = LearningRecord::new(agent_id, insight_id, output);
        let id = record.id.clone();

        let mut inner = self.write();
        if self.config.record_capacity == 0 {
            return id;
        }
        while inner.records.len() >= self.config.record_capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(record);

        debug!(agent_id, insight_id, record_id = %id, "Learning output recorded");
        id
    }

    /// Attach feedback to the record for `insight_id` and recompute the
    /// agent's performance.
    ///
    /// Returns `false` when no record matches. A second feedback for the
    /// same insight replaces the first.
    pub fn record_feedback(
        &self,
        insight_id: &str,
        feedback_type: FeedbackType,
        correction: Option<String>,
    ) -> bool {
        let mut inner = self.write();

        let Some(pos) = inner.records.iter().rposition(|r| r.insight_id == insight_id) else {
            warn!(insight_id, "Feedback for unknown insight ignored");
            return false;
        };

        let record = &mut inner.records[pos];
        if let Some(previous) = &record.feedback {
            warn!(
                insight_id,
                previous = %previous.feedback_type,
                replacement = %feedback_type,
                "Replacing earlier feedback"
            );
        }
        record.feedback = Some(Feedback {
            feedback_type,
            correction,
            timestamp: Utc::now(),
        });
        let agent_id = record.agent_id.clone();

        let perf = AgentPerformance::from_records(&agent_id, inner.records.iter());
        info!(
            agent_id = %agent_id,
            feedback = %feedback_type,
            acceptance_rate = perf.acceptance_rate,
            accuracy = perf.accuracy,
            "Feedback recorded"
        );
        inner.performance.insert(agent_id, perf);
        true
    }

    /// Cached performance for an agent, if any feedback has been recorded.
    pub fn get_performance(&self, agent_id: &str) -> Option<AgentPerformance> {
        self.read().performance.get(agent_id).cloned()
    }

    /// Cached performance for every agent with feedback, sorted by agent id.
    pub fn all_performance(&self) -> Vec<AgentPerformance> {
        let mut all: Vec<AgentPerformance> = self.read().performance.values().cloned().collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }

    /// Coaching check against the configured threshold.
    pub fn needs_coaching(&self, agent_id: &str) -> bool {
        self.needs_coaching_with(agent_id, self.config.coaching_threshold)
    }

    /// True iff acceptance is below `threshold` and the agent has at least
    /// `min_insights_for_coaching` retained insights.
    pub fn needs_coaching_with(&self, agent_id: &str, threshold: u32) -> bool {
        self.read().performance.get(agent_id).is_some_and(|p| {
            p.acceptance_rate < threshold && p.total_insights >= self.config.min_insights_for_coaching
        })
    }

    /// Build a coaching suggestion, or `None` when coaching is not needed.
    pub fn generate_coaching_feedback(&self, agent_id: &str) -> Option<CoachingFeedback> {
        if !self.needs_coaching(agent_id) {
            return None;
        }

        let inner = self.read();
        let perf = inner.performance.get(agent_id)?;

        let examples: Vec<FailureExample> = inner
            .records
            .iter()
            .rev()
            .filter(|r| r.agent_id == agent_id)
            .filter_map(|r| {
                let feedback = r.feedback.as_ref()?;
                feedback.feedback_type.is_failure().then(|| FailureExample {
                    insight_id: r.insight_id.clone(),
                    feedback_type: feedback.feedback_type,
                    correction: feedback.correction.clone(),
                    output: r.output.clone(),
                })
            })
            .take(self.config.max_examples)
            .collect();

        // The metric follows whichever failure kind dominates the examples
        let dismissed = examples
            .iter()
            .filter(|e| e.feedback_type == FeedbackType::Dismissed)
            .count();
        let metric = if dismissed * 2 > examples.len() {
            CoachingMetric::UserAcceptance
        } else {
            CoachingMetric::Accuracy
        };
        let current_score = match metric {
            CoachingMetric::UserAcceptance => perf.acceptance_rate,
            CoachingMetric::Accuracy => perf.accuracy,
        };

        let suggestion = match metric {
            CoachingMetric::UserAcceptance => format!(
                "{} of {} reviewed insights from {} were dismissed. Raise the bar for \
                 surfacing findings: publish fewer insights, backed by stronger evidence \
                 and a clear business impact.",
                perf.dismissed, perf.total_with_feedback, agent_id
            ),
            CoachingMetric::Accuracy => format!(
                "{} of {} reviewed insights from {} needed correction. Compare the \
                 corrections below with the original outputs and recalibrate the \
                 thresholds that produced them.",
                perf.corrected, perf.total_with_feedback, agent_id
            ),
        };

        Some(CoachingFeedback {
            agent_id: agent_id.to_string(),
            metric,
            current_score,
            benchmark: self.config.benchmark,
            suggestion,
            examples,
            generated_at: Utc::now(),
        })
    }

    /// Stamp coaching adjustments on every failing, not-yet-coached record
    /// of the agent. Returns how many records were stamped.
    pub fn record_coaching(&self, agent_id: &str, adjustments: Vec<String>) -> usize {
        let entry = CoachingEntry {
            applied_at: Utc::now(),
            adjustments,
        };

        let mut inner = self.write();
        let mut stamped = 0;
        for record in inner
            .records
            .iter_mut()
            .filter(|r| r.agent_id == agent_id && r.is_failure() && r.coaching.is_none())
        {
            record.coaching = Some(entry.clone());
            stamped += 1;
        }

        info!(
            agent_id,
            stamped,
            adjustments = ?entry.adjustments,
            "Coaching recorded"
        );
        stamped
    }

    /// Most recent records for an agent, newest first.
    pub fn records_for_agent(&self, agent_id: &str, limit: usize) -> Vec<LearningRecord> {
        self.read()
            .records
            .iter()
            .rev()
            .filter(|r| r.agent_id == agent_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Record for an insight, if retained.
    pub fn record_for_insight(&self, insight_id: &str) -> Option<LearningRecord> {
        self.read()
            .records
            .iter()
            .rev()
            .find(|r| r.insight_id == insight_id)
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.read().records.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LearningRegistry {
    fn default() -> Self {
        Self::new()
    }
}
