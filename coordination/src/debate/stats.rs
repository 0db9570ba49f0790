//! Aggregate statistics over terminated debates.

use std::collections::BTreeMap;

use serde::Serialize;

use super::state::{DebatePhase, DebateRecord};

/// Snapshot returned by `DebateOrchestrator::get_statistics`.
///
/// Counts, averages and approval rates are computed over every terminated
/// debate. A cancellation terminates a debate the same way completion does,
/// so cancelled debates are part of `completed` and their zero-confidence
/// decisions pull the average down; `cancelled` is that subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebateStatistics {
    pub active: usize,
    pub queued: usize,
    /// Terminated debates, cancelled ones included.
    pub completed: usize,
    pub cancelled: usize,
    pub by_domain: BTreeMap<String, usize>,
    pub by_team: BTreeMap<String, usize>,
    /// Mean final-decision confidence, 0.0 when nothing completed.
    pub average_confidence: f64,
    pub average_duration_secs: f64,
    /// Fraction of completed debates whose reviews were all approvals.
    /// A debate with no reviews counts as approved.
    pub governance_approval_rate: f64,
    /// Same fraction over completed debates with at least one review.
    pub reviewed_approval_rate: Option<f64>,
}

impl DebateStatistics {
    pub fn from_history<'a>(
        history: impl Iterator<Item = &'a DebateRecord>,
        active: usize,
        queued: usize,
    ) -> Self {
        let mut stats = Self {
            active,
            queued,
            ..Default::default()
        };

        let mut confidence_sum = 0.0;
        let mut duration_sum = 0.0;
        let mut approved = 0usize;
        let mut reviewed = 0usize;
        let mut reviewed_approved = 0usize;

        for record in history {
            match record.current_phase {
                DebatePhase::Complete => {}
                DebatePhase::Cancelled => stats.cancelled += 1,
                _ => continue,
            }

            stats.completed += 1;
            *stats
                .by_domain
                .entry(record.domain.as_str().to_string())
                .or_insert(0) += 1;
            *stats.by_team.entry(record.team.clone()).or_insert(0) += 1;

            confidence_sum += record
                .final_decision
                .as_ref()
                .map(|d| d.confidence)
                .unwrap_or(0.0);
            duration_sum += record.duration_secs().unwrap_or(0.0);

            let all_approved = record.all_reviews_approved();
            if all_approved {
                approved += 1;
            }
            if !record.governance_reviews.is_empty() {
                reviewed += 1;
                if all_approved {
                    reviewed_approved += 1;
                }
            }
        }

        if stats.completed > 0 {
            let n = stats.completed as f64;
            stats.average_confidence = confidence_sum / n;
            stats.average_duration_secs = duration_sum / n;
            stats.governance_approval_rate = approved as f64 / n;
        }
        if reviewed > 0 {
            stats.reviewed_approval_rate = Some(reviewed_approved as f64 / reviewed as f64);
        }

        stats
    }
}
