//! Dialectic runner: drives one debate end to end.
//!
//! Optimist thesis, pessimist antithesis and mediator synthesis come from the
//! content generator; governance reviewers are then asked concurrently and
//! the debate completes with a decision derived from the synthesis. A
//! generation failure cancels the debate and is returned to the caller.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn, Instrument};

use super::orchestrator::{DebateAdmission, DebateError, DebateResult, SharedDebateOrchestrator};
use super::state::{DebateRecord, DebateRequest, FinalDecision, GovernanceReview, PersonaRole};
use crate::bus::{MessageTarget, MessageType, OutgoingMessage, SharedMessageBus, Subscription};
use crate::generation::{GenerationResult, PromptBuilder, SharedContentGenerator};
use crate::telemetry;

/// Bus source id for review requests.
pub const DIALECTIC_RUNNER_ID: &str = "dialectic-runner";

/// A governance reviewer evaluating a debate after synthesis.
#[async_trait]
pub trait GovernanceReviewer: Send + Sync {
    fn name(&self) -> &str;

    async fn review(&self, record: &DebateRecord) -> GenerationResult<GovernanceReview>;
}

/// Shared reviewer handle
pub type SharedGovernanceReviewer = Arc<dyn GovernanceReviewer>;

/// Approves a synthesis that is confident enough and cites evidence.
pub struct ConfidenceThresholdReviewer {
    name: String,
    min_confidence: f64,
}

impl ConfidenceThresholdReviewer {
    pub fn new(name: impl Into<String>, min_confidence: f64) -> Self {
        Self {
            name: name.into(),
            min_confidence,
        }
    }
}

#[async_trait]
impl GovernanceReviewer for ConfidenceThresholdReviewer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn review(&self, record: &DebateRecord) -> GenerationResult<GovernanceReview> {
        let mut concerns = Vec::new();
        match &record.synthesis {
            Some(synthesis) => {
                if synthesis.confidence < self.min_confidence {
                    concerns.push(format!(
                        "synthesis confidence {:.2} below {:.2}",
                        synthesis.confidence, self.min_confidence
                    ));
                }
                if synthesis.evidence.is_empty() {
                    concerns.push("synthesis cites no evidence".to_string());
                }
            }
            None => concerns.push("no synthesis recorded".to_string()),
        }

        let approved = concerns.is_empty();
        Ok(GovernanceReview {
            reviewer: self.name.clone(),
            approved,
            comments: if approved {
                "Synthesis meets confidence and evidence requirements".to_string()
            } else {
                format!("{} concern(s) raised", concerns.len())
            },
            concerns,
            reviewed_at: Utc::now(),
        })
    }
}

/// Result of [`DialecticRunner::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum DialecticOutcome {
    /// The debate ran to completion.
    Completed { record: Box<DebateRecord> },
    /// The request is waiting for a slot. A runner following the queue
    /// (see [`DialecticRunner::follow_queue`]) drives it once admitted.
    Queued { position: usize },
}

/// Shared reference to DialecticRunner
pub type SharedDialecticRunner = Arc<DialecticRunner>;

/// Drives debates through the orchestrator using a content generator and
/// a set of governance reviewers.
pub struct DialecticRunner {
    orchestrator: SharedDebateOrchestrator,
    generator: SharedContentGenerator,
    reviewers: Vec<SharedGovernanceReviewer>,
    bus: SharedMessageBus,
    prompts: PromptBuilder,
}

impl DialecticRunner {
    pub fn new(
        orchestrator: SharedDebateOrchestrator,
        generator: SharedContentGenerator,
        bus: SharedMessageBus,
    ) -> Self {
        let prompts = PromptBuilder::new(orchestrator.config().context_char_limit);
        Self {
            orchestrator,
            generator,
            reviewers: Vec::new(),
            bus,
            prompts,
        }
    }

    pub fn with_reviewer(mut self, reviewer: SharedGovernanceReviewer) -> Self {
        self.reviewers.push(reviewer);
        self
    }

    pub fn shared(self) -> SharedDialecticRunner {
        Arc::new(self)
    }

    /// Drive every debate admitted from the queue.
    ///
    /// Each `debate_started` event with `from_queue` set spawns
    /// [`drive`](Self::drive) for that debate on the current tokio runtime.
    /// Following stops on `unsubscribe` or once the runner is dropped.
    pub fn follow_queue(self: &Arc<Self>) -> Subscription {
        let runner = Arc::downgrade(self);
        self.bus.subscribe_type(MessageType::DebateStarted, move |msg| {
            if msg.payload["from_queue"].as_bool() != Some(true) {
                return;
            }
            let Some(debate_id) = msg.payload["debate_id"].as_str().map(str::to_string) else {
                return;
            };
            let Some(runner) = runner.upgrade() else {
                return;
            };
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = runner.drive(&debate_id).await {
                            warn!(debate_id = %debate_id, error = %e, "Admitted debate failed");
                        }
                    });
                }
                Err(_) => {
                    warn!(debate_id = %debate_id, "No runtime to drive admitted debate");
                }
            }
        })
    }

    /// Admit `request` and, if it started, drive it to completion.
    pub async fn run(&self, request: DebateRequest) -> DebateResult<DialecticOutcome> {
        match self.orchestrator.initiate_debate(request).await? {
            DebateAdmission::Started { debate_id } => {
                let record = self.drive(&debate_id).await?;
                Ok(DialecticOutcome::Completed {
                    record: Box::new(record),
                })
            }
            DebateAdmission::Queued { position } => Ok(DialecticOutcome::Queued { position }),
        }
    }

    /// Drive an already-started debate from its current phase to completion.
    pub async fn drive(&self, debate_id: &str) -> DebateResult<DebateRecord> {
        let span = telemetry::debate_span(debate_id);
        let start = Instant::now();
        let result = self.drive_inner(debate_id).instrument(span.clone()).await;
        telemetry::record_debate_result(
            &span,
            result.is_ok(),
            start.elapsed().as_millis() as u64,
        );
        result
    }

    async fn drive_inner(&self, debate_id: &str) -> DebateResult<DebateRecord> {
        let mut record = self
            .orchestrator
            .get_debate(debate_id)
            .ok_or_else(|| DebateError::NotFound(debate_id.to_string()))?;

        while let Some(role) = record.current_phase.speaker() {
            let prompt = self.prompts.debate_prompt(role, &record);
            let generated = self
                .generator
                .generate_position(role, &prompt)
                .instrument(telemetry::phase_span(debate_id, record.current_phase, role))
                .await;

            let mut round = match generated {
                Ok(round) => round,
                Err(e) => {
                    warn!(debate_id, role = %role, error = %e, "Generation failed; cancelling debate");
                    if let Err(cancel_err) = self
                        .orchestrator
                        .cancel_debate(debate_id, &format!("{} generation failed: {}", role, e))
                        .await
                    {
                        warn!(debate_id, error = %cancel_err, "Cancel after generation failure failed");
                    }
                    return Err(DebateError::Generation(e));
                }
            };
            round.role = role;
            record = self.orchestrator.record_round(debate_id, round).await?;
        }

        let reviews = self.gather_reviews(&record).await;
        for review in reviews {
            record = self
                .orchestrator
                .add_governance_review(debate_id, review)
                .await?;
        }

        let decision = final_decision(&record);
        let record = self.orchestrator.complete_debate(debate_id, decision).await?;
        info!(
            debate_id,
            confidence = record.final_decision.as_ref().map(|d| d.confidence).unwrap_or(0.0),
            reviews = record.governance_reviews.len(),
            "Debate concluded"
        );
        Ok(record)
    }

    async fn gather_reviews(&self, record: &DebateRecord) -> Vec<GovernanceReview> {
        let request = OutgoingMessage::new(
            DIALECTIC_RUNNER_ID,
            MessageTarget::Broadcast,
            MessageType::GovernanceReviewRequest,
            json!({
                "debate_id": record.id,
                "team": record.team,
                "topic": record.topic,
                "synthesis": record.synthesis,
            }),
        )
        .with_correlation(record.id.clone());
        if let Err(e) = self.bus.publish(request) {
            warn!(debate_id = %record.id, error = %e, "Failed to publish review request");
        }

        let results = join_all(self.reviewers.iter().map(|r| r.review(record))).await;

        let mut reviews = Vec::new();
        for (reviewer, result) in self.reviewers.iter().zip(results) {
            match result {
                Ok(review) => {
                    let published = self.bus.publish(
                        OutgoingMessage::new(
                            reviewer.name(),
                            MessageTarget::Broadcast,
                            MessageType::GovernanceReviewResult,
                            json!({
                                "debate_id": record.id,
                                "approved": review.approved,
                                "concerns": review.concerns,
                            }),
                        )
                        .with_correlation(record.id.clone()),
                    );
                    if let Err(e) = published {
                        warn!(debate_id = %record.id, error = %e, "Failed to publish review result");
                    }
                    reviews.push(review);
                }
                Err(e) => {
                    warn!(
                        debate_id = %record.id,
                        reviewer = reviewer.name(),
                        error = %e,
                        "Governance reviewer failed; skipping"
                    );
                }
            }
        }
        reviews
    }
}

/// Decision derived from the synthesis, its confidence scaled by the share
/// of approving reviews (1.0 when there are none).
pub fn final_decision(record: &DebateRecord) -> FinalDecision {
    let total = record.governance_reviews.len();
    let approvals = record
        .governance_reviews
        .iter()
        .filter(|r| r.approved)
        .count();
    let approval_ratio = if total == 0 {
        1.0
    } else {
        approvals as f64 / total as f64
    };

    match record.round(PersonaRole::Mediator) {
        Some(synthesis) => FinalDecision::new(
            synthesis.position.clone(),
            format!(
                "{} ({}/{} governance approvals)",
                synthesis.reasoning, approvals, total
            ),
            synthesis.confidence * approval_ratio,
        )
        .with_actions(synthesis.suggested_actions.clone()),
        None => FinalDecision::new("No synthesis reached", "debate ended without synthesis", 0.0),
    }
}
