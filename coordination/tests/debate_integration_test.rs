//! Debate integration tests: admission control, phase progression,
//! statistics and the dialectic runner with deterministic scripted
//! generators (no LLM calls).
//!
//! Covers: orchestrator ↔ bus ↔ durable log ↔ dialectic runner running
//! together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use insight_coordination::bus::{MessageBus, MessageType, SharedMessageBus};
use insight_coordination::debate::{
    ConfidenceThresholdReviewer, DebateAdmission, DebateConfig, DebateError, DebateOrchestrator,
    DebatePhase, DebateRecord, DebateRequest, DebateRound, DialecticOutcome, DialecticRunner,
    FinalDecision, GovernanceReview, InMemoryDebateLog, JsonFileDebateLog, PersonaRole,
    SharedDebateOrchestrator,
};
use insight_coordination::generation::{
    ContentGenerator, GenerationError, GenerationResult, QuantityPrediction,
};
use insight_coordination::state::Domain;

/// Helper: scripted generator; fails for `fail_role` if set.
struct ScriptedGenerator {
    fail_role: Option<PersonaRole>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self {
            fail_role: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_at(role: PersonaRole) -> Self {
        Self {
            fail_role: Some(role),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_position(
        &self,
        role: PersonaRole,
        prompt: &str,
    ) -> GenerationResult<DebateRound> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_role == Some(role) {
            return Err(GenerationError::RequestFailed("endpoint timed out".to_string()));
        }
        // The mediator must see both earlier positions
        if role == PersonaRole::Mediator {
            assert!(prompt.contains("optimist position"));
            assert!(prompt.contains("pessimist position"));
        }
        Ok(DebateRound {
            role,
            position: match role {
                PersonaRole::Optimist => "Extend terms to win the contract".to_string(),
                PersonaRole::Pessimist => "Cash runway cannot absorb 90-day terms".to_string(),
                PersonaRole::Mediator => "Offer 60-day terms with early-pay discount".to_string(),
            },
            reasoning: format!("{} reasoning", role),
            evidence: vec!["AR aging report".to_string()],
            confidence: 0.8,
            suggested_actions: vec!["Draft revised terms".to_string()],
        })
    }

    async fn predict_quantity(&self, _prompt: &str) -> GenerationResult<QuantityPrediction> {
        Err(GenerationError::Unavailable("not scripted".to_string()))
    }
}

fn orchestrator(max_active: usize) -> (SharedDebateOrchestrator, SharedMessageBus, Arc<InMemoryDebateLog>) {
    let bus = MessageBus::new().shared();
    let log = Arc::new(InMemoryDebateLog::new());
    let config = DebateConfig {
        max_active_debates: max_active,
        ..Default::default()
    };
    let orch = DebateOrchestrator::new(config, bus.clone(), log.clone()).shared();
    (orch, bus, log)
}

fn round(role: PersonaRole, confidence: f64) -> DebateRound {
    DebateRound {
        role,
        position: format!("{} position", role),
        reasoning: String::new(),
        evidence: vec![],
        confidence,
        suggested_actions: vec![],
    }
}

fn started(admission: DebateAdmission) -> String {
    admission
        .debate_id()
        .expect("debate should have started")
        .to_string()
}

/// Helper: poll until `cond` holds or two seconds pass.
async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Helper: advance a debate through all three rounds.
async fn advance_to_review(orch: &DebateOrchestrator, id: &str) -> DebateRecord {
    let mut record = None;
    for role in PersonaRole::all() {
        record = Some(orch.record_round(id, round(*role, 0.7)).await.unwrap());
    }
    record.unwrap()
}

// ── Admission control ──────────────────────────────────────────────

#[tokio::test]
async fn test_single_slot_admission_queue_and_refusal() {
    let (orch, bus, _log) = orchestrator(1);

    let a = started(
        orch.initiate_debate(DebateRequest::new("finance", "Debate A"))
            .await
            .unwrap(),
    );

    let b = orch
        .initiate_debate(DebateRequest::new("sales", "Debate B"))
        .await
        .unwrap();
    assert_eq!(b, DebateAdmission::Queued { position: 1 });

    let c = orch
        .initiate_debate(DebateRequest::new("inventory", "Debate C").immediate())
        .await;
    assert!(matches!(
        c,
        Err(DebateError::CapacityExceeded { active: 1, max: 1 })
    ));
    assert_eq!(orch.queue_len(), 1);

    // Completion is accepted straight from the thesis phase
    orch.complete_debate(&a, FinalDecision::new("Proceed", "Balanced", 0.7))
        .await
        .unwrap();

    let active = orch.get_all_active_debates();
    assert_eq!(active.len(), 1);
    assert_ne!(active[0].id, a);
    assert_eq!(active[0].topic, "Debate B");
    assert_eq!(active[0].domain, Domain::Sales);
    assert_eq!(orch.queue_len(), 0);

    let started_events = bus.get_messages_by_type(MessageType::DebateStarted, 10);
    assert_eq!(started_events.len(), 2);
    assert_eq!(started_events[0].payload["from_queue"], true);
    assert_eq!(bus.get_messages_by_type(MessageType::DebateQueued, 10).len(), 1);
}

#[tokio::test]
async fn test_cancel_leaves_queued_request_waiting() {
    let (orch, _bus, _log) = orchestrator(1);
    let a = started(
        orch.initiate_debate(DebateRequest::new("finance", "A"))
            .await
            .unwrap(),
    );
    orch.initiate_debate(DebateRequest::new("finance", "B"))
        .await
        .unwrap();

    let cancelled = orch.cancel_debate(&a, "superseded").await.unwrap();
    assert_eq!(cancelled.current_phase, DebatePhase::Cancelled);
    let decision = cancelled.final_decision.unwrap();
    assert_eq!(decision.confidence, 0.0);
    assert!(decision.rationale.contains("superseded"));

    assert_eq!(orch.active_count(), 0);
    assert_eq!(orch.queue_len(), 1);

    // Cancellation terminates like completion in the statistics
    let stats = orch.get_statistics();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.average_confidence, 0.0);
}

// ── Phase progression ──────────────────────────────────────────────

#[tokio::test]
async fn test_rounds_advance_phases_in_order() {
    let (orch, bus, log) = orchestrator(3);
    let id = started(
        orch.initiate_debate(DebateRequest::new("finance", "Extend terms?"))
            .await
            .unwrap(),
    );
    assert_eq!(orch.get_debate(&id).unwrap().current_phase, DebatePhase::Thesis);

    let phases = [
        (PersonaRole::Optimist, DebatePhase::Antithesis),
        (PersonaRole::Pessimist, DebatePhase::Synthesis),
        (PersonaRole::Mediator, DebatePhase::GovernanceReview),
    ];
    for (role, expected) in phases {
        let record = orch.record_round(&id, round(role, 0.6)).await.unwrap();
        assert_eq!(record.current_phase, expected);
    }

    // Reviews do not move the phase
    let record = orch
        .add_governance_review(
            &id,
            GovernanceReview {
                reviewer: "cfo".to_string(),
                approved: true,
                comments: "ok".to_string(),
                concerns: vec![],
                reviewed_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    assert_eq!(record.current_phase, DebatePhase::GovernanceReview);

    let record = orch
        .complete_debate(&id, FinalDecision::new("Extend to 60 days", "", 0.6))
        .await
        .unwrap();
    assert_eq!(record.current_phase, DebatePhase::Complete);
    assert!(record.completed_at.is_some());

    // start + 3 rounds + review + completion
    assert_eq!(log.writes_for(&id).len(), 6);
    assert_eq!(log.latest(&id).unwrap().current_phase, DebatePhase::Complete);
    assert_eq!(
        bus.get_messages_by_type(MessageType::DebateRoundCompleted, 10).len(),
        3
    );

    assert!(matches!(
        orch.record_round(&id, round(PersonaRole::Optimist, 0.5)).await,
        Err(DebateError::InvalidPhase { .. })
    ));
    assert!(matches!(
        orch.record_round("debate-missing", round(PersonaRole::Optimist, 0.5)).await,
        Err(DebateError::NotFound(_))
    ));
}

// ── Statistics ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_zero_review_debate_counts_as_approved() {
    let (orch, _bus, _log) = orchestrator(3);

    let unreviewed = started(
        orch.initiate_debate(DebateRequest::new("finance", "No reviewers"))
            .await
            .unwrap(),
    );
    advance_to_review(&orch, &unreviewed).await;
    orch.complete_debate(&unreviewed, FinalDecision::new("Go", "", 0.9))
        .await
        .unwrap();

    let stats = orch.get_statistics();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.governance_approval_rate, 1.0);
    assert_eq!(stats.reviewed_approval_rate, None);

    let rejected = started(
        orch.initiate_debate(DebateRequest::new("production", "Second shift"))
            .await
            .unwrap(),
    );
    advance_to_review(&orch, &rejected).await;
    orch.add_governance_review(
        &rejected,
        GovernanceReview {
            reviewer: "coo".to_string(),
            approved: false,
            comments: String::new(),
            concerns: vec!["overtime budget".to_string()],
            reviewed_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    orch.complete_debate(&rejected, FinalDecision::new("Hold", "", 0.5))
        .await
        .unwrap();

    let stats = orch.get_statistics();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.governance_approval_rate, 0.5);
    assert_eq!(stats.reviewed_approval_rate, Some(0.0));
    assert!((stats.average_confidence - 0.7).abs() < 1e-9);
    assert_eq!(stats.by_domain.get("production"), Some(&1));
}

// ── Dialectic runner ───────────────────────────────────────────────

#[tokio::test]
async fn test_runner_drives_debate_to_completion() {
    let (orch, bus, _log) = orchestrator(2);
    let generator = Arc::new(ScriptedGenerator::new());
    let runner = DialecticRunner::new(orch.clone(), generator.clone(), bus.clone())
        .with_reviewer(Arc::new(ConfidenceThresholdReviewer::new("risk", 0.6)))
        .with_reviewer(Arc::new(ConfidenceThresholdReviewer::new("strict", 0.95)));

    let outcome = runner
        .run(
            DebateRequest::new("finance", "Extend supplier payment terms?")
                .with_context(serde_json::json!({ "dso": 47 })),
        )
        .await
        .unwrap();

    let DialecticOutcome::Completed { record } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(record.current_phase, DebatePhase::Complete);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    assert_eq!(record.governance_reviews.len(), 2);

    let decision = record.final_decision.as_ref().unwrap();
    assert_eq!(decision.decision, "Offer 60-day terms with early-pay discount");
    // 0.8 synthesis confidence × 1/2 approvals
    assert!((decision.confidence - 0.4).abs() < 1e-9);

    assert_eq!(
        bus.get_messages_by_type(MessageType::GovernanceReviewRequest, 10).len(),
        1
    );
    assert_eq!(
        bus.get_messages_by_type(MessageType::GovernanceReviewResult, 10).len(),
        2
    );
    assert_eq!(orch.active_count(), 0);
}

#[tokio::test]
async fn test_generation_failure_cancels_and_orchestrator_keeps_running() {
    let (orch, bus, _log) = orchestrator(1);
    let runner = DialecticRunner::new(
        orch.clone(),
        Arc::new(ScriptedGenerator::failing_at(PersonaRole::Pessimist)),
        bus.clone(),
    );

    let err = runner
        .run(DebateRequest::new("finance", "Doomed"))
        .await
        .unwrap_err();
    assert!(matches!(err, DebateError::Generation(_)));

    let history = orch.get_history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].current_phase, DebatePhase::Cancelled);
    assert!(history[0].thesis.is_some());
    assert!(history[0].antithesis.is_none());
    assert_eq!(bus.get_messages_by_type(MessageType::DebateCancelled, 10).len(), 1);

    let healthy = DialecticRunner::new(orch.clone(), Arc::new(ScriptedGenerator::new()), bus);
    let outcome = healthy
        .run(DebateRequest::new("finance", "Recovered"))
        .await
        .unwrap();
    assert!(matches!(outcome, DialecticOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_queued_debate_is_driven_once_admitted() {
    let (orch, bus, _log) = orchestrator(1);
    let runner = DialecticRunner::new(orch.clone(), Arc::new(ScriptedGenerator::new()), bus)
        .shared();
    let follow = runner.follow_queue();

    let a = started(
        orch.initiate_debate(DebateRequest::new("finance", "Debate A"))
            .await
            .unwrap(),
    );
    let queued = runner
        .run(DebateRequest::new("sales", "Debate B"))
        .await
        .unwrap();
    assert_eq!(queued, DialecticOutcome::Queued { position: 1 });

    runner.drive(&a).await.unwrap();

    assert!(
        wait_until(|| {
            orch.active_count() == 0
                && orch
                    .get_history(10)
                    .iter()
                    .any(|r| r.topic == "Debate B" && r.current_phase == DebatePhase::Complete)
        })
        .await
    );
    let b = orch
        .get_history(10)
        .into_iter()
        .find(|r| r.topic == "Debate B")
        .unwrap();
    assert!(b.synthesis.is_some());
    assert!(b.final_decision.is_some());

    // Without a follower an admitted debate waits in thesis
    follow.unsubscribe();
    let c = started(
        orch.initiate_debate(DebateRequest::new("finance", "Debate C"))
            .await
            .unwrap(),
    );
    runner
        .run(DebateRequest::new("sales", "Debate D"))
        .await
        .unwrap();
    runner.drive(&c).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let active = orch.get_all_active_debates();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].topic, "Debate D");
    assert_eq!(active[0].current_phase, DebatePhase::Thesis);
}

// ── File-backed log ────────────────────────────────────────────────

#[tokio::test]
async fn test_file_log_holds_latest_state() {
    let dir = tempfile::tempdir().unwrap();
    let bus = MessageBus::new().shared();
    let log = Arc::new(JsonFileDebateLog::new(dir.path()));
    let orch = DebateOrchestrator::new(DebateConfig::default(), bus.clone(), log.clone()).shared();

    let runner = DialecticRunner::new(orch, Arc::new(ScriptedGenerator::new()), bus);
    let DialecticOutcome::Completed { record } = runner
        .run(DebateRequest::new("inventory", "Raise safety stock?"))
        .await
        .unwrap()
    else {
        panic!("expected completion");
    };

    let stored = log.load(&record.id).await.unwrap().unwrap();
    assert_eq!(stored, *record);
    assert!(log.path_for(&record.id).exists());
}
