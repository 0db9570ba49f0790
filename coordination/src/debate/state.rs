//! Debate state machine: phases, rounds, reviews, and the debate record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::Priority;
use crate::state::Domain;

/// Phase of a dialectical debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    /// Waiting for the optimist's opening position.
    Thesis,
    /// Waiting for the pessimist's counter-position.
    Antithesis,
    /// Waiting for the mediator to reconcile both.
    Synthesis,
    /// Governance reviewers are evaluating the synthesis.
    GovernanceReview,
    /// Final decision recorded.
    Complete,
    /// Stopped before completion.
    Cancelled,
}

impl DebatePhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }

    /// Valid transitions from this phase. Phases only move forward; any
    /// active phase may end in `Complete` or `Cancelled`.
    pub fn valid_transitions(self) -> &'static [DebatePhase] {
        match self {
            Self::Thesis => &[Self::Antithesis, Self::Complete, Self::Cancelled],
            Self::Antithesis => &[Self::Synthesis, Self::Complete, Self::Cancelled],
            Self::Synthesis => &[Self::GovernanceReview, Self::Complete, Self::Cancelled],
            Self::GovernanceReview => &[Self::Complete, Self::Cancelled],
            Self::Complete | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: DebatePhase) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Persona expected to speak in this phase, for the three round phases.
    pub fn speaker(self) -> Option<PersonaRole> {
        match self {
            Self::Thesis => Some(PersonaRole::Optimist),
            Self::Antithesis => Some(PersonaRole::Pessimist),
            Self::Synthesis => Some(PersonaRole::Mediator),
            _ => None,
        }
    }

    /// Phase reached once this phase's round is recorded.
    pub fn after_round(self) -> Option<DebatePhase> {
        match self {
            Self::Thesis => Some(Self::Antithesis),
            Self::Antithesis => Some(Self::Synthesis),
            Self::Synthesis => Some(Self::GovernanceReview),
            _ => None,
        }
    }
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thesis => write!(f, "thesis"),
            Self::Antithesis => write!(f, "antithesis"),
            Self::Synthesis => write!(f, "synthesis"),
            Self::GovernanceReview => write!(f, "governance_review"),
            Self::Complete => write!(f, "complete"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Persona in a domain team's trio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    /// Argues the upside (thesis).
    Optimist,
    /// Argues the risks (antithesis).
    Pessimist,
    /// Reconciles both (synthesis).
    Mediator,
}

impl PersonaRole {
    pub fn all() -> &'static [PersonaRole] {
        &[Self::Optimist, Self::Pessimist, Self::Mediator]
    }

    /// Phase in which this persona speaks.
    pub fn phase(self) -> DebatePhase {
        match self {
            Self::Optimist => DebatePhase::Thesis,
            Self::Pessimist => DebatePhase::Antithesis,
            Self::Mediator => DebatePhase::Synthesis,
        }
    }
}

impl std::fmt::Display for PersonaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimist => write!(f, "optimist"),
            Self::Pessimist => write!(f, "pessimist"),
            Self::Mediator => write!(f, "mediator"),
        }
    }
}

/// One persona's contribution to a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRound {
    pub role: PersonaRole,
    pub position: String,
    pub reasoning: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
}

/// A governance reviewer's verdict on a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceReview {
    pub reviewer: String,
    pub approved: bool,
    pub comments: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concerns: Vec<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// The outcome a debate terminates with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub decision: String,
    pub rationale: String,
    /// Confidence in [0, 1]. Zero for cancelled debates.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

impl FinalDecision {
    pub fn new(decision: impl Into<String>, rationale: impl Into<String>, confidence: f64) -> Self {
        Self {
            decision: decision.into(),
            rationale: rationale.into(),
            confidence: confidence.clamp(0.0, 1.0),
            suggested_actions: Vec::new(),
            decided_at: Utc::now(),
        }
    }

    /// Zero-confidence decision recorded when a debate is cancelled.
    pub fn cancelled(reason: &str) -> Self {
        Self::new(format!("Cancelled: {}", reason), reason, 0.0)
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.suggested_actions = actions;
        self
    }
}

/// A request to run a debate, as handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRequest {
    pub team: String,
    pub topic: String,
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default)]
    pub priority: Priority,
    /// Fail instead of queueing when the concurrency cap is reached.
    #[serde(default)]
    pub immediate: bool,
}

impl DebateRequest {
    pub fn new(team: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            topic: topic.into(),
            context: serde_json::Value::Null,
            priority: Priority::Normal,
            immediate: false,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// Full state of one debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRecord {
    pub id: String,
    pub domain: Domain,
    pub team: String,
    pub topic: String,
    pub context: serde_json::Value,
    pub priority: Priority,
    pub current_phase: DebatePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thesis: Option<DebateRound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antithesis: Option<DebateRound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<DebateRound>,
    #[serde(default)]
    pub governance_reviews: Vec<GovernanceReview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<FinalDecision>,
    /// 1 + earlier debates in history sharing this (topic, team).
    pub version: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DebateRecord {
    /// Create a record in the thesis phase.
    pub fn new(id: String, request: DebateRequest, domain: Domain, version: u32) -> Self {
        Self {
            id,
            domain,
            team: request.team,
            topic: request.topic,
            context: request.context,
            priority: request.priority,
            current_phase: DebatePhase::Thesis,
            thesis: None,
            antithesis: None,
            synthesis: None,
            governance_reviews: Vec::new(),
            final_decision: None,
            version,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn new_id() -> String {
        format!("debate-{}", Uuid::new_v4())
    }

    pub fn is_active(&self) -> bool {
        !self.current_phase.is_terminal()
    }

    /// The round recorded for a persona, if any.
    pub fn round(&self, role: PersonaRole) -> Option<&DebateRound> {
        match role {
            PersonaRole::Optimist => self.thesis.as_ref(),
            PersonaRole::Pessimist => self.antithesis.as_ref(),
            PersonaRole::Mediator => self.synthesis.as_ref(),
        }
    }

    pub(crate) fn round_slot(&mut self, role: PersonaRole) -> &mut Option<DebateRound> {
        match role {
            PersonaRole::Optimist => &mut self.thesis,
            PersonaRole::Pessimist => &mut self.antithesis,
            PersonaRole::Mediator => &mut self.synthesis,
        }
    }

    /// True when every recorded review approved; vacuously true with none.
    pub fn all_reviews_approved(&self) -> bool {
        self.governance_reviews.iter().all(|r| r.approved)
    }

    /// Wall-clock duration, for terminated debates.
    pub fn duration_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Static team → domain table. Unknown teams map to [`Domain::General`].
pub fn domain_for_team(team: &str) -> Domain {
    match team.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "finance" | "accounting" | "treasury" => Domain::Finance,
        "inventory" | "procurement" | "supply_chain" => Domain::Inventory,
        "production" | "manufacturing" => Domain::Production,
        "sales" | "marketing" => Domain::Sales,
        _ => Domain::General,
    }
}
