//! Dialectical debate protocol
//!
//! A domain team's trio (optimist, pessimist, mediator) debates one topic
//! through thesis → antithesis → synthesis → governance review → complete.
//! The orchestrator owns admission control (concurrency cap plus FIFO
//! queue), phase advancement and history; the dialectic runner drives a
//! debate through it with a content generator and governance reviewers.

pub mod dialectic;
pub mod orchestrator;
pub mod persistence;
pub mod state;
pub mod stats;

pub use dialectic::{
    final_decision, ConfidenceThresholdReviewer, DialecticOutcome, DialecticRunner,
    GovernanceReviewer, SharedDialecticRunner, SharedGovernanceReviewer,
};
pub use orchestrator::{
    DebateAdmission, DebateConfig, DebateError, DebateOrchestrator, DebateResult,
    SharedDebateOrchestrator, ORCHESTRATOR_ID,
};
pub use persistence::{
    DurableLog, DurableLogError, DurableLogResult, InMemoryDebateLog, JsonFileDebateLog,
    NoopDebateLog, SharedDurableLog,
};
pub use state::{
    domain_for_team, DebatePhase, DebateRecord, DebateRequest, DebateRound, FinalDecision,
    GovernanceReview, PersonaRole,
};
pub use stats::DebateStatistics;
