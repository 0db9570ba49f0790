//! Insight Coordination Library
//!
//! Multi-agent coordination for business-insight agents:
//! - An in-process message bus with agent, broadcast, type and wildcard channels
//! - A capability contract and lifecycle wrapper for domain agents
//! - A shared state store with per-domain slices and a bounded insight buffer
//! - A learning registry that turns human feedback into coaching
//! - A dialectical debate orchestrator with admission control and queuing
//!
//! # Components
//!
//! ## Bus (`bus`)
//! - `publish`: stamp id + timestamp, record history, deliver synchronously
//! - `subscribe_agent` / `subscribe_type` / `subscribe_all`
//!
//! ## Agents (`agent`, `agents`)
//! - `AgentRunner`: start/stop, task replies, coaching bookkeeping
//! - `FinanceScout`, `InventoryForecaster`, `PersonaAgent`
//!
//! ## Debate (`debate`)
//! - `DebateOrchestrator`: thesis → antithesis → synthesis → governance review → complete
//! - `DialecticRunner`: drives a debate with a content generator and reviewers
//!
//! # Usage
//!
//! ```bash
//! # Run one debate end to end against an OpenAI-compatible endpoint
//! insight-coordination run-debate --team finance --topic "Extend supplier payment terms?"
//!
//! # Print the effective configuration
//! COORD_MAX_ACTIVE_DEBATES=5 insight-coordination show-config
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod agent;
pub mod agents;
pub mod bus;
pub mod config;
pub mod context;
pub mod debate;
pub mod generation;
pub mod learning;
pub mod state;
pub mod telemetry;

// Re-export key bus types
pub use bus::{
    BusError, BusResult, Message, MessageBus, MessageTarget, MessageType, OutgoingMessage,
    Priority, SharedMessageBus, Subscription,
};

// Re-export key agent types
pub use agent::{
    Agent, AgentContext, AgentError, AgentResult, AgentRunner, AgentStatus, AgentStatusReport,
    InsightOptions, SharedAgentRunner, Task, TaskResult,
};
pub use agents::{FinanceScout, InventoryForecaster, PersonaAgent};

// Re-export key state types
pub use state::{Domain, Insight, InsightLevel, SharedStateStore, StateSnapshot, StateStore};

// Re-export key learning types
pub use learning::{
    AgentPerformance, CoachingFeedback, CoachingMetric, FeedbackType, LearningConfig,
    LearningRegistry, SharedLearningRegistry,
};

// Re-export key debate types
pub use debate::{
    DebateAdmission, DebateConfig, DebateError, DebateOrchestrator, DebatePhase, DebateRecord,
    DebateRequest, DebateResult, DebateRound, DebateStatistics, DialecticOutcome,
    DialecticRunner, FinalDecision, GovernanceReview, GovernanceReviewer, PersonaRole,
    SharedDebateOrchestrator, SharedDialecticRunner,
};

// Re-export generation types
pub use generation::{
    ContentGenerator, GenerationConfig, GenerationError, GenerationResult, HttpGenerator,
    SharedContentGenerator,
};

pub use config::CoordinationConfig;
pub use context::CoordinationContext;
