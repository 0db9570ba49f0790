//! Explicit startup context wiring every coordination component.
//!
//! Components are created once here and handed out as shared handles; no
//! component is a process-wide global.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::agent::{Agent, AgentContext, AgentRunner, AgentStatusReport, SharedAgentRunner};
use crate::bus::{BusResult, MessageBus, MessageTarget, MessageType, OutgoingMessage, SharedMessageBus};
use crate::config::CoordinationConfig;
use crate::debate::{
    DebateOrchestrator, DialecticRunner, JsonFileDebateLog, NoopDebateLog,
    SharedDebateOrchestrator, SharedDurableLog,
};
use crate::generation::SharedContentGenerator;
use crate::learning::{CoachingFeedback, FeedbackType, LearningRegistry, SharedLearningRegistry};
use crate::state::{SharedStateStore, StateStore};

/// Bus source id for coaching feedback.
pub const LEARNING_SOURCE_ID: &str = "learning-registry";

pub struct CoordinationContext {
    config: CoordinationConfig,
    pub bus: SharedMessageBus,
    pub store: SharedStateStore,
    pub learning: SharedLearningRegistry,
    pub orchestrator: SharedDebateOrchestrator,
    agents: Mutex<Vec<SharedAgentRunner>>,
}

impl CoordinationContext {
    /// Build from config. The debate log writes JSON files when
    /// `debate.log_dir` is set and is a no-op otherwise.
    pub fn new(config: CoordinationConfig) -> Self {
        let log: SharedDurableLog = match &config.debate.log_dir {
            Some(dir) => Arc::new(JsonFileDebateLog::new(dir.clone())),
            None => Arc::new(NoopDebateLog),
        };
        Self::with_log(config, log)
    }

    pub fn with_log(config: CoordinationConfig, log: SharedDurableLog) -> Self {
        let bus = MessageBus::with_history_limit(config.bus.history_limit).shared();
        let store = StateStore::with_insight_capacity(config.state.insight_capacity).shared();
        let learning = LearningRegistry::with_config(config.learning.clone()).shared();
        let orchestrator =
            DebateOrchestrator::new(config.debate.clone(), bus.clone(), log).shared();

        info!(
            max_active_debates = config.debate.max_active_debates,
            history_limit = config.bus.history_limit,
            insight_capacity = config.state.insight_capacity,
            "Coordination context initialised"
        );

        Self {
            config,
            bus,
            store,
            learning,
            orchestrator,
            agents: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    /// Handles for an agent that is not run through [`spawn_agent`](Self::spawn_agent).
    pub fn agent_context(&self, agent_id: &str) -> AgentContext {
        AgentContext::new(
            agent_id,
            self.bus.clone(),
            self.store.clone(),
            self.learning.clone(),
        )
    }

    /// Wrap `agent` in a runner, start it and keep it for status queries.
    /// Must be called from within a tokio runtime.
    pub fn spawn_agent(&self, agent: Box<dyn Agent>) -> BusResult<SharedAgentRunner> {
        let runner = AgentRunner::new(
            agent,
            self.bus.clone(),
            self.store.clone(),
            self.learning.clone(),
        )
        .shared();
        runner.start()?;
        lock(&self.agents).push(Arc::clone(&runner));
        Ok(runner)
    }

    pub fn agent(&self, agent_id: &str) -> Option<SharedAgentRunner> {
        lock(&self.agents)
            .iter()
            .find(|r| r.id() == agent_id)
            .cloned()
    }

    pub fn agent_statuses(&self) -> Vec<AgentStatusReport> {
        lock(&self.agents).iter().map(|r| r.status()).collect()
    }

    pub fn stop_all(&self) {
        for runner in lock(&self.agents).iter() {
            runner.stop();
        }
    }

    /// Ingest human feedback on an insight. A failing verdict may trigger
    /// coaching for the agent that produced it.
    pub fn record_feedback(
        &self,
        insight_id: &str,
        feedback_type: FeedbackType,
        correction: Option<String>,
    ) -> BusResult<bool> {
        if !self
            .learning
            .record_feedback(insight_id, feedback_type, correction)
        {
            return Ok(false);
        }
        if feedback_type.is_failure() {
            if let Some(record) = self.learning.record_for_insight(insight_id) {
                self.coach_if_needed(&record.agent_id)?;
            }
        }
        Ok(true)
    }

    /// Send coaching feedback to `agent_id` if its performance calls for it.
    pub fn coach_if_needed(&self, agent_id: &str) -> BusResult<Option<CoachingFeedback>> {
        let Some(feedback) = self.learning.generate_coaching_feedback(agent_id) else {
            debug!(agent_id, "No coaching needed");
            return Ok(None);
        };

        self.bus.publish(OutgoingMessage::new(
            LEARNING_SOURCE_ID,
            MessageTarget::agent(agent_id),
            MessageType::CoachingFeedback,
            serde_json::to_value(&feedback).unwrap_or_default(),
        ))?;
        info!(
            agent_id,
            metric = %feedback.metric,
            score = feedback.current_score,
            "Coaching feedback sent"
        );
        Ok(Some(feedback))
    }

    /// Dialectic runner over this context's orchestrator and bus.
    pub fn dialectic_runner(&self, generator: SharedContentGenerator) -> DialecticRunner {
        DialecticRunner::new(self.orchestrator.clone(), generator, self.bus.clone())
    }
}

impl Default for CoordinationContext {
    fn default() -> Self {
        Self::new(CoordinationConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
