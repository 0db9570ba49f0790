//! Handles an agent uses to reach the bus, state store and learning registry.

use chrono::Utc;
use tracing::debug;

use crate::bus::{BusResult, Message, MessageTarget, MessageType, OutgoingMessage, SharedMessageBus};
use crate::learning::SharedLearningRegistry;
use crate::state::{Domain, Insight, InsightLevel, SharedStateStore};

/// Optional insight fields. Defaults: info level, 0.8 confidence, actionable.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightOptions {
    pub level: InsightLevel,
    pub confidence: f64,
    pub data: Option<serde_json::Value>,
    pub actionable: bool,
    pub suggested_actions: Vec<String>,
}

impl Default for InsightOptions {
    fn default() -> Self {
        Self {
            level: InsightLevel::Info,
            confidence: 0.8,
            data: None,
            actionable: true,
            suggested_actions: Vec::new(),
        }
    }
}

impl InsightOptions {
    pub fn level(mut self, level: InsightLevel) -> Self {
        self.level = level;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn actionable(mut self, actionable: bool) -> Self {
        self.actionable = actionable;
        self
    }

    pub fn suggested_actions(mut self, actions: Vec<String>) -> Self {
        self.suggested_actions = actions;
        self
    }
}

/// Per-agent view of the shared components.
#[derive(Clone)]
pub struct AgentContext {
    agent_id: String,
    pub bus: SharedMessageBus,
    pub store: SharedStateStore,
    pub learning: SharedLearningRegistry,
}

impl AgentContext {
    pub fn new(
        agent_id: impl Into<String>,
        bus: SharedMessageBus,
        store: SharedStateStore,
        learning: SharedLearningRegistry,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            bus,
            store,
            learning,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Store an insight, record it as a learning output, and broadcast it.
    pub fn publish_insight(
        &self,
        domain: Domain,
        title: &str,
        description: &str,
        options: InsightOptions,
    ) -> BusResult<Insight> {
        let insight = Insight {
            id: Insight::new_id(),
            agent_id: self.agent_id.clone(),
            domain,
            title: title.to_string(),
            description: description.to_string(),
            level: options.level,
            confidence: options.confidence.clamp(0.0, 1.0),
            data: options.data,
            actionable: options.actionable,
            suggested_actions: options.suggested_actions,
            created_at: Utc::now(),
        };
        let payload = serde_json::to_value(&insight).unwrap_or(serde_json::Value::Null);

        self.store.add_insight(insight.clone());
        self.learning
            .record_output(&self.agent_id, &insight.id, payload.clone());
        self.broadcast(MessageType::InsightShare, payload)?;

        debug!(
            agent_id = %self.agent_id,
            insight_id = %insight.id,
            level = %insight.level,
            "Insight published"
        );
        Ok(insight)
    }

    /// Send a message to one agent.
    pub fn send(
        &self,
        target: &str,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> BusResult<Message> {
        self.bus.publish(OutgoingMessage::new(
            self.agent_id.clone(),
            MessageTarget::agent(target),
            message_type,
            payload,
        ))
    }

    /// Send a message to every agent.
    pub fn broadcast(
        &self,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> BusResult<Message> {
        self.bus.publish(OutgoingMessage::new(
            self.agent_id.clone(),
            MessageTarget::Broadcast,
            message_type,
            payload,
        ))
    }
}
