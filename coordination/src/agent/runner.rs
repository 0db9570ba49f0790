//! Lifecycle wrapper shared by every agent implementation.
//!
//! `start` subscribes the agent to its own channel and the broadcast channel
//! and spawns a single worker that drains an unbounded queue, so the
//! implementation is only ever driven by one task at a time. Failures inside
//! `process` (errors and panics alike) are turned into a failed
//! [`TaskResult`] sent back to the requester; none escape the runner.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn, Instrument};

use super::context::AgentContext;
use super::types::{AgentError, AgentState, AgentStatus, AgentStatusReport, Task, TaskResult};
use super::Agent;
use crate::bus::{
    BusResult, Message, MessageTarget, MessageType, OutgoingMessage, SharedMessageBus,
    Subscription,
};
use crate::learning::{CoachingFeedback, SharedLearningRegistry};
use crate::state::SharedStateStore;
use crate::telemetry;

/// Shared reference to AgentRunner
pub type SharedAgentRunner = Arc<AgentRunner>;

/// Wraps an [`Agent`] with lifecycle, counters and bus plumbing.
pub struct AgentRunner {
    id: String,
    capabilities: Vec<String>,
    agent: AsyncMutex<Box<dyn Agent>>,
    ctx: AgentContext,
    state: Mutex<AgentState>,
    subscription: Mutex<Option<Subscription>>,
}

impl AgentRunner {
    pub fn new(
        agent: Box<dyn Agent>,
        bus: SharedMessageBus,
        store: SharedStateStore,
        learning: SharedLearningRegistry,
    ) -> Self {
        let id = agent.id().to_string();
        let capabilities = agent.capabilities();
        Self {
            ctx: AgentContext::new(id.clone(), bus, store, learning),
            state: Mutex::new(AgentState::new(&id)),
            id,
            capabilities,
            agent: AsyncMutex::new(agent),
            subscription: Mutex::new(None),
        }
    }

    pub fn shared(self) -> SharedAgentRunner {
        Arc::new(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Subscribe to the bus and spawn the worker. Must be called from within
    /// a tokio runtime. Starting a running agent is a no-op.
    pub fn start(self: &Arc<Self>) -> BusResult<()> {
        let mut slot = lock(&self.subscription);
        if slot.is_some() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let subscription = self.ctx.bus.subscribe_agent(&self.id, move |message| {
            // Closed only after stop; late deliveries are dropped
            let _ = tx.send(message.clone());
        })?;
        *slot = Some(subscription);
        drop(slot);

        self.update_state(|s| s.status = AgentStatus::Idle);

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                runner.handle_message(&message).await;
            }
            debug!(agent_id = %runner.id, "Agent worker exited");
        });

        info!(agent_id = %self.id, capabilities = ?self.capabilities, "Agent started");
        Ok(())
    }

    /// Unsubscribe from the bus and mark the agent stopped. Messages still
    /// queued for the worker are discarded.
    pub fn stop(&self) {
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.unsubscribe();
        }
        self.update_state(|s| s.status = AgentStatus::Stopped);
        info!(agent_id = %self.id, "Agent stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    pub fn status(&self) -> AgentStatusReport {
        let state = lock(&self.state).clone();
        AgentStatusReport {
            success_rate: state.success_rate(),
            state,
            capabilities: self.capabilities.clone(),
        }
    }

    /// Dispatch one delivered message. Called by the worker; public so
    /// callers can drive the agent deterministically.
    pub async fn handle_message(&self, message: &Message) {
        if lock(&self.state).status == AgentStatus::Stopped {
            debug!(agent_id = %self.id, message_id = %message.id, "Dropping message for stopped agent");
            return;
        }

        match message.message_type {
            MessageType::TaskAssignment => self.run_task(message).await,
            MessageType::CoachingFeedback => self.run_coaching(message).await,
            MessageType::InsightShare if message.source != self.id => {
                self.agent
                    .lock()
                    .await
                    .on_insight_share(message, &self.ctx)
                    .await;
            }
            MessageType::DataRequest if message.source != self.id => {
                let response = self
                    .agent
                    .lock()
                    .await
                    .on_data_request(message, &self.ctx)
                    .await;
                if let Some(payload) = response {
                    self.reply(message, MessageType::DataResponse, payload);
                }
            }
            _ => {}
        }
    }

    async fn run_task(&self, message: &Message) {
        let parsed: Result<Task, AgentError> = serde_json::from_value(message.payload.clone())
            .map_err(|e| AgentError::InvalidTask(e.to_string()));
        let task_id = parsed
            .as_ref()
            .map(|t| t.id.clone())
            .unwrap_or_else(|_| message.id.clone());

        self.update_state(|s| {
            s.status = AgentStatus::Processing;
            s.current_task = Some(task_id.clone());
            s.last_activity = Some(Utc::now());
        });

        let span = telemetry::agent_task_span(&self.id, &task_id);
        let start = Instant::now();

        let outcome = match parsed {
            Ok(task) => {
                let mut agent = self.agent.lock().await;
                let run = AssertUnwindSafe(agent.process(&task, &self.ctx)).catch_unwind();
                match run.instrument(span.clone()).await {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::Processing("agent panicked while processing".to_string())),
                }
            }
            Err(e) => Err(e),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(output) => {
                debug!(agent_id = %self.id, task_id = %task_id, elapsed_ms, "Task succeeded");
                TaskResult::success(&task_id, &self.id, output, elapsed_ms)
            }
            Err(e) => {
                warn!(agent_id = %self.id, task_id = %task_id, error = %e, "Task failed");
                self.update_state(|s| s.status = AgentStatus::Error);
                TaskResult::failure(&task_id, &self.id, e.to_string(), elapsed_ms)
            }
        };

        self.update_state(|s| {
            s.processed_count += 1;
            if result.success {
                s.successful_count += 1;
            }
            s.total_processing_time_ms += elapsed_ms;
            s.current_task = None;
            s.last_activity = Some(Utc::now());
            if s.status != AgentStatus::Stopped {
                s.status = AgentStatus::Idle;
            }
        });
        telemetry::record_agent_task_result(&span, result.success, elapsed_ms);

        let payload = serde_json::to_value(&result).unwrap_or(serde_json::Value::Null);
        self.reply(message, MessageType::TaskResult, payload);
    }

    async fn run_coaching(&self, message: &Message) {
        let feedback: CoachingFeedback = match serde_json::from_value(message.payload.clone()) {
            Ok(feedback) => feedback,
            Err(e) => {
                warn!(agent_id = %self.id, error = %e, "Malformed coaching feedback ignored");
                return;
            }
        };
        if feedback.agent_id != self.id {
            return;
        }

        let adjustments = self.agent.lock().await.apply_coaching(&feedback);
        if adjustments.is_empty() {
            debug!(agent_id = %self.id, metric = %feedback.metric, "Coaching produced no adjustments");
            return;
        }

        let stamped = self
            .ctx
            .learning
            .record_coaching(&self.id, adjustments.clone());
        info!(
            agent_id = %self.id,
            metric = %feedback.metric,
            score = feedback.current_score,
            stamped,
            adjustments = ?adjustments,
            "Coaching applied"
        );
    }

    fn reply(&self, request: &Message, message_type: MessageType, payload: serde_json::Value) {
        let correlation = request
            .correlation_id
            .clone()
            .unwrap_or_else(|| request.id.clone());
        let outgoing = OutgoingMessage::new(
            self.id.clone(),
            MessageTarget::agent(request.source.clone()),
            message_type,
            payload,
        )
        .with_priority(request.priority)
        .with_correlation(correlation);

        if let Err(e) = self.ctx.bus.publish(outgoing) {
            warn!(agent_id = %self.id, error = %e, "Failed to send reply");
        }
    }

    fn update_state(&self, f: impl FnOnce(&mut AgentState)) {
        f(&mut lock(&self.state));
    }
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRunner")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("state", &*lock(&self.state))
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentResult;
    use crate::bus::MessageBus;
    use crate::learning::{CoachingMetric, FeedbackType, LearningRegistry};
    use crate::state::StateStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedAgent {
        coaching_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn id(&self) -> &str {
            "scripted"
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["echo".to_string()]
        }

        async fn process(&mut self, task: &Task, _ctx: &AgentContext) -> AgentResult<serde_json::Value> {
            match task.task_type.as_str() {
                "echo" => Ok(task.payload.clone()),
                "panic" => panic!("boom"),
                other => Err(AgentError::Processing(format!("cannot {}", other))),
            }
        }

        fn apply_coaching(&mut self, _feedback: &CoachingFeedback) -> Vec<String> {
            self.coaching_calls.fetch_add(1, Ordering::SeqCst);
            vec!["threshold 0.5 -> 0.6".to_string()]
        }
    }

    fn runner() -> (AgentRunner, SharedMessageBus, Arc<AtomicUsize>) {
        let bus = MessageBus::new().shared();
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = AgentRunner::new(
            Box::new(ScriptedAgent {
                coaching_calls: calls.clone(),
            }),
            bus.clone(),
            StateStore::new().shared(),
            LearningRegistry::new().shared(),
        );
        (runner, bus, calls)
    }

    fn assignment(task_type: &str) -> Message {
        Message::stamp(OutgoingMessage::new(
            "scheduler",
            MessageTarget::agent("scripted"),
            MessageType::TaskAssignment,
            serde_json::to_value(Task::new(task_type, serde_json::json!({"n": 1}))).unwrap(),
        ))
    }

    fn last_result(bus: &MessageBus) -> TaskResult {
        let msg = &bus.get_messages_by_type(MessageType::TaskResult, 1)[0];
        assert_eq!(msg.target, MessageTarget::agent("scheduler"));
        serde_json::from_value(msg.payload.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_success_replies_and_counts() {
        let (runner, bus, _) = runner();
        runner.handle_message(&assignment("echo")).await;

        let result = last_result(&bus);
        assert!(result.success);
        assert_eq!(result.output.unwrap()["n"], 1);

        let status = runner.status();
        assert_eq!(status.state.status, AgentStatus::Idle);
        assert_eq!(status.state.processed_count, 1);
        assert_eq!(status.success_rate, 100);
        assert!(status.state.current_task.is_none());
    }

    #[tokio::test]
    async fn test_failures_are_contained() {
        let (runner, bus, _) = runner();
        runner.handle_message(&assignment("explode")).await;
        let result = last_result(&bus);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("cannot explode"));

        runner.handle_message(&assignment("panic")).await;
        assert!(!last_result(&bus).success);

        let mut bad = assignment("echo");
        bad.payload = serde_json::json!({"nope": true});
        runner.handle_message(&bad).await;
        assert!(last_result(&bus).error.unwrap().contains("Invalid task"));

        runner.handle_message(&assignment("echo")).await;
        let status = runner.status();
        assert_eq!(status.state.processed_count, 4);
        assert_eq!(status.state.successful_count, 1);
        assert_eq!(status.success_rate, 25);
        assert_eq!(status.state.status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_success_rate_rounds_to_nearest_percent() {
        let (runner, _bus, _) = runner();
        let runner = runner.shared();
        runner.start().unwrap();
        let status = runner.status();
        assert_eq!(status.state.status, AgentStatus::Idle);
        assert_eq!(status.state.processed_count, 0);
        assert_eq!(status.success_rate, 100);

        runner.handle_message(&assignment("echo")).await;
        for _ in 0..5 {
            runner.handle_message(&assignment("explode")).await;
        }
        // 1/6 = 16.7%
        assert_eq!(runner.status().success_rate, 17);

        runner.handle_message(&assignment("echo")).await;
        // 2/7 = 28.6%
        assert_eq!(runner.status().success_rate, 29);
        runner.stop();
    }

    #[tokio::test]
    async fn test_coaching_is_recorded_in_learning_registry() {
        let (runner, _bus, calls) = runner();
        let learning = runner.context().learning.clone();
        for i in 0..3 {
            let insight = format!("i{}", i);
            learning.record_output("scripted", &insight, serde_json::Value::Null);
            learning.record_feedback(&insight, FeedbackType::Dismissed, None);
        }

        let feedback = CoachingFeedback {
            agent_id: "scripted".to_string(),
            metric: CoachingMetric::UserAcceptance,
            current_score: 0,
            benchmark: 80,
            suggestion: "fewer alerts".to_string(),
            examples: vec![],
            generated_at: Utc::now(),
        };
        let message = Message::stamp(OutgoingMessage::new(
            "coach",
            MessageTarget::agent("scripted"),
            MessageType::CoachingFeedback,
            serde_json::to_value(&feedback).unwrap(),
        ));
        runner.handle_message(&message).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let coached = learning
            .records_for_agent("scripted", 10)
            .into_iter()
            .filter(|r| r.coaching.is_some())
            .count();
        assert_eq!(coached, 3);

        // Feedback addressed to another agent is ignored
        let mut other = feedback.clone();
        other.agent_id = "someone-else".to_string();
        let message = Message::stamp(OutgoingMessage::new(
            "coach",
            MessageTarget::Broadcast,
            MessageType::CoachingFeedback,
            serde_json::to_value(&other).unwrap(),
        ));
        runner.handle_message(&message).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop_through_bus() {
        let (runner, bus, _) = runner();
        let runner = runner.shared();
        runner.start().unwrap();
        runner.start().unwrap();
        assert!(runner.is_running());
        assert_eq!(bus.listener_count(), 2);

        bus.publish(OutgoingMessage::new(
            "scheduler",
            MessageTarget::agent("scripted"),
            MessageType::TaskAssignment,
            serde_json::to_value(Task::new("echo", serde_json::json!({}))).unwrap(),
        ))
        .unwrap();

        for _ in 0..100 {
            if runner.status().state.processed_count == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(runner.status().state.processed_count, 1);

        runner.stop();
        assert!(!runner.is_running());
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(runner.status().state.status, AgentStatus::Stopped);

        runner.handle_message(&assignment("echo")).await;
        assert_eq!(runner.status().state.processed_count, 1);
    }
}
