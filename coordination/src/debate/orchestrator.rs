//! Debate orchestrator: admission control, phase advancement, and history.
//!
//! Active debates, the FIFO admission queue and the bounded history live
//! behind one synchronous mutex that is never held across an await. Every
//! mutating operation additionally holds the debate's own async lock until
//! its durable-log write has finished, so operations on one debate are
//! serialised and their log writes land in operation order.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::persistence::SharedDurableLog;
use super::state::{
    domain_for_team, DebatePhase, DebateRecord, DebateRequest, DebateRound, FinalDecision,
    GovernanceReview,
};
use super::stats::DebateStatistics;
use crate::bus::{MessageTarget, MessageType, OutgoingMessage, SharedMessageBus};
use crate::generation::GenerationError;

/// Bus source id used for debate lifecycle events.
pub const ORCHESTRATOR_ID: &str = "debate-orchestrator";

/// Configuration for the debate orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    /// Concurrency cap on active debates.
    pub max_active_debates: usize,
    /// Terminated debates retained, newest first.
    pub history_capacity: usize,
    /// Queue bound. `None` leaves the queue unbounded.
    pub max_queue_len: Option<usize>,
    /// Characters of context JSON included in prompts.
    pub context_char_limit: usize,
    /// Directory for the JSON file log. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// Let `cancel_debate` admit a queued request the way completion does.
    /// Off by default: a cancelled debate's slot is refilled by the next
    /// completion.
    pub admit_on_cancel: bool,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_active_debates: 3,
            history_capacity: 100,
            max_queue_len: None,
            context_char_limit: 2_000,
            log_dir: None,
            admit_on_cancel: false,
        }
    }
}

/// Error from the debate orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DebateError {
    #[error("Debate not found: {0}")]
    NotFound(String),

    #[error("Debate capacity exceeded: {active}/{max} active")]
    CapacityExceeded { active: usize, max: usize },

    #[error("Debate queue full: {0} requests waiting")]
    QueueFull(usize),

    #[error("Debate {debate_id} is in phase {actual}, expected {expected}")]
    InvalidPhase {
        debate_id: String,
        expected: String,
        actual: DebatePhase,
    },

    #[error("Invalid debate request: {0}")]
    Validation(String),

    #[error("Content generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Result type for debate operations.
pub type DebateResult<T> = Result<T, DebateError>;

/// Outcome of [`DebateOrchestrator::initiate_debate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum DebateAdmission {
    /// Admitted immediately under this id.
    Started { debate_id: String },
    /// Waiting for a free slot at this 1-based queue position.
    Queued { position: usize },
}

impl DebateAdmission {
    pub fn debate_id(&self) -> Option<&str> {
        match self {
            Self::Started { debate_id } => Some(debate_id),
            Self::Queued { .. } => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

/// Shared reference to DebateOrchestrator
pub type SharedDebateOrchestrator = Arc<DebateOrchestrator>;

#[derive(Default)]
struct Inner {
    active: HashMap<String, DebateRecord>,
    queue: VecDeque<DebateRequest>,
    history: VecDeque<DebateRecord>,
}

/// Runs debates through thesis → antithesis → synthesis → governance review
/// → complete, bounded by a concurrency cap and a FIFO queue.
pub struct DebateOrchestrator {
    config: DebateConfig,
    bus: SharedMessageBus,
    log: SharedDurableLog,
    inner: Mutex<Inner>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DebateOrchestrator {
    pub fn new(config: DebateConfig, bus: SharedMessageBus, log: SharedDurableLog) -> Self {
        Self {
            config,
            bus,
            log,
            inner: Mutex::new(Inner::default()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared(self) -> SharedDebateOrchestrator {
        Arc::new(self)
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Start a debate, queue it, or refuse it.
    ///
    /// With the cap reached, `immediate` requests fail with
    /// [`DebateError::CapacityExceeded`]; others join the FIFO queue unless
    /// a configured queue bound is hit.
    pub async fn initiate_debate(&self, request: DebateRequest) -> DebateResult<DebateAdmission> {
        if request.team.trim().is_empty() {
            return Err(DebateError::Validation("team must not be empty".to_string()));
        }
        if request.topic.trim().is_empty() {
            return Err(DebateError::Validation("topic must not be empty".to_string()));
        }

        let id = DebateRecord::new_id();
        let lock = self.create_lock(&id);
        let _guard = lock.lock().await;

        let admitted = {
            let mut inner = self.lock_inner();
            let active = inner.active.len();
            if active >= self.config.max_active_debates {
                if request.immediate {
                    drop(inner);
                    self.remove_lock(&id);
                    warn!(
                        team = %request.team,
                        active,
                        max = self.config.max_active_debates,
                        "Immediate debate refused at capacity"
                    );
                    return Err(DebateError::CapacityExceeded {
                        active,
                        max: self.config.max_active_debates,
                    });
                }
                if let Some(max) = self.config.max_queue_len {
                    if inner.queue.len() >= max {
                        drop(inner);
                        self.remove_lock(&id);
                        warn!(team = %request.team, queued = max, "Debate queue full");
                        return Err(DebateError::QueueFull(max));
                    }
                }
                inner.queue.push_back(request.clone());
                Err(inner.queue.len())
            } else {
                Ok(self.insert_active(&mut inner, id.clone(), request.clone()))
            }
        };

        match admitted {
            Ok(record) => {
                self.announce_started(&record, false).await;
                Ok(DebateAdmission::Started { debate_id: id })
            }
            Err(position) => {
                self.remove_lock(&id);
                info!(team = %request.team, topic = %request.topic, position, "Debate queued");
                self.emit(
                    MessageType::DebateQueued,
                    None,
                    json!({
                        "team": request.team,
                        "topic": request.topic,
                        "priority": request.priority,
                        "position": position,
                    }),
                );
                Ok(DebateAdmission::Queued { position })
            }
        }
    }

    /// Record the current phase's round and advance to the next phase.
    ///
    /// The round's persona must match the phase: optimist for thesis,
    /// pessimist for antithesis, mediator for synthesis.
    pub async fn record_round(&self, id: &str, round: DebateRound) -> DebateResult<DebateRecord> {
        let lock = self.existing_lock(id)?;
        let _guard = lock.lock().await;

        let record = {
            let mut inner = self.lock_inner();
            let record = self.active_mut(&mut inner, id)?;
            let phase = record.current_phase;
            let next = match (phase.speaker(), phase.after_round()) {
                (Some(speaker), Some(next)) if speaker == round.role => next,
                _ => {
                    return Err(DebateError::InvalidPhase {
                        debate_id: id.to_string(),
                        expected: round.role.phase().to_string(),
                        actual: phase,
                    })
                }
            };
            let role = round.role;
            *record.round_slot(role) = Some(round);
            record.current_phase = next;
            record.clone()
        };

        info!(
            debate_id = %id,
            phase = %record.current_phase,
            "Debate round recorded"
        );
        self.persist_update(&record).await;
        self.emit(
            MessageType::DebateRoundCompleted,
            Some(id),
            event_payload(&record),
        );
        Ok(record)
    }

    /// Append a governance review. The phase does not change.
    pub async fn add_governance_review(
        &self,
        id: &str,
        review: GovernanceReview,
    ) -> DebateResult<DebateRecord> {
        let lock = self.existing_lock(id)?;
        let _guard = lock.lock().await;

        let record = {
            let mut inner = self.lock_inner();
            let record = self.active_mut(&mut inner, id)?;
            record.governance_reviews.push(review);
            record.clone()
        };

        let approved = record.governance_reviews.last().is_some_and(|r| r.approved);
        info!(
            debate_id = %id,
            reviews = record.governance_reviews.len(),
            approved,
            "Governance review recorded"
        );
        self.persist_update(&record).await;
        let mut payload = event_payload(&record);
        payload["approved"] = json!(approved);
        self.emit(MessageType::DebateReviewed, Some(id), payload);
        Ok(record)
    }

    /// Record the final decision, move the debate into history and admit
    /// one queued request if a slot is free.
    pub async fn complete_debate(
        &self,
        id: &str,
        decision: FinalDecision,
    ) -> DebateResult<DebateRecord> {
        let record = self
            .terminate(id, DebatePhase::Complete, decision, MessageType::DebateCompleted)
            .await?;
        self.admit_next().await;
        Ok(record)
    }

    /// Force termination with a zero-confidence decision carrying `reason`.
    ///
    /// The queue is left alone unless `admit_on_cancel` is configured.
    pub async fn cancel_debate(&self, id: &str, reason: &str) -> DebateResult<DebateRecord> {
        let record = self
            .terminate(
                id,
                DebatePhase::Cancelled,
                FinalDecision::cancelled(reason),
                MessageType::DebateCancelled,
            )
            .await?;
        if self.config.admit_on_cancel {
            self.admit_next().await;
        }
        Ok(record)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Look up a debate, active or in history.
    pub fn get_debate(&self, id: &str) -> Option<DebateRecord> {
        let inner = self.lock_inner();
        inner
            .active
            .get(id)
            .or_else(|| inner.history.iter().find(|r| r.id == id))
            .cloned()
    }

    /// Active debates, oldest first.
    pub fn get_all_active_debates(&self) -> Vec<DebateRecord> {
        let mut active: Vec<DebateRecord> = self.lock_inner().active.values().cloned().collect();
        active.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        active
    }

    /// Terminated debates, newest first.
    pub fn get_history(&self, limit: usize) -> Vec<DebateRecord> {
        self.lock_inner()
            .history
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Requests waiting for a slot, in admission order.
    pub fn queued_requests(&self) -> Vec<DebateRequest> {
        self.lock_inner().queue.iter().cloned().collect()
    }

    pub fn queue_len(&self) -> usize {
        self.lock_inner().queue.len()
    }

    pub fn active_count(&self) -> usize {
        self.lock_inner().active.len()
    }

    pub fn get_statistics(&self) -> DebateStatistics {
        let inner = self.lock_inner();
        DebateStatistics::from_history(inner.history.iter(), inner.active.len(), inner.queue.len())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn insert_active(&self, inner: &mut Inner, id: String, request: DebateRequest) -> DebateRecord {
        let version = 1 + inner
            .history
            .iter()
            .filter(|r| r.topic == request.topic && r.team == request.team)
            .count() as u32;
        let domain = domain_for_team(&request.team);
        let record = DebateRecord::new(id.clone(), request, domain, version);
        inner.active.insert(id, record.clone());
        record
    }

    async fn announce_started(&self, record: &DebateRecord, from_queue: bool) {
        info!(
            debate_id = %record.id,
            team = %record.team,
            domain = %record.domain,
            version = record.version,
            from_queue,
            "Debate started"
        );
        if let Err(e) = self.log.write_debate_log(record).await {
            warn!(debate_id = %record.id, error = %e, "Durable log write failed; continuing in memory");
        }
        let mut payload = event_payload(record);
        payload["from_queue"] = json!(from_queue);
        self.emit(MessageType::DebateStarted, Some(&record.id), payload);
    }

    async fn terminate(
        &self,
        id: &str,
        phase: DebatePhase,
        decision: FinalDecision,
        event: MessageType,
    ) -> DebateResult<DebateRecord> {
        let lock = self.existing_lock(id)?;
        let guard = lock.lock().await;

        let record = {
            let mut inner = self.lock_inner();
            let current = self.active_mut(&mut inner, id)?.current_phase;
            if !current.can_transition_to(phase) {
                return Err(DebateError::InvalidPhase {
                    debate_id: id.to_string(),
                    expected: "an active phase".to_string(),
                    actual: current,
                });
            }

            let mut record = inner
                .active
                .remove(id)
                .ok_or_else(|| DebateError::NotFound(id.to_string()))?;
            record.current_phase = phase;
            record.final_decision = Some(decision);
            record.completed_at = Some(Utc::now());

            inner.history.push_front(record.clone());
            inner.history.truncate(self.config.history_capacity);
            record
        };

        info!(
            debate_id = %id,
            phase = %phase,
            confidence = record.final_decision.as_ref().map(|d| d.confidence).unwrap_or(0.0),
            "Debate terminated"
        );
        self.persist_update(&record).await;
        self.emit(event, Some(id), event_payload(&record));

        drop(guard);
        self.remove_lock(id);
        Ok(record)
    }

    /// Admit the oldest queued request if a slot is free.
    async fn admit_next(&self) -> Option<String> {
        let id = DebateRecord::new_id();
        let lock = self.create_lock(&id);
        let _guard = lock.lock().await;

        let record = {
            let mut inner = self.lock_inner();
            if inner.active.len() >= self.config.max_active_debates {
                None
            } else {
                inner
                    .queue
                    .pop_front()
                    .map(|request| self.insert_active(&mut inner, id.clone(), request))
            }
        };

        match record {
            Some(record) => {
                self.announce_started(&record, true).await;
                Some(id)
            }
            None => {
                self.remove_lock(&id);
                None
            }
        }
    }

    async fn persist_update(&self, record: &DebateRecord) {
        if let Err(e) = self.log.update_debate_log(&record.id, record).await {
            warn!(
                debate_id = %record.id,
                phase = %record.current_phase,
                error = %e,
                "Durable log update failed; continuing in memory"
            );
        }
    }

    fn emit(&self, message_type: MessageType, debate_id: Option<&str>, payload: serde_json::Value) {
        let mut message =
            OutgoingMessage::new(ORCHESTRATOR_ID, MessageTarget::Broadcast, message_type, payload);
        if let Some(id) = debate_id {
            message = message.with_correlation(id);
        }
        if let Err(e) = self.bus.publish(message) {
            warn!(event = %message_type, error = %e, "Failed to publish debate event");
        }
    }

    fn active_mut<'a>(&self, inner: &'a mut Inner, id: &str) -> DebateResult<&'a mut DebateRecord> {
        if !inner.active.contains_key(id) {
            return Err(not_active(inner, id));
        }
        inner
            .active
            .get_mut(id)
            .ok_or_else(|| DebateError::NotFound(id.to_string()))
    }

    fn existing_lock(&self, id: &str) -> DebateResult<Arc<AsyncMutex<()>>> {
        let lock = self.lock_locks().get(id).cloned();
        match lock {
            Some(lock) => Ok(lock),
            None => Err(not_active(&self.lock_inner(), id)),
        }
    }

    fn create_lock(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let lock = Arc::new(AsyncMutex::new(()));
        self.lock_locks().insert(id.to_string(), Arc::clone(&lock));
        lock
    }

    fn remove_lock(&self, id: &str) {
        self.lock_locks().remove(id);
        debug!(debate_id = %id, "Debate lock released");
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Terminated debates report their terminal phase; unknown ids are NotFound.
fn not_active(inner: &Inner, id: &str) -> DebateError {
    match inner.history.iter().find(|r| r.id == id) {
        Some(record) => DebateError::InvalidPhase {
            debate_id: id.to_string(),
            expected: "an active phase".to_string(),
            actual: record.current_phase,
        },
        None => DebateError::NotFound(id.to_string()),
    }
}

fn event_payload(record: &DebateRecord) -> serde_json::Value {
    json!({
        "debate_id": record.id,
        "team": record.team,
        "domain": record.domain,
        "topic": record.topic,
        "phase": record.current_phase,
        "version": record.version,
    })
}
