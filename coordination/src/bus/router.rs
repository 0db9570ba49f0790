//! In-process message bus for agent coordination
//!
//! Delivery is synchronous: `publish` invokes every listener registered on a
//! matching channel before it returns, in registration order. Listeners are
//! snapshotted under the lock and called after it is released, so a listener
//! may publish or (un)subscribe re-entrantly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::debug;

use super::history::{MessageHistory, MessageStats};
use super::types::{Message, MessageTarget, MessageType, OutgoingMessage};

/// Default number of messages retained for observability
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Error type for bus operations
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Invalid message: {0}")]
    Validation(String),
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Shared reference to MessageBus
pub type SharedMessageBus = Arc<MessageBus>;

/// Callback invoked for each delivered message
pub type Listener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Subscription channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Messages targeted at one agent
    Agent(String),
    /// Messages targeted at every agent
    Broadcast,
    /// Messages of one type, whatever the target
    Type(MessageType),
    /// Every message
    All,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    channels: HashMap<Channel, Vec<(u64, Listener)>>,
}

impl Registry {
    fn add(&mut self, channel: Channel, listener: Listener) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.channels.entry(channel).or_default().push((id, listener));
        id
    }

    fn remove(&mut self, channel: &Channel, id: u64) {
        if let Some(listeners) = self.channels.get_mut(channel) {
            listeners.retain(|(lid, _)| *lid != id);
            if listeners.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    fn snapshot(&self, channel: &Channel, out: &mut Vec<Listener>) {
        if let Some(listeners) = self.channels.get(channel) {
            out.extend(listeners.iter().map(|(_, l)| Arc::clone(l)));
        }
    }

    fn count(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }
}

/// Handle returned by the `subscribe_*` methods.
///
/// Listeners stay registered until [`Subscription::unsubscribe`] is called;
/// dropping the handle does not unsubscribe.
pub struct Subscription {
    registry: Weak<RwLock<Registry>>,
    entries: Mutex<Vec<(Channel, u64)>>,
}

impl Subscription {
    /// Remove every listener this handle registered. Idempotent.
    pub fn unsubscribe(&self) {
        let entries = std::mem::take(&mut *lock(&self.entries));
        if entries.is_empty() {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.write().unwrap_or_else(|e| e.into_inner());
            for (channel, id) in &entries {
                registry.remove(channel, *id);
            }
        }
    }

    /// Whether any listener from this handle is still registered
    pub fn is_active(&self) -> bool {
        !lock(&self.entries).is_empty()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("entries", &*lock(&self.entries))
            .finish()
    }
}

/// Publish/subscribe router with bounded history
pub struct MessageBus {
    registry: Arc<RwLock<Registry>>,
    history: Mutex<MessageHistory>,
}

impl MessageBus {
    /// Create a bus with the default history limit
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create a bus retaining at most `limit` messages
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            history: Mutex::new(MessageHistory::new(limit)),
        }
    }

    /// Create a shared reference to this bus
    pub fn shared(self) -> SharedMessageBus {
        Arc::new(self)
    }

    /// Assign an id and timestamp, append to history, and deliver to
    /// listeners on the target channel, the type channel and the wildcard
    /// channel, in that order.
    pub fn publish(&self, outgoing: OutgoingMessage) -> BusResult<Message> {
        if outgoing.source.trim().is_empty() {
            return Err(BusError::Validation("source must not be empty".to_string()));
        }
        if let MessageTarget::Agent(id) = &outgoing.target {
            if id.trim().is_empty() {
                return Err(BusError::Validation(
                    "target agent id must not be empty".to_string(),
                ));
            }
        }

        let message = Message::stamp(outgoing);
        lock(&self.history).push(message.clone());

        let listeners = {
            let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
            let mut listeners = Vec::new();
            let target_channel = match &message.target {
                MessageTarget::Agent(id) => Channel::Agent(id.clone()),
                MessageTarget::Broadcast => Channel::Broadcast,
            };
            registry.snapshot(&target_channel, &mut listeners);
            registry.snapshot(&Channel::Type(message.message_type), &mut listeners);
            registry.snapshot(&Channel::All, &mut listeners);
            listeners
        };

        debug!(
            message_id = %message.id,
            message_type = %message.message_type,
            target = %message.target,
            listeners = listeners.len(),
            "Message published"
        );

        for listener in &listeners {
            listener(&message);
        }

        Ok(message)
    }

    /// Register on an agent's own channel and on the broadcast channel
    pub fn subscribe_agent<F>(&self, agent_id: &str, callback: F) -> BusResult<Subscription>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        if agent_id.trim().is_empty() {
            return Err(BusError::Validation("agent id must not be empty".to_string()));
        }
        let listener: Listener = Arc::new(callback);
        Ok(self.register(vec![
            (Channel::Agent(agent_id.to_string()), Arc::clone(&listener)),
            (Channel::Broadcast, listener),
        ]))
    }

    /// Register for every message of one type
    pub fn subscribe_type<F>(&self, message_type: MessageType, callback: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.register(vec![(Channel::Type(message_type), Arc::new(callback))])
    }

    /// Register for every message
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.register(vec![(Channel::All, Arc::new(callback))])
    }

    fn register(&self, listeners: Vec<(Channel, Listener)>) -> Subscription {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        let entries = listeners
            .into_iter()
            .map(|(channel, listener)| {
                let id = registry.add(channel.clone(), listener);
                (channel, id)
            })
            .collect();
        Subscription {
            registry: Arc::downgrade(&self.registry),
            entries: Mutex::new(entries),
        }
    }

    /// Total registered listeners across all channels
    pub fn listener_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .count()
    }

    /// Most recent messages, newest first
    pub fn get_history(&self, limit: usize) -> Vec<Message> {
        lock(&self.history).recent(limit)
    }

    /// Most recent messages of one type, newest first
    pub fn get_messages_by_type(&self, message_type: MessageType, limit: usize) -> Vec<Message> {
        lock(&self.history).by_type(message_type, limit)
    }

    /// Most recent messages addressed to an agent (directly or broadcast)
    pub fn get_messages_for_agent(&self, agent_id: &str, limit: usize) -> Vec<Message> {
        lock(&self.history).for_agent(agent_id, limit)
    }

    pub fn history_len(&self) -> usize {
        lock(&self.history).len()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }

    /// Aggregate counts over the retained history
    pub fn stats(&self) -> MessageStats {
        lock(&self.history).stats()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn outgoing(target: MessageTarget, message_type: MessageType) -> OutgoingMessage {
        OutgoingMessage::new("tester", target, message_type, serde_json::json!({"k": 1}))
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &str| -> Listener {
            let log = log_clone.clone();
            let name = name.to_string();
            Arc::new(move |_m: &Message| log.lock().unwrap().push(name.clone()))
        };
        (log, make)
    }

    #[test]
    fn test_publish_assigns_id_and_records_history() {
        let bus = MessageBus::new();
        let msg = bus
            .publish(outgoing(MessageTarget::Broadcast, MessageType::StateSync))
            .unwrap();
        assert!(msg.id.starts_with("msg-"));
        assert_eq!(bus.history_len(), 1);
        assert_eq!(bus.get_history(10)[0].id, msg.id);
    }

    #[test]
    fn test_agent_channel_delivery() {
        let bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = bus
            .subscribe_agent("scout", move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        bus.publish(outgoing(MessageTarget::agent("scout"), MessageType::TaskAssignment))
            .unwrap();
        bus.publish(outgoing(MessageTarget::agent("other"), MessageType::TaskAssignment))
            .unwrap();
        bus.publish(outgoing(MessageTarget::Broadcast, MessageType::InsightShare))
            .unwrap();

        // Own channel once + broadcast once, never the other agent's
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registration_order_within_and_across_channels() {
        let bus = MessageBus::new();
        let (log, make) = recorder();

        let all = make("all");
        let _s1 = bus.subscribe_all(move |m| all(m));
        let ty = make("type");
        let _s2 = bus.subscribe_type(MessageType::TaskAssignment, move |m| ty(m));
        let a1 = make("agent-1");
        let _s3 = bus.subscribe_agent("x", move |m| a1(m)).unwrap();
        let a2 = make("agent-2");
        let _s4 = bus.subscribe_agent("x", move |m| a2(m)).unwrap();

        bus.publish(outgoing(MessageTarget::agent("x"), MessageType::TaskAssignment))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["agent-1", "agent-2", "type", "all"]
        );
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = bus
            .subscribe_agent("scout", move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(bus.listener_count(), 2);
        assert!(sub.is_active());

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(bus.listener_count(), 0);

        bus.publish(outgoing(MessageTarget::agent("scout"), MessageType::TaskAssignment))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reentrant_publish_from_listener() {
        let bus = MessageBus::new().shared();
        let weak = Arc::downgrade(&bus);
        let _sub = bus.subscribe_type(MessageType::TaskAssignment, move |m| {
            if let Some(bus) = weak.upgrade() {
                bus.publish(OutgoingMessage::new(
                    "responder",
                    MessageTarget::agent(m.source.clone()),
                    MessageType::TaskResult,
                    serde_json::Value::Null,
                ))
                .unwrap();
            }
        });

        bus.publish(outgoing(MessageTarget::agent("x"), MessageType::TaskAssignment))
            .unwrap();
        assert_eq!(bus.get_messages_by_type(MessageType::TaskResult, 10).len(), 1);
    }

    #[test]
    fn test_validation_errors() {
        let bus = MessageBus::new();
        let err = bus
            .publish(OutgoingMessage::new(
                " ",
                MessageTarget::Broadcast,
                MessageType::StateSync,
                serde_json::Value::Null,
            ))
            .unwrap_err();
        assert!(err.to_string().contains("source"));

        assert!(bus.publish(outgoing(MessageTarget::agent(""), MessageType::StateSync)).is_err());
        assert!(bus.subscribe_agent("", |_| {}).is_err());
        assert_eq!(bus.history_len(), 0);
    }

    #[test]
    fn test_history_bounded() {
        let bus = MessageBus::with_history_limit(2);
        for _ in 0..5 {
            bus.publish(outgoing(MessageTarget::Broadcast, MessageType::StateSync))
                .unwrap();
        }
        assert_eq!(bus.history_len(), 2);
        bus.clear_history();
        assert_eq!(bus.history_len(), 0);
    }
}
