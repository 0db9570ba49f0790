//! Message bus integration tests: delivery order, history bounds and
//! re-entrant publishing across agent, type and wildcard channels.

use std::sync::{Arc, Mutex};

use insight_coordination::bus::{
    MessageBus, MessageTarget, MessageType, OutgoingMessage, Priority,
};

fn task_for(agent: &str, n: u32) -> OutgoingMessage {
    OutgoingMessage::new(
        "scheduler",
        MessageTarget::agent(agent),
        MessageType::TaskAssignment,
        serde_json::json!({ "n": n }),
    )
}

// ── Delivery ───────────────────────────────────────────────────────

#[test]
fn test_every_matching_listener_runs_once_in_registration_order() {
    let bus = MessageBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s1 = seen.clone();
    let _a = bus
        .subscribe_agent("finance-scout", move |_| s1.lock().unwrap().push("agent-1"))
        .unwrap();
    let s2 = seen.clone();
    let _b = bus
        .subscribe_agent("finance-scout", move |_| s2.lock().unwrap().push("agent-2"))
        .unwrap();
    let s3 = seen.clone();
    let _t = bus.subscribe_type(MessageType::TaskAssignment, move |_| {
        s3.lock().unwrap().push("type")
    });
    let s4 = seen.clone();
    let _w = bus.subscribe_all(move |_| s4.lock().unwrap().push("all"));
    let s5 = seen.clone();
    let _other = bus
        .subscribe_agent("inventory-forecaster", move |_| s5.lock().unwrap().push("other"))
        .unwrap();

    bus.publish(task_for("finance-scout", 1)).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["agent-1", "agent-2", "type", "all"]
    );
}

#[test]
fn test_broadcast_reaches_every_agent_subscription() {
    let bus = MessageBus::new();
    let count = Arc::new(Mutex::new(0));

    let subs: Vec<_> = ["finance-scout", "inventory-forecaster", "finance-optimist"]
        .iter()
        .map(|id| {
            let count = count.clone();
            bus.subscribe_agent(id, move |_| *count.lock().unwrap() += 1)
                .unwrap()
        })
        .collect();

    bus.publish(OutgoingMessage::new(
        "learning-registry",
        MessageTarget::Broadcast,
        MessageType::StateSync,
        serde_json::Value::Null,
    ))
    .unwrap();
    assert_eq!(*count.lock().unwrap(), 3);

    subs[0].unsubscribe();
    bus.publish(OutgoingMessage::new(
        "learning-registry",
        MessageTarget::Broadcast,
        MessageType::StateSync,
        serde_json::Value::Null,
    ))
    .unwrap();
    assert_eq!(*count.lock().unwrap(), 5);
}

#[test]
fn test_listener_may_publish_reentrantly() {
    let bus = Arc::new(MessageBus::new());
    let replier = bus.clone();
    let _sub = bus
        .subscribe_agent("finance-scout", move |msg| {
            if msg.message_type == MessageType::DataRequest {
                replier
                    .publish(
                        OutgoingMessage::new(
                            "finance-scout",
                            MessageTarget::agent(msg.source.clone()),
                            MessageType::DataResponse,
                            serde_json::json!({ "cash_position": 1200.0 }),
                        )
                        .with_correlation(msg.id.clone()),
                    )
                    .unwrap();
            }
        })
        .unwrap();

    let request = bus
        .publish(OutgoingMessage::new(
            "dashboard",
            MessageTarget::agent("finance-scout"),
            MessageType::DataRequest,
            serde_json::Value::Null,
        ))
        .unwrap();

    let responses = bus.get_messages_by_type(MessageType::DataResponse, 10);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].correlation_id.as_deref(), Some(request.id.as_str()));
    assert_eq!(responses[0].target, MessageTarget::agent("dashboard"));
}

// ── History ────────────────────────────────────────────────────────

#[test]
fn test_history_is_bounded_and_newest_first() {
    let bus = MessageBus::with_history_limit(5);
    for n in 0..12 {
        bus.publish(task_for("finance-scout", n).with_priority(Priority::High))
            .unwrap();
    }

    assert_eq!(bus.history_len(), 5);
    let recent = bus.get_history(3);
    let ns: Vec<u64> = recent
        .iter()
        .map(|m| m.payload["n"].as_u64().unwrap())
        .collect();
    assert_eq!(ns, vec![11, 10, 9]);

    let for_agent = bus.get_messages_for_agent("finance-scout", 100);
    assert_eq!(for_agent.len(), 5);
    assert!(bus.get_messages_for_agent("nobody", 100).is_empty());

    bus.clear_history();
    assert_eq!(bus.history_len(), 0);
}

#[test]
fn test_ids_are_unique_and_empty_source_is_rejected() {
    let bus = MessageBus::new();
    let a = bus.publish(task_for("finance-scout", 1)).unwrap();
    let b = bus.publish(task_for("finance-scout", 1)).unwrap();
    assert_ne!(a.id, b.id);
    assert!(a.id.starts_with("msg-"));

    let anonymous = OutgoingMessage::new(
        "",
        MessageTarget::Broadcast,
        MessageType::StateSync,
        serde_json::Value::Null,
    );
    assert!(bus.publish(anonymous).is_err());
    assert_eq!(bus.history_len(), 2);
}
