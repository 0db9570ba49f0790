//! In-process message bus for agent coordination
//!
//! # Architecture
//!
//! 1. **Message Types** (`types.rs`): the closed tag set, targets and the
//!    stamped [`Message`] envelope.
//!
//! 2. **Router** (`router.rs`): synchronous pub/sub over agent, broadcast,
//!    type and wildcard channels.
//!
//! 3. **History** (`history.rs`): bounded, most-recent-first observability
//!    window.
//!
//! # Delivery
//!
//! ```text
//! publish(msg) ──▶ history.push
//!              ├─▶ Agent(id) | Broadcast listeners   (registration order)
//!              ├─▶ Type(msg.type) listeners
//!              └─▶ All listeners
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use insight_coordination::bus::{MessageBus, MessageTarget, MessageType, OutgoingMessage};
//!
//! let bus = MessageBus::new().shared();
//! let sub = bus.subscribe_agent("finance-scout", |msg| println!("{}", msg.id))?;
//! bus.publish(OutgoingMessage::new(
//!     "scheduler",
//!     MessageTarget::agent("finance-scout"),
//!     MessageType::TaskAssignment,
//!     serde_json::json!({"kind": "scan"}),
//! ))?;
//! sub.unsubscribe();
//! ```

pub mod history;
pub mod router;
pub mod types;

pub use history::{MessageHistory, MessageStats};
pub use router::{
    BusError, BusResult, Channel, Listener, MessageBus, SharedMessageBus, Subscription,
    DEFAULT_HISTORY_LIMIT,
};
pub use types::{Message, MessageId, MessageTarget, MessageType, OutgoingMessage, Priority};
