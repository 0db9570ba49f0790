//! Bounded message history for observability
//!
//! Retains the most recent N messages in append order; queries return
//! most-recent-first slices.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use super::types::{Message, MessageType};

/// Ring buffer of delivered messages
#[derive(Debug)]
pub struct MessageHistory {
    entries: VecDeque<Message>,
    limit: usize,
}

impl MessageHistory {
    /// Create a history retaining at most `limit` messages
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(1024)),
            limit,
        }
    }

    /// Append a message, dropping the oldest beyond the limit
    pub fn push(&mut self, message: Message) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// Most recent messages, newest first
    pub fn recent(&self, limit: usize) -> Vec<Message> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent messages of one type, newest first
    pub fn by_type(&self, message_type: MessageType, limit: usize) -> Vec<Message> {
        self.entries
            .iter()
            .rev()
            .filter(|m| m.message_type == message_type)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Most recent messages an agent would have received, newest first
    pub fn for_agent(&self, agent_id: &str, limit: usize) -> Vec<Message> {
        self.entries
            .iter()
            .rev()
            .filter(|m| m.is_for_agent(agent_id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Aggregate counts over the retained window
    pub fn stats(&self) -> MessageStats {
        MessageStats::from_messages(self.entries.iter())
    }
}

/// Aggregate statistics over retained messages
#[derive(Debug, Default, Clone, Serialize)]
pub struct MessageStats {
    pub total_messages: usize,
    pub messages_by_type: HashMap<String, usize>,
    pub broadcasts: usize,
    pub unique_sources: usize,
}

impl MessageStats {
    pub fn from_messages<'a>(messages: impl Iterator<Item = &'a Message>) -> Self {
        let mut stats = Self::default();
        let mut sources = std::collections::HashSet::new();

        for message in messages {
            stats.total_messages += 1;
            *stats
                .messages_by_type
                .entry(message.message_type.as_str().to_string())
                .or_insert(0) += 1;
            if message.target.is_broadcast() {
                stats.broadcasts += 1;
            }
            sources.insert(message.source.as_str());
        }

        stats.unique_sources = sources.len();
        stats
    }
}
