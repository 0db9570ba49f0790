//! Bounded, newest-first insight collection

use std::collections::VecDeque;

use super::types::{Domain, Insight};

/// Default number of insights retained
pub const DEFAULT_INSIGHT_CAPACITY: usize = 100;

/// Ring buffer of insights; inserting beyond capacity evicts the oldest
#[derive(Debug)]
pub struct InsightBuffer {
    entries: VecDeque<Insight>,
    capacity: usize,
}

impl InsightBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Prepend an insight, evicting from the tail beyond capacity
    pub fn add(&mut self, insight: Insight) {
        self.entries.push_front(insight);
        self.entries.truncate(self.capacity);
    }

    /// Newest-first copies, optionally restricted to one domain
    pub fn get(&self, domain: Option<Domain>, limit: usize) -> Vec<Insight> {
        self.entries
            .iter()
            .filter(|i| domain.map_or(true, |d| i.domain == d))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Look up a retained insight by id
    pub fn find(&self, id: &str) -> Option<Insight> {
        self.entries.iter().find(|i| i.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for InsightBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_INSIGHT_CAPACITY)
    }
}
