//! Recency ordering for cache keys
//!
//! A small, explicit move-to-front list so eviction order is first-class
//! state the cache can assert on, rather than a side effect of a map
//! implementation. Capacities are small (hundreds), so the linear scan on
//! touch is fine.

use std::collections::VecDeque;

/// Keys ordered most-recently-used first
#[derive(Debug, Default)]
pub struct RecencyList {
    order: VecDeque<String>,
}

impl RecencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as most-recently-used, inserting it if new
    pub fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_front(key.to_string());
    }

    /// Remove and return the least-recently-used key
    pub fn pop_lru(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    /// Remove a key wherever it sits
    pub fn remove(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}
