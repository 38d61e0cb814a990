//! Recovery scheduling priority queue (spec §3, §4.3).
//!
//! `(order_key, priority_score, order_data, added_at)`, ordered by
//! descending score; external consumers pop the head. Backed by a sorted
//! `Vec` rather than a binary heap since entries must be replaceable by
//! key and the queue is small (bounded by outstanding losing positions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityEntry<T> {
    pub order_key: String,
    pub priority_score: f64,
    pub data: T,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryPriorityQueue<T> {
    entries: Vec<PriorityEntry<T>>,
}

impl<T> RecoveryPriorityQueue<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert or replace by key, keeping the queue sorted descending by score.
    pub fn add(&mut self, order_key: String, priority_score: f64, data: T, now: DateTime<Utc>) {
        self.entries.retain(|e| e.order_key != order_key);
        self.entries.push(PriorityEntry { order_key, priority_score, data, added_at: now });
        self.entries
            .sort_by(|a, b| b.priority_score.partial_cmp(&a.priority_score).unwrap());
    }

    pub fn pop(&mut self) -> Option<PriorityEntry<T>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_highest_score_first() {
        let mut q: RecoveryPriorityQueue<()> = RecoveryPriorityQueue::new();
        let now = Utc::now();
        q.add("a".into(), 0.3, (), now);
        q.add("b".into(), 0.9, (), now);
        q.add("c".into(), 0.5, (), now);
        assert_eq!(q.pop().unwrap().order_key, "b");
        assert_eq!(q.pop().unwrap().order_key, "c");
        assert_eq!(q.pop().unwrap().order_key, "a");
        assert!(q.pop().is_none());
    }

    #[test]
    fn replacing_by_key_keeps_single_entry() {
        let mut q: RecoveryPriorityQueue<()> = RecoveryPriorityQueue::new();
        let now = Utc::now();
        q.add("a".into(), 0.3, (), now);
        q.add("a".into(), 0.9, (), now);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().unwrap().priority_score, 0.9);
    }
}
