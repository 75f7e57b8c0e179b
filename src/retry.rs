//! Retry queue and retry sampling policy.
//!
//! The queue is a plain FIFO of failed work items. The same identifier may
//! appear more than once when it fails repeatedly (at-least-once semantics).

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::domain::WorkItem;

/// FIFO backlog of failed work items
#[derive(Debug, Default)]
pub struct RetryQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail
    pub fn push(&self, item: WorkItem) {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).push_back(item);
    }

    /// Remove and return the head, or None when empty
    pub fn pop(&self) -> Option<WorkItem> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a failed item is put back for another attempt
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "rate", rename_all = "lowercase")]
pub enum RetryPolicy {
    /// Every failure is re-queued
    #[default]
    Always,
    /// A failure is re-queued with probability `rate`
    Sampled(f64),
}

impl RetryPolicy {
    /// Build from a re-queue probability; 1.0 or more means always
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 1.0 || rate.is_nan() {
            RetryPolicy::Always
        } else {
            RetryPolicy::Sampled(rate.max(0.0))
        }
    }

    pub fn should_requeue(&self) -> bool {
        match *self {
            RetryPolicy::Always => true,
            RetryPolicy::Sampled(rate) if rate > 0.0 => rand::random_bool(rate.min(1.0)),
            RetryPolicy::Sampled(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = RetryQueue::new();
        queue.push(WorkItem::create(1));
        queue.push(WorkItem::create(2));
        queue.push(WorkItem::create(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().op.key(), "1");
        assert_eq!(queue.pop().unwrap().op.key(), "2");
        assert_eq!(queue.pop().unwrap().op.key(), "3");
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicates_allowed() {
        let queue = RetryQueue::new();
        queue.push(WorkItem::create(5).into_retry());
        queue.push(WorkItem::create(5).into_retry().into_retry());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_policy_from_rate() {
        assert_eq!(RetryPolicy::from_rate(1.0), RetryPolicy::Always);
        assert_eq!(RetryPolicy::from_rate(2.0), RetryPolicy::Always);
        assert_eq!(RetryPolicy::from_rate(0.75), RetryPolicy::Sampled(0.75));
        assert_eq!(RetryPolicy::from_rate(-1.0), RetryPolicy::Sampled(0.0));
    }

    #[test]
    fn test_policy_extremes() {
        assert!((0..100).all(|_| RetryPolicy::Always.should_requeue()));
        assert!((0..100).all(|_| !RetryPolicy::Sampled(0.0).should_requeue()));
        assert!((0..100).all(|_| RetryPolicy::Sampled(1.0).should_requeue()));
    }

    #[test]
    fn test_policy_serde() {
        let yaml = serde_yaml::to_string(&RetryPolicy::Sampled(0.75)).unwrap();
        let back: RetryPolicy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, RetryPolicy::Sampled(0.75));
    }
}
