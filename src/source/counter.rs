//! Bounded-counter work source.

use crate::domain::WorkItem;

/// Yields record indices `1..=total`, one per call.
#[derive(Debug, Clone)]
pub struct CounterSource {
    idx: u64,
    total: u64,
}

impl CounterSource {
    pub fn new(total: u64) -> Self {
        Self { idx: 0, total }
    }

    pub fn next_item(&mut self) -> Option<WorkItem> {
        if self.idx >= self.total {
            return None;
        }
        self.idx += 1;
        Some(WorkItem::create(self.idx))
    }

    /// Last index handed out
    pub fn index(&self) -> u64 {
        self.idx
    }
}
