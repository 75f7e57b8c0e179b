//! Tick pause handle

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared count of driver ticks to skip.
///
/// Operators and the executor's rate-limit back-off request pauses; the
/// driver consumes one per tick. A shorter request never cuts an existing
/// pause short.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle(Arc<AtomicU64>);

impl PauseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip at least the next `ticks` ticks
    pub fn pause(&self, ticks: u64) {
        self.0.fetch_max(ticks, Ordering::SeqCst);
    }

    pub fn remaining(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume one paused tick. False when not paused.
    pub fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_counts_down() {
        let pause = PauseHandle::new();
        assert!(!pause.take());

        pause.pause(2);
        assert!(pause.take());
        assert!(pause.take());
        assert!(!pause.take());
        assert_eq!(pause.remaining(), 0);
    }

    #[test]
    fn test_shorter_pause_does_not_shrink() {
        let pause = PauseHandle::new();
        pause.pause(10);
        pause.pause(3);
        assert_eq!(pause.remaining(), 10);

        let clone = pause.clone();
        assert!(clone.take());
        assert_eq!(pause.remaining(), 9);
    }
}
