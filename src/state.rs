//! Run state - process-wide counters shared by the driver, executor and reporter.
//!
//! One `RunState` is created per run and shared behind an `Arc`. Counters are
//! atomics so the executor tasks, the driver tick and the reporter can touch
//! them concurrently without a lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::domain::OpKind;

/// Live counters for a dispatch run
#[derive(Debug, Default)]
pub struct RunState {
    connections: AtomicUsize,
    peak_connections: AtomicUsize,
    started: AtomicU64,
    created: AtomicU64,
    transitioned: AtomicU64,
    removed: AtomicU64,
    failed: AtomicU64,
    listed: AtomicU64,
    // Gauges published by the driver once per tick
    record_index: AtomicU64,
    retry_depth: AtomicUsize,
    transition_depth: AtomicUsize,
    removal_depth: AtomicUsize,
    gate_queued: AtomicUsize,
    round: AtomicU64,
}

/// Queue depths published by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Gauges {
    pub record_index: u64,
    pub retry_depth: usize,
    pub transition_depth: usize,
    pub removal_depth: usize,
    pub gate_queued: usize,
    pub round: u64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub connections: usize,
    pub peak_connections: usize,
    pub started: u64,
    pub created: u64,
    pub transitioned: u64,
    pub removed: u64,
    pub failed: u64,
    pub listed: u64,
    pub gauges: Gauges,
}

impl CounterSnapshot {
    /// Successful operations of every kind
    pub fn succeeded(&self) -> u64 {
        self.created + self.transitioned + self.removed
    }
}

/// Holds one in-flight connection; released on drop.
#[must_use = "the connection is released as soon as the guard is dropped"]
pub struct ConnectionGuard<'a> {
    state: &'a RunState,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one in-flight operation until the guard is dropped
    pub fn connect(&self) -> ConnectionGuard<'_> {
        let now = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_connections.fetch_max(now, Ordering::SeqCst);
        ConnectionGuard { state: self }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn peak_connections(&self) -> usize {
        self.peak_connections.load(Ordering::SeqCst)
    }

    /// Record one attempt against the remote service
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_success(&self, kind: OpKind) {
        let counter = match kind {
            OpKind::Create => &self.created,
            OpKind::Transition => &self.transitioned,
            OpKind::Remove => &self.removed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_listed(&self) {
        self.listed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn succeeded(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
            + self.transitioned.load(Ordering::SeqCst)
            + self.removed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn publish(&self, gauges: Gauges) {
        self.record_index.store(gauges.record_index, Ordering::Relaxed);
        self.retry_depth.store(gauges.retry_depth, Ordering::Relaxed);
        self.transition_depth.store(gauges.transition_depth, Ordering::Relaxed);
        self.removal_depth.store(gauges.removal_depth, Ordering::Relaxed);
        self.gate_queued.store(gauges.gate_queued, Ordering::Relaxed);
        self.round.store(gauges.round, Ordering::Relaxed);
    }

    pub fn gauges(&self) -> Gauges {
        Gauges {
            record_index: self.record_index.load(Ordering::Relaxed),
            retry_depth: self.retry_depth.load(Ordering::Relaxed),
            transition_depth: self.transition_depth.load(Ordering::Relaxed),
            removal_depth: self.removal_depth.load(Ordering::Relaxed),
            gate_queued: self.gate_queued.load(Ordering::Relaxed),
            round: self.round.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            connections: self.connections(),
            peak_connections: self.peak_connections(),
            started: self.started.load(Ordering::SeqCst),
            created: self.created.load(Ordering::SeqCst),
            transitioned: self.transitioned.load(Ordering::SeqCst),
            removed: self.removed.load(Ordering::SeqCst),
            failed: self.failed(),
            listed: self.listed.load(Ordering::SeqCst),
            gauges: self.gauges(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_guard_releases() {
        let state = RunState::new();
        {
            let _a = state.connect();
            let _b = state.connect();
            assert_eq!(state.connections(), 2);
        }
        assert_eq!(state.connections(), 0);
        assert_eq!(state.peak_connections(), 2);
    }

    #[test]
    fn test_success_counters_by_kind() {
        let state = RunState::new();
        state.record_success(OpKind::Create);
        state.record_success(OpKind::Transition);
        state.record_success(OpKind::Remove);
        state.record_success(OpKind::Remove);

        let snap = state.snapshot();
        assert_eq!(snap.created, 1);
        assert_eq!(snap.transitioned, 1);
        assert_eq!(snap.removed, 2);
        assert_eq!(snap.succeeded(), 4);
        assert_eq!(state.succeeded(), 4);
    }

    #[test]
    fn test_failures_and_started() {
        let state = RunState::new();
        state.record_started();
        state.record_started();
        state.record_failure();
        state.record_success(OpKind::Create);

        let snap = state.snapshot();
        assert_eq!(snap.started, 2);
        assert_eq!(snap.failed, 1);
        assert!(snap.succeeded() + snap.failed <= snap.started);
    }

    #[test]
    fn test_publish_gauges() {
        let state = RunState::new();
        let gauges = Gauges {
            record_index: 42,
            retry_depth: 3,
            transition_depth: 1,
            removal_depth: 9,
            gate_queued: 5,
            round: 2,
        };
        state.publish(gauges);
        assert_eq!(state.gauges(), gauges);
        assert_eq!(state.snapshot().gauges.record_index, 42);
    }
}
