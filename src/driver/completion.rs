//! Completion controller
//!
//! Decides, once per tick, whether the run is done. Listing mode also owns
//! the round lifecycle: start, timed stop, restart.

use tracing::info;

use crate::gate::RateGate;
use crate::source::ListingSource;
use crate::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Continue,
    Complete,
    RoundStarted(u64),
}

/// Bounded mode: done once `total` operations have succeeded
pub fn bounded(state: &RunState, total: u64) -> Completion {
    if state.succeeded() >= total {
        Completion::Complete
    } else {
        Completion::Continue
    }
}

/// Listing mode round lifecycle
pub fn listing(source: &mut ListingSource, gate: &RateGate) -> Completion {
    if source.rounds_started() == 0 {
        return Completion::RoundStarted(source.start_round());
    }

    source.poll_timer();

    if source.config().exit_when_drained
        && source.scan_finished()
        && gate.pending() == 0
        && source.queues().is_empty()
    {
        info!(round = source.round(), "Listing drained");
        return Completion::Complete;
    }

    if source.stop_observed() {
        if source.rounds_exhausted() {
            info!(rounds = source.rounds_started(), "Round limit reached");
            return Completion::Complete;
        }
        return Completion::RoundStarted(source.start_round());
    }

    Completion::Continue
}
