//! Dispatch driver
//!
//! A single task ticking on a fixed interval. Each tick makes at most one
//! admission decision and never awaits remote I/O.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::completion::{self, Completion};
use super::config::DispatchConfig;
use super::pause::PauseHandle;
use crate::domain::{CreateTemplate, Origin, RunOutcome, WorkItem};
use crate::errorlog::{ErrorLog, ErrorRecord};
use crate::executor::{Executor, Routing};
use crate::gate::{GateConfig, RateGate};
use crate::retry::RetryQueue;
use crate::service::RemoteJobService;
use crate::source::{CounterSource, ListingConfig, ListingSource, RoundSignal};
use crate::state::{CounterSnapshot, Gauges, RunState};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused; nothing evaluated
    Skipped,
    /// Completion predicate satisfied
    Complete,
    /// Listing mode started a new round
    RoundStarted(u64),
    /// Connection ceiling reached
    Backpressure,
    /// One item submitted to the gate
    Admitted(Origin),
    /// Nothing to dispatch
    Idle,
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub counters: CounterSnapshot,
    pub errors: Vec<ErrorRecord>,
    pub dropped_errors: u64,
    pub elapsed: Duration,
}

/// Everything a driver needs besides its work source
#[derive(Clone)]
pub struct DispatchContext {
    pub service: Arc<dyn RemoteJobService>,
    pub state: Arc<RunState>,
    pub errors: Arc<ErrorLog>,
    pub gate: GateConfig,
    pub dispatch: DispatchConfig,
    pub template: CreateTemplate,
}

enum Mode {
    Bounded {
        source: CounterSource,
        retries: Arc<RetryQueue>,
    },
    Listing(ListingSource),
}

impl Mode {
    fn next_item(&mut self) -> Option<WorkItem> {
        match self {
            // New work strictly before retries
            Mode::Bounded { source, retries } => source.next_item().or_else(|| retries.pop()),
            Mode::Listing(source) => source.next_item(),
        }
    }
}

/// The dispatch loop
pub struct Driver {
    gate: RateGate,
    executor: Arc<Executor>,
    mode: Mode,
    state: Arc<RunState>,
    errors: Arc<ErrorLog>,
    pause: PauseHandle,
    tick: Duration,
    total: u64,
    started: Instant,
}

impl Driver {
    /// Create records `1..=dispatch.total`
    pub fn bounded(ctx: DispatchContext) -> Self {
        let retries = Arc::new(RetryQueue::new());
        let total = ctx.dispatch.total;
        let mode = Mode::Bounded {
            source: CounterSource::new(total),
            retries: retries.clone(),
        };
        Self::build(ctx, Routing::Retry(retries), mode, total)
    }

    /// Transition and remove whatever the listing yields, in rounds
    pub fn listing(ctx: DispatchContext, listing: ListingConfig) -> Self {
        let source = ListingSource::new(ctx.service.clone(), ctx.state.clone(), listing);
        let routing = Routing::Targets(source.queues());
        Self::build(ctx, routing, Mode::Listing(source), 0)
    }

    fn build(ctx: DispatchContext, routing: Routing, mode: Mode, total: u64) -> Self {
        debug!(gate = ?ctx.gate, dispatch = ?ctx.dispatch, "Driver::build: called");
        let pause = PauseHandle::new();
        let tick = ctx.dispatch.tick();

        let mut executor = Executor::new(ctx.service, ctx.state.clone(), routing, ctx.errors.clone())
            .with_policy(ctx.dispatch.retry_policy())
            .with_template(ctx.template)
            .with_retry_delay(ctx.dispatch.retry_delay());
        if ctx.dispatch.backoff_on_rate_limit {
            executor = executor.with_backoff(pause.clone(), tick);
        }

        Self {
            gate: RateGate::new(ctx.gate),
            executor: Arc::new(executor),
            mode,
            state: ctx.state,
            errors: ctx.errors,
            pause,
            tick,
            total,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> Arc<RunState> {
        self.state.clone()
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Round stop signal (listing mode only)
    pub fn round_signal(&self) -> Option<Arc<RoundSignal>> {
        match &self.mode {
            Mode::Listing(source) => Some(source.signal()),
            Mode::Bounded { .. } => None,
        }
    }

    /// Retry backlog (bounded mode only)
    pub fn retry_queue(&self) -> Option<Arc<RetryQueue>> {
        match &self.mode {
            Mode::Bounded { retries, .. } => Some(retries.clone()),
            Mode::Listing(_) => None,
        }
    }

    /// Run one tick and publish gauges
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.step();
        self.publish();
        outcome
    }

    fn step(&mut self) -> TickOutcome {
        if self.pause.take() {
            return TickOutcome::Skipped;
        }

        let completion = match &mut self.mode {
            Mode::Bounded { .. } => completion::bounded(&self.state, self.total),
            Mode::Listing(source) => completion::listing(source, &self.gate),
        };
        match completion {
            Completion::Complete => return TickOutcome::Complete,
            Completion::RoundStarted(round) => return TickOutcome::RoundStarted(round),
            Completion::Continue => {}
        }

        if self.state.connections() >= self.gate.config().concurrency {
            return TickOutcome::Backpressure;
        }

        let Some(item) = self.mode.next_item() else {
            return TickOutcome::Idle;
        };
        let origin = item.origin;
        let executor = Arc::clone(&self.executor);
        match origin {
            Origin::New => self.gate.admit(executor.execute(item)),
            Origin::Retry => self.gate.admit(executor.retry(item)),
        }
        TickOutcome::Admitted(origin)
    }

    fn publish(&self) {
        let mut gauges = Gauges {
            gate_queued: self.gate.queued(),
            ..Gauges::default()
        };
        match &self.mode {
            Mode::Bounded { source, retries } => {
                gauges.record_index = source.index();
                gauges.retry_depth = retries.len();
            }
            Mode::Listing(source) => {
                let (transition, removal) = source.queues().depths();
                gauges.transition_depth = transition;
                gauges.removal_depth = removal;
                gauges.round = source.round();
            }
        }
        self.state.publish(gauges);
    }

    /// Tick until complete or `shutdown` is cancelled.
    ///
    /// In-flight operations are not cancelled; they finish on their own.
    pub async fn run(mut self, shutdown: CancellationToken) -> RunSummary {
        info!(tick = ?self.tick, total = self.total, "Dispatch started");
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break RunOutcome::Interrupted,
                _ = ticker.tick() => {
                    if self.tick() == TickOutcome::Complete {
                        break RunOutcome::Complete;
                    }
                }
            }
        };

        if let Mode::Listing(source) = &self.mode {
            source.signal().stop(source.round());
        }

        let summary = RunSummary {
            outcome,
            counters: self.state.snapshot(),
            errors: self.errors.retained(),
            dropped_errors: self.errors.dropped(),
            elapsed: self.started.elapsed(),
        };
        info!(
            ?outcome,
            succeeded = summary.counters.succeeded(),
            failed = summary.counters.failed,
            elapsed = ?summary.elapsed,
            "Dispatch finished"
        );
        summary
    }
}
