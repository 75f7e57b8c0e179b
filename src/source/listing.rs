//! Listing work source with rounds.
//!
//! Each round enumerates the remote listing once and classifies every job
//! into one of two target queues: scheduled jobs need a state transition,
//! everything else needs removal. A round ends when its stop signal is raised
//! (operator or round timer) and the enumeration has observed it. Starting the
//! next round clears both queues; anything still tagged with an older round is
//! discarded on push.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ListFilter, Operation, RemoteJob, WorkItem};
use crate::service::{RemoteJobService, ServiceError};
use crate::state::RunState;

/// Listing mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Only enumerate jobs addressed to this recipient
    pub to: Option<String>,
    pub page_size: u32,
    /// Raise the current round's stop signal after this long; None = never
    pub round_interval_secs: Option<u64>,
    /// Complete the run once this many rounds have been stopped
    pub max_rounds: Option<u64>,
    /// Complete once the scan finished and every queue is drained
    pub exit_when_drained: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            to: None,
            page_size: 1000,
            round_interval_secs: Some(300),
            max_rounds: None,
            exit_when_drained: false,
        }
    }
}

impl ListingConfig {
    pub fn filter(&self) -> ListFilter {
        ListFilter {
            to: self.to.clone(),
            page_size: self.page_size,
        }
    }

    pub fn round_interval(&self) -> Option<Duration> {
        self.round_interval_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Default)]
struct Queues {
    round: u64,
    transition: VecDeque<WorkItem>,
    removal: VecDeque<WorkItem>,
}

/// The two listing-mode target queues, tagged with the current round
#[derive(Debug, Default)]
pub struct TargetQueues {
    inner: Mutex<Queues>,
    discarded: AtomicU64,
}

impl TargetQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an item for its target. Items from another round are discarded.
    pub fn push(&self, item: WorkItem) -> bool {
        let mut queues = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if item.round != queues.round {
            drop(queues);
            self.discard(&item);
            return false;
        }
        match item.op {
            Operation::Transition { .. } => queues.transition.push_back(item),
            Operation::Remove { .. } => queues.removal.push_back(item),
            Operation::Create { .. } => {
                drop(queues);
                warn!(%item, "Create items have no listing target queue");
                return false;
            }
        }
        true
    }

    /// True when `item` belongs to the current round; stale items are
    /// counted as discarded
    pub fn is_current(&self, item: &WorkItem) -> bool {
        if item.round == self.round() {
            return true;
        }
        self.discard(item);
        false
    }

    fn discard(&self, item: &WorkItem) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        debug!(%item, round = item.round, "Discarding item from stale round");
    }

    /// Head of the transition queue, or of the removal queue when it is empty
    pub fn pop_next(&self) -> Option<WorkItem> {
        let mut queues = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queues.transition.pop_front().or_else(|| queues.removal.pop_front())
    }

    /// Clear both queues and only accept items of `round` from now on
    pub fn reset(&self, round: u64) {
        let mut queues = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let leftover = queues.transition.len() + queues.removal.len();
        queues.transition.clear();
        queues.removal.clear();
        queues.round = round;
        drop(queues);
        if leftover > 0 {
            self.discarded.fetch_add(leftover as u64, Ordering::Relaxed);
            info!(round, leftover, "Discarded leftover items from previous round");
        }
    }

    pub fn round(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).round
    }

    /// (transition depth, removal depth)
    pub fn depths(&self) -> (usize, usize) {
        let queues = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (queues.transition.len(), queues.removal.len())
    }

    pub fn is_empty(&self) -> bool {
        self.depths() == (0, 0)
    }

    /// Items dropped because their round was over
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct RoundInner {
    round: u64,
    token: CancellationToken,
}

/// Current round epoch and its stop signal
#[derive(Debug)]
pub struct RoundSignal {
    inner: Mutex<RoundInner>,
}

impl Default for RoundSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundSignal {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RoundInner {
                round: 0,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Begin the next round. The previous round's token is cancelled.
    pub fn advance(&self) -> (u64, CancellationToken) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.token.cancel();
        inner.round += 1;
        inner.token = CancellationToken::new();
        (inner.round, inner.token.clone())
    }

    /// Raise the stop signal for `round`. Returns false if it is not current.
    pub fn stop(&self, round: u64) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.round != round {
            return false;
        }
        if !inner.token.is_cancelled() {
            info!(round, "Round stop signal raised");
            inner.token.cancel();
        }
        true
    }

    pub fn current(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).round
    }

    pub fn is_stopped(&self, round: u64) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        round < inner.round || (round == inner.round && inner.token.is_cancelled())
    }
}

fn classify(job: RemoteJob, round: u64) -> WorkItem {
    let op = if job.needs_transition() {
        Operation::Transition { id: job.id }
    } else {
        Operation::Remove { id: job.id }
    };
    WorkItem::new(op).in_round(round)
}

/// Enumerate one round. The stop token is checked before every push.
async fn scan(
    mut jobs: BoxStream<'static, Result<RemoteJob, ServiceError>>,
    queues: Arc<TargetQueues>,
    state: Arc<RunState>,
    round: u64,
    token: CancellationToken,
) {
    let mut listed = 0u64;
    let mut stopped = false;
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                stopped = true;
                break;
            }
            next = jobs.next() => next,
        };
        match next {
            Some(Ok(job)) => {
                if token.is_cancelled() {
                    stopped = true;
                    break;
                }
                state.record_listed();
                listed += 1;
                queues.push(classify(job, round));
            }
            Some(Err(e)) => {
                warn!(round, error = %e, "Listing failed, ending scan");
                break;
            }
            None => break,
        }
    }
    info!(round, listed, stopped, "Listing scan finished");
}

/// Round-based listing source
pub struct ListingSource {
    service: Arc<dyn RemoteJobService>,
    queues: Arc<TargetQueues>,
    signal: Arc<RoundSignal>,
    state: Arc<RunState>,
    config: ListingConfig,
    scan: Option<JoinHandle<()>>,
    round_started: Option<Instant>,
    rounds_started: u64,
}

impl ListingSource {
    pub fn new(service: Arc<dyn RemoteJobService>, state: Arc<RunState>, config: ListingConfig) -> Self {
        Self {
            service,
            queues: Arc::new(TargetQueues::new()),
            signal: Arc::new(RoundSignal::new()),
            state,
            config,
            scan: None,
            round_started: None,
            rounds_started: 0,
        }
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    pub fn queues(&self) -> Arc<TargetQueues> {
        self.queues.clone()
    }

    /// Handle for raising round stop signals from outside the driver
    pub fn signal(&self) -> Arc<RoundSignal> {
        self.signal.clone()
    }

    pub fn round(&self) -> u64 {
        self.signal.current()
    }

    pub fn rounds_started(&self) -> u64 {
        self.rounds_started
    }

    /// Clear the queues and start a fresh enumeration
    pub fn start_round(&mut self) -> u64 {
        let (round, token) = self.signal.advance();
        self.queues.reset(round);

        let jobs = self.service.list(self.config.filter());
        // The previous scan, if still running, already saw its token cancelled
        self.scan = Some(tokio::spawn(scan(
            jobs,
            self.queues.clone(),
            self.state.clone(),
            round,
            token,
        )));
        self.round_started = Some(Instant::now());
        self.rounds_started += 1;
        info!(round, "Listing round started");
        round
    }

    /// Raise the stop signal if the round interval has elapsed
    pub fn poll_timer(&self) -> bool {
        match (self.config.round_interval(), self.round_started) {
            (Some(interval), Some(started)) if started.elapsed() >= interval => {
                let round = self.round();
                !self.signal.is_stopped(round) && self.signal.stop(round)
            }
            _ => false,
        }
    }

    pub fn scan_finished(&self) -> bool {
        self.scan.as_ref().is_none_or(|h| h.is_finished())
    }

    /// The current round was stopped and its scan has halted
    pub fn stop_observed(&self) -> bool {
        self.rounds_started > 0 && self.signal.is_stopped(self.round()) && self.scan_finished()
    }

    pub fn rounds_exhausted(&self) -> bool {
        self.config.max_rounds.is_some_and(|max| self.rounds_started >= max)
    }

    pub fn next_item(&self) -> Option<WorkItem> {
        self.queues.pop_next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobStatus, OpKind};
    use crate::service::ScriptedJobService;

    fn transition(id: &str, round: u64) -> WorkItem {
        WorkItem::new(Operation::Transition { id: id.into() }).in_round(round)
    }

    fn removal(id: &str, round: u64) -> WorkItem {
        WorkItem::new(Operation::Remove { id: id.into() }).in_round(round)
    }

    fn jobs(scheduled: usize, other: usize) -> Vec<RemoteJob> {
        let mut jobs: Vec<RemoteJob> = (0..scheduled)
            .map(|i| RemoteJob::new(format!("SMs{}", i), JobStatus::Scheduled))
            .collect();
        jobs.extend((0..other).map(|i| RemoteJob::new(format!("SMo{}", i), JobStatus::Other("sent".into()))));
        jobs
    }

    async fn wait_scan(source: &ListingSource) {
        while !source.scan_finished() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[test]
    fn test_transition_queue_drains_first() {
        let queues = TargetQueues::new();
        queues.push(removal("r1", 0));
        queues.push(transition("t1", 0));
        queues.push(removal("r2", 0));
        queues.push(transition("t2", 0));

        let keys: Vec<String> = std::iter::from_fn(|| queues.pop_next()).map(|i| i.op.key()).collect();
        assert_eq!(keys, vec!["t1", "t2", "r1", "r2"]);
    }

    #[test]
    fn test_reset_clears_and_rejects_stale_round() {
        let queues = TargetQueues::new();
        queues.reset(1);
        assert!(queues.push(transition("t1", 1)));
        assert!(queues.push(removal("r1", 1)));

        queues.reset(2);
        assert!(queues.is_empty());
        assert_eq!(queues.discarded(), 2);

        assert!(!queues.push(removal("late", 1)));
        assert!(queues.is_empty());
        assert_eq!(queues.discarded(), 3);
        assert!(queues.push(removal("fresh", 2)));
        assert_eq!(queues.depths(), (0, 1));
    }

    #[test]
    fn test_create_items_rejected() {
        let queues = TargetQueues::new();
        assert!(!queues.push(WorkItem::create(1)));
        assert!(queues.is_empty());
    }

    #[test]
    fn test_round_signal() {
        let signal = RoundSignal::new();
        let (round, token) = signal.advance();
        assert_eq!(round, 1);
        assert!(!signal.is_stopped(1));

        assert!(!signal.stop(7));
        assert!(!token.is_cancelled());

        assert!(signal.stop(1));
        assert!(token.is_cancelled());
        assert!(signal.is_stopped(1));

        let (round, token2) = signal.advance();
        assert_eq!(round, 2);
        assert!(!token2.is_cancelled());
        assert!(signal.is_stopped(1));
        assert!(!signal.is_stopped(2));
    }

    #[test]
    fn test_advance_cancels_previous_token() {
        let signal = RoundSignal::new();
        let (_, first) = signal.advance();
        signal.advance();
        assert!(first.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_classifies_by_status() {
        let service = Arc::new(ScriptedJobService::new().with_jobs(jobs(5, 3)));
        let state = Arc::new(RunState::new());
        let mut source = ListingSource::new(service, state.clone(), ListingConfig::default());

        assert_eq!(source.start_round(), 1);
        wait_scan(&source).await;

        assert_eq!(source.queues().depths(), (5, 3));
        assert_eq!(state.snapshot().listed, 8);
        assert_eq!(source.next_item().unwrap().op.kind(), OpKind::Transition);
        assert!(!source.stop_observed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_enumeration_then_new_round() {
        let service = Arc::new(
            ScriptedJobService::new()
                .with_jobs(jobs(0, 10))
                .with_list_delay(Duration::from_millis(10)),
        );
        let state = Arc::new(RunState::new());
        let mut source = ListingSource::new(service.clone(), state, ListingConfig::default());
        let signal = source.signal();

        source.start_round();
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(signal.stop(1));
        wait_scan(&source).await;

        let (_, listed_before_stop) = source.queues().depths();
        assert!(listed_before_stop < 10);
        assert!(source.stop_observed());

        assert_eq!(source.start_round(), 2);
        assert!(source.queues().is_empty());
        assert!(!source.stop_observed());
        wait_scan(&source).await;

        assert_eq!(source.queues().depths(), (0, 10));
        assert_eq!(service.listings(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_timer_raises_stop() {
        let service = Arc::new(ScriptedJobService::new());
        let config = ListingConfig {
            round_interval_secs: Some(300),
            ..Default::default()
        };
        let mut source = ListingSource::new(service, Arc::new(RunState::new()), config);

        source.start_round();
        assert!(!source.poll_timer());
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(source.poll_timer());
        // Already raised
        assert!(!source.poll_timer());
        wait_scan(&source).await;
        assert!(source.stop_observed());
    }

    #[test]
    fn test_rounds_exhausted() {
        let config = ListingConfig {
            max_rounds: Some(0),
            ..Default::default()
        };
        let source = ListingSource::new(Arc::new(ScriptedJobService::new()), Arc::new(RunState::new()), config);
        assert!(source.rounds_exhausted());
    }
}
