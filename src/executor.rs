//! Operation executor.
//!
//! Performs exactly one remote operation per work item and records the
//! outcome. Failures never escape: they are counted, logged to the error log
//! and routed back for another attempt according to the retry policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::{CreateTemplate, JobState, Operation, WorkItem};
use crate::driver::PauseHandle;
use crate::errorlog::{ErrorLog, ErrorRecord};
use crate::retry::{RetryPolicy, RetryQueue};
use crate::service::{RemoteJobService, ServiceError};
use crate::source::TargetQueues;
use crate::state::RunState;

/// Where failed items (and follow-ups) go
#[derive(Clone)]
pub enum Routing {
    /// Bounded mode: failures go to the retry queue
    Retry(Arc<RetryQueue>),
    /// Listing mode: failures and follow-ups go back to the target queues
    Targets(Arc<TargetQueues>),
}

#[derive(Clone)]
struct Backoff {
    pause: PauseHandle,
    tick: Duration,
}

/// Runs work items against the remote job service
pub struct Executor {
    service: Arc<dyn RemoteJobService>,
    state: Arc<RunState>,
    routing: Routing,
    policy: RetryPolicy,
    errors: Arc<ErrorLog>,
    template: CreateTemplate,
    retry_delay: Duration,
    backoff: Option<Backoff>,
}

impl Executor {
    pub fn new(
        service: Arc<dyn RemoteJobService>,
        state: Arc<RunState>,
        routing: Routing,
        errors: Arc<ErrorLog>,
    ) -> Self {
        Self {
            service,
            state,
            routing,
            policy: RetryPolicy::Always,
            errors,
            template: CreateTemplate::default(),
            retry_delay: Duration::from_millis(100),
            backoff: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_template(mut self, template: CreateTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Pause admissions on rate-limit rejections for `retry_after / tick` ticks
    pub fn with_backoff(mut self, pause: PauseHandle, tick: Duration) -> Self {
        self.backoff = Some(Backoff { pause, tick });
        self
    }

    /// First attempt: perform immediately
    pub async fn execute(self: Arc<Self>, item: WorkItem) {
        let _conn = self.state.connect();
        self.perform(&item).await;
    }

    /// Later attempt: hold a connection through the retry delay, then perform
    pub async fn retry(self: Arc<Self>, item: WorkItem) {
        let _conn = self.state.connect();
        if !self.retry_delay.is_zero() {
            tokio::time::sleep(self.retry_delay).await;
        }
        self.perform(&item).await;
    }

    async fn perform(&self, item: &WorkItem) {
        if let Routing::Targets(queues) = &self.routing
            && !queues.is_current(item)
        {
            return;
        }
        self.state.record_started();
        match self.call(&item.op).await {
            Ok(()) => {
                self.state.record_success(item.op.kind());
                debug!(%item, "Operation succeeded");
                if let Routing::Targets(queues) = &self.routing
                    && let Some(follow_up) = item.follow_up_removal()
                {
                    queues.push(follow_up);
                }
            }
            Err(e) => self.fail(item, e),
        }
    }

    async fn call(&self, op: &Operation) -> Result<(), ServiceError> {
        match op {
            Operation::Create { index } => {
                let request = self.template.request_for(*index, Utc::now());
                self.service.create(request).await
            }
            Operation::Transition { id } => self.service.transition(id, JobState::Canceled).await,
            Operation::Remove { id } => self.service.remove(id).await,
        }
    }

    fn fail(&self, item: &WorkItem, error: ServiceError) {
        self.state.record_failure();
        warn!(%item, error = %error, "Operation failed");
        self.errors.record(ErrorRecord::new(item, error.to_string()));

        if let (Some(backoff), Some(retry_after)) = (&self.backoff, error.retry_after()) {
            let ticks = pause_ticks(retry_after, backoff.tick);
            backoff.pause.pause(ticks);
            debug!(?retry_after, ticks, "Backing off after rate limit");
        }

        if !self.policy.should_requeue() {
            debug!(%item, "Failure not re-queued");
            return;
        }
        let retry = item.clone().into_retry();
        match &self.routing {
            Routing::Retry(queue) => queue.push(retry),
            Routing::Targets(queues) => {
                queues.push(retry);
            }
        }
    }
}

/// Ticks covering `wait`, rounded up; at least one
fn pause_ticks(wait: Duration, tick: Duration) -> u64 {
    if tick.is_zero() {
        return 1;
    }
    let ticks = wait.as_nanos().div_ceil(tick.as_nanos());
    u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
}
