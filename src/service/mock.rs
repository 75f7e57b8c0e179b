//! Scripted in-memory job service
//!
//! Deterministic stand-in for the remote service: per-id scripted failures,
//! fixed or jittered latency, a fixed listing and a call log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::traits::{RemoteJobService, ServiceError};
use crate::domain::{JobRequest, JobState, ListFilter, OpKind, RemoteJob};

/// A call observed by the scripted service, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCall {
    pub kind: OpKind,
    pub key: String,
    pub failed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Latency {
    Fixed(Duration),
    Jitter { max: Duration },
}

/// In-memory job service with scripted outcomes.
pub struct ScriptedJobService {
    failures: Mutex<HashMap<String, u32>>,
    latency: Latency,
    rng: Mutex<StdRng>,
    jobs: Vec<RemoteJob>,
    list_delay: Duration,
    rate_limit_after: Option<Duration>,
    calls: Mutex<Vec<ServiceCall>>,
    listings: AtomicU64,
}

impl ScriptedJobService {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            latency: Latency::Fixed(Duration::ZERO),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            jobs: Vec::new(),
            list_delay: Duration::ZERO,
            rate_limit_after: None,
            calls: Mutex::new(Vec::new()),
            listings: AtomicU64::new(0),
        }
    }

    /// Fail the item with this key `times` times before succeeding
    pub fn fail_times(self, key: impl Into<String>, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), times);
        self
    }

    /// Fixed latency for every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Latency::Fixed(latency);
        self
    }

    /// Uniformly random latency in `[0, max]`, reproducible from `seed`
    pub fn with_jitter(mut self, max: Duration, seed: u64) -> Self {
        self.latency = Latency::Jitter { max };
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Jobs returned by every enumeration
    pub fn with_jobs(mut self, jobs: Vec<RemoteJob>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Delay before each listed item is yielded
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Scripted failures are reported as rate-limit rejections
    pub fn with_rate_limit_failures(mut self, retry_after: Duration) -> Self {
        self.rate_limit_after = Some(retry_after);
        self
    }

    /// All calls so far, in the order they started
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Calls of one kind, in the order they started
    pub fn calls_of(&self, kind: OpKind) -> Vec<ServiceCall> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    /// Number of enumerations started
    pub fn listings(&self) -> u64 {
        self.listings.load(Ordering::SeqCst)
    }

    fn latency(&self) -> Duration {
        match self.latency {
            Latency::Fixed(d) => d,
            Latency::Jitter { max } => {
                let max_ms = max.as_millis() as u64;
                let ms = self
                    .rng
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .random_range(0..=max_ms);
                Duration::from_millis(ms)
            }
        }
    }

    async fn call(&self, kind: OpKind, key: String) -> Result<(), ServiceError> {
        let failed = {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            match failures.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ServiceCall {
                kind,
                key: key.clone(),
                failed,
            });

        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if !failed {
            return Ok(());
        }
        match self.rate_limit_after {
            Some(retry_after) => Err(ServiceError::RateLimited { retry_after }),
            None => Err(ServiceError::Api {
                status: 500,
                message: format!("scripted failure for {} {}", kind, key),
            }),
        }
    }
}

impl Default for ScriptedJobService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteJobService for ScriptedJobService {
    async fn create(&self, request: JobRequest) -> Result<(), ServiceError> {
        // Bodies end with the record index; use it as the item key
        let key = request.body.rsplit(' ').next().unwrap_or_default().to_string();
        self.call(OpKind::Create, key).await
    }

    async fn transition(&self, id: &str, _state: JobState) -> Result<(), ServiceError> {
        self.call(OpKind::Transition, id.to_string()).await
    }

    async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        self.call(OpKind::Remove, id.to_string()).await
    }

    fn list(&self, _filter: ListFilter) -> BoxStream<'static, Result<RemoteJob, ServiceError>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let delay = self.list_delay;
        stream::iter(self.jobs.clone())
            .then(move |job| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(job)
            })
            .boxed()
    }
}
