//! Rate gate implementation

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tracing::debug;

use super::config::GateConfig;
use super::window::RateWindow;

type Task = BoxFuture<'static, ()>;

/// Counters shared between the gate handle, the dispatcher and running tasks
#[derive(Debug, Default)]
struct GateShared {
    /// Admitted and not yet finished (queued + running)
    pending: AtomicUsize,
    running: AtomicUsize,
    admitted: AtomicU64,
}

/// Releases a running slot even if the task panics
struct RunningGuard {
    shared: Arc<GateShared>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.shared.running.fetch_sub(1, Ordering::SeqCst);
        self.shared.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Admission control for all remote operations.
///
/// Enforces a cap on tasks currently running and a cap on tasks started per
/// rolling interval. Tasks waiting on either cap are held in FIFO order;
/// none are dropped. The gate never looks at task outcomes.
pub struct RateGate {
    config: GateConfig,
    tx: mpsc::UnboundedSender<Task>,
    shared: Arc<GateShared>,
}

impl RateGate {
    /// Create a gate and spawn its dispatcher on the current runtime
    pub fn new(config: GateConfig) -> Self {
        debug!(?config, "RateGate::new: called");
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(GateShared::default());
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        let window = RateWindow::new(config.rate, config.interval());

        tokio::spawn(dispatch(rx, semaphore, window, shared.clone()));

        Self { config, tx, shared }
    }

    /// Submit a unit of work. Never blocks.
    ///
    /// The future does nothing until the gate starts it.
    pub fn admit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(task.boxed()).is_err() {
            // Dispatcher gone: the runtime is shutting down
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("RateGate::admit: dispatcher stopped, task not started");
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Admitted tasks that have not finished
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Tasks currently running
    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Tasks waiting for capacity
    pub fn queued(&self) -> usize {
        self.pending().saturating_sub(self.running())
    }

    /// Tasks started since creation
    pub fn admitted(&self) -> u64 {
        self.shared.admitted.load(Ordering::SeqCst)
    }
}

/// Single consumer: takes tasks in submission order and starts each one once
/// it holds a concurrency permit and a rate window slot.
async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<Task>,
    semaphore: Arc<Semaphore>,
    mut window: RateWindow,
    shared: Arc<GateShared>,
) {
    while let Some(task) = rx.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        window.acquire().await;

        shared.running.fetch_add(1, Ordering::SeqCst);
        shared.admitted.fetch_add(1, Ordering::SeqCst);
        let guard = RunningGuard { shared: shared.clone() };

        tokio::spawn(async move {
            let _guard = guard;
            let _permit = permit;
            task.await;
        });
    }
    debug!("RateGate dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    async fn wait_idle(gate: &RateGate) {
        while gate.pending() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let gate = RateGate::new(GateConfig::new(3, 0, Duration::from_secs(1)));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let running = running.clone();
            let peak = peak.clone();
            gate.admit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        wait_idle(&gate).await;
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(gate.admitted(), 20);
        assert_eq!(gate.running(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_ceiling_with_zero_latency_tasks() {
        let gate = RateGate::new(GateConfig::new(100, 5, Duration::from_millis(1000)));
        let starts = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..23 {
            let starts = starts.clone();
            gate.admit(async move {
                starts.lock().unwrap().push(Instant::now());
            });
        }

        wait_idle(&gate).await;
        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 23);
        // Any 6 consecutive starts span at least one full window
        for pair in starts.windows(6) {
            assert!(pair[5] - pair[0] >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order() {
        let gate = RateGate::new(GateConfig::new(1, 0, Duration::from_secs(1)));
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = order.clone();
            gate.admit(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                order.lock().unwrap().push(i);
            });
        }

        wait_idle(&gate).await;
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_while_saturated() {
        let gate = RateGate::new(GateConfig::new(2, 0, Duration::from_secs(1)));
        for _ in 0..5 {
            gate.admit(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
            });
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gate.pending(), 5);
        assert_eq!(gate.running(), 2);
        assert_eq!(gate.queued(), 3);

        wait_idle(&gate).await;
        assert_eq!(gate.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_task_releases_capacity() {
        let gate = RateGate::new(GateConfig::new(1, 0, Duration::from_secs(1)));
        let done = Arc::new(AtomicUsize::new(0));
        let probe = done.clone();

        gate.admit(async move {
            if probe.load(Ordering::SeqCst) == 0 {
                panic!("task failure is not a gate error");
            }
        });
        for _ in 0..3 {
            let done = done.clone();
            gate.admit(async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        wait_idle(&gate).await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(gate.admitted(), 4);
    }
}
