//! Schedule and reset runs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::driver::{DispatchContext, Driver, RunSummary};
use crate::errorlog::ErrorLog;
use crate::report::{Dashboard, ProgressReporter};
use crate::service::RemoteJobService;
use crate::state::RunState;

fn context(config: &Config, service: Arc<dyn RemoteJobService>) -> (DispatchContext, Option<tokio::task::JoinHandle<()>>) {
    let (errors, writer) = ErrorLog::spawn(&config.errors);
    let ctx = DispatchContext {
        service,
        state: Arc::new(RunState::new()),
        errors: Arc::new(errors),
        gate: config.gate.clone(),
        dispatch: config.dispatch.clone(),
        template: config.create.clone(),
    };
    (ctx, writer)
}

async fn drive(
    driver: Driver,
    ctx: DispatchContext,
    writer: Option<tokio::task::JoinHandle<()>>,
    dashboard: Dashboard,
    total: Option<u64>,
    config: &Config,
    shutdown: CancellationToken,
) -> RunSummary {
    let report_token = CancellationToken::new();
    let reporter = ProgressReporter::new(ctx.state.clone(), dashboard, total, config.report.clone())
        .spawn(report_token.clone());

    let summary = driver.run(shutdown).await;

    report_token.cancel();
    if let Err(e) = reporter.await {
        warn!(error = %e, "Progress reporter task failed");
    }

    ctx.errors.close();
    if let Some(writer) = writer
        && let Err(e) = writer.await
    {
        warn!(error = %e, "Error log writer task failed");
    }
    summary
}

/// Create `dispatch.total` remote jobs
pub async fn schedule(config: &Config, service: Arc<dyn RemoteJobService>, shutdown: CancellationToken) -> RunSummary {
    let total = config.dispatch.total;
    info!(total, concurrency = config.gate.concurrency, rate = config.gate.rate, "Starting schedule run");
    let (ctx, writer) = context(config, service);
    let driver = Driver::bounded(ctx.clone());
    drive(driver, ctx, writer, Dashboard::Schedule, Some(total), config, shutdown).await
}

/// Transition scheduled jobs and remove the rest, in listing rounds
pub async fn reset(config: &Config, service: Arc<dyn RemoteJobService>, shutdown: CancellationToken) -> RunSummary {
    info!(listing = ?config.listing, "Starting reset run");
    let (ctx, writer) = context(config, service);
    let driver = Driver::listing(ctx.clone(), config.listing.clone());
    drive(driver, ctx, writer, Dashboard::Reset, None, config, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobStatus, RemoteJob, RunOutcome};
    use crate::service::ScriptedJobService;
    use tempfile::TempDir;

    fn quiet_config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.report.enabled = false;
        config.errors.path = Some(temp.path().join("error.log"));
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_writes_error_log() {
        let temp = TempDir::new().unwrap();
        let mut config = quiet_config(&temp);
        config.dispatch.total = 5;

        let service = Arc::new(ScriptedJobService::new().fail_times("2", 1));
        let summary = schedule(&config, service, CancellationToken::new()).await;

        assert_eq!(summary.outcome, RunOutcome::Complete);
        assert_eq!(summary.counters.created, 5);
        assert_eq!(summary.counters.failed, 1);

        let log = std::fs::read_to_string(temp.path().join("error.log")).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("\"item\":\"2\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_drains_listing() {
        let temp = TempDir::new().unwrap();
        let mut config = quiet_config(&temp);
        config.listing.exit_when_drained = true;

        let service = Arc::new(ScriptedJobService::new().with_jobs(vec![
            RemoteJob::new("SM1", JobStatus::Scheduled),
            RemoteJob::new("SM2", JobStatus::Canceled),
        ]));
        let summary = reset(&config, service, CancellationToken::new()).await;

        assert_eq!(summary.outcome, RunOutcome::Complete);
        assert_eq!(summary.counters.transitioned, 1);
        assert_eq!(summary.counters.removed, 2);
        assert!(!temp.path().join("error.log").exists());
    }
}
