//! Live listing count

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::report::CountReporter;
use crate::service::RemoteJobService;
use crate::state::RunState;

/// Count every job the listing yields. Stops early on `shutdown`.
pub async fn count(config: &Config, service: Arc<dyn RemoteJobService>, shutdown: CancellationToken) -> u64 {
    let state = Arc::new(RunState::new());
    let report_token = CancellationToken::new();
    let reporter = CountReporter::new(state.clone(), config.report.clone()).spawn(report_token.clone());

    let mut jobs = service.list(config.listing.filter());
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = jobs.next() => next,
        };
        match next {
            Some(Ok(_)) => state.record_listed(),
            Some(Err(e)) => {
                warn!(error = %e, "Listing failed, count is partial");
                break;
            }
            None => break,
        }
    }

    report_token.cancel();
    if let Err(e) = reporter.await {
        warn!(error = %e, "Count reporter task failed");
    }
    let listed = state.snapshot().listed;
    info!(listed, "Count finished");
    listed
}
