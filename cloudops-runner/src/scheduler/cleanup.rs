//! Task directory cleanup loop

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::invoker::CliInvoker;

/// Removes stale task directories every `interval` until `shutdown` is cancelled
pub async fn run_cleanup_loop(
    invoker: Arc<CliInvoker>,
    interval: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) {
    info!(
        "Task directory cleanup started (interval: {:?}, max age: {:?})",
        interval, max_age
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Task directory cleanup stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = invoker.cleanup(max_age).await;
                if removed > 0 {
                    info!("Removed {} stale task director(ies)", removed);
                } else {
                    debug!("No stale task directories");
                }
            }
        }
    }
}
