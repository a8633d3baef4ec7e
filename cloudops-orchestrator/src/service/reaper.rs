//! Lease reaper
//!
//! Periodically returns jobs abandoned by crashed workers to the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::service::AutomationService;

/// Run the reaper until `shutdown` is cancelled
///
/// # Arguments
/// * `service` - Facade whose queue is swept
/// * `interval` - Delay between sweeps
/// * `shutdown` - Stops the loop
pub async fn run_lease_reaper(
    service: Arc<AutomationService>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tracing::info!("Lease reaper started (interval: {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Lease reaper stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = service.recover_expired_leases().await {
                    tracing::error!("Lease reaper sweep failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::QueuePolicy;
    use crate::store::InMemoryJobQueue;
    use cloudops_core::domain::config::DockerJobConfig;
    use cloudops_core::domain::job::{JobRequest, JobState};

    #[tokio::test]
    async fn test_reaper_requeues_and_stops() {
        let service = Arc::new(AutomationService::new(
            Arc::new(InMemoryJobQueue::new()),
            QueuePolicy {
                lease: Duration::ZERO,
                max_attempts: 3,
            },
        ));
        let id = service
            .create_job(JobRequest::GenerateDocker(DockerJobConfig::default()), None)
            .await
            .unwrap();
        service.claim_job(id, "crashed").await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_lease_reaper(
            service.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let status = service.get_job_status(id).await.unwrap().unwrap();
        assert_eq!(status.state, JobState::Waiting);
    }
}
