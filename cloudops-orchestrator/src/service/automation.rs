//! Automation Service
//!
//! The facade over the job queue: submission, status, cancellation, and the
//! claim/heartbeat/complete exchange used by workers. Constructed once at
//! startup and shared through the router state.

use std::sync::Arc;
use std::time::Duration;

use cloudops_core::domain::job::{JobRequest, QueuedJob};
use cloudops_core::dto::job::{HeartbeatResponse, JobOutcome, JobStatus};
use uuid::Uuid;

use crate::store::{JobQueue, LeaseRenewal, ReapReport};

/// Maximum number of waiting jobs returned to a polling worker
const WAITING_PAGE_SIZE: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    /// The requested transition is not allowed from the job's current state
    #[error("{0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Lease policy applied to claimed jobs
#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    pub lease: Duration,
    pub max_attempts: u32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

pub struct AutomationService {
    queue: Arc<dyn JobQueue>,
    policy: QueuePolicy,
}

impl AutomationService {
    pub fn new(queue: Arc<dyn JobQueue>, policy: QueuePolicy) -> Self {
        Self { queue, policy }
    }

    // =============================================================================
    // Caller-facing Operations
    // =============================================================================

    /// Enqueue a job and return its id without waiting for execution
    ///
    /// # Arguments
    /// * `request` - Typed job request; its action becomes the payload action
    /// * `resource_id` - Optional link to the resource the outcome is recorded on
    pub async fn create_job(
        &self,
        request: JobRequest,
        resource_id: Option<String>,
    ) -> Result<Uuid, AutomationError> {
        if resource_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(AutomationError::InvalidRequest(
                "resource id cannot be empty".to_string(),
            ));
        }

        let action = request.action();
        let job = self
            .queue
            .enqueue(request.into_payload(resource_id))
            .await?;

        tracing::info!(job_id = %job.id, %action, resource_id = ?job.payload.resource_id, "Job queued");
        Ok(job.id)
    }

    /// Current status of a job, or `None` if the queue does not know it
    pub async fn get_job_status(&self, id: Uuid) -> Result<Option<JobStatus>, AutomationError> {
        Ok(self.queue.get(id).await?.map(JobStatus::from))
    }

    /// Cancel a waiting or active job
    ///
    /// Active jobs are only marked removed here; the owning worker learns
    /// about it on its next heartbeat and stops the external process.
    ///
    /// # Returns
    /// Whether the job was removed
    pub async fn cancel_job(&self, id: Uuid) -> Result<bool, AutomationError> {
        let removed = self.queue.remove(id).await?;

        if removed {
            tracing::info!(job_id = %id, "Job cancelled");
        } else {
            tracing::debug!(job_id = %id, "Cancel ignored: job unknown or already final");
        }

        Ok(removed)
    }

    // =============================================================================
    // Worker-facing Operations
    // =============================================================================

    pub async fn list_waiting(&self) -> Result<Vec<QueuedJob>, AutomationError> {
        Ok(self.queue.list_waiting(WAITING_PAGE_SIZE).await?)
    }

    /// Claim a waiting job for `worker_id`
    ///
    /// Fails with [`AutomationError::Conflict`] when the job is no longer
    /// waiting, which is the normal outcome of a claim race.
    pub async fn claim_job(&self, id: Uuid, worker_id: &str) -> Result<QueuedJob, AutomationError> {
        validate_worker_id(worker_id)?;

        if let Some(job) = self.queue.claim(id, worker_id, self.policy.lease).await? {
            tracing::info!(job_id = %id, worker_id, attempt = job.attempts, "Job claimed");
            return Ok(job);
        }

        match self.queue.get(id).await? {
            None => Err(AutomationError::NotFound(id)),
            Some(job) => Err(AutomationError::Conflict(format!(
                "job {} is {} and cannot be claimed",
                id, job.state
            ))),
        }
    }

    /// Renew the lease on an active job
    ///
    /// `cancelled` is set whenever the worker should stop: the job was
    /// removed, or ownership moved elsewhere after a lease expiry.
    pub async fn heartbeat(
        &self,
        id: Uuid,
        worker_id: &str,
    ) -> Result<HeartbeatResponse, AutomationError> {
        validate_worker_id(worker_id)?;

        let renewal = self
            .queue
            .renew_lease(id, worker_id, self.policy.lease)
            .await?
            .ok_or(AutomationError::NotFound(id))?;

        let response = match renewal {
            LeaseRenewal::Renewed(expires) => HeartbeatResponse {
                cancelled: false,
                lease_expires_at: Some(expires),
            },
            LeaseRenewal::Removed => {
                tracing::info!(job_id = %id, worker_id, "Heartbeat on removed job, signalling cancellation");
                HeartbeatResponse {
                    cancelled: true,
                    lease_expires_at: None,
                }
            }
            LeaseRenewal::Lost => {
                tracing::warn!(job_id = %id, worker_id, "Heartbeat from worker that no longer owns the job");
                HeartbeatResponse {
                    cancelled: true,
                    lease_expires_at: None,
                }
            }
        };

        Ok(response)
    }

    /// Record a job's terminal outcome
    ///
    /// Rejected with [`AutomationError::Conflict`] if the job was removed or
    /// is no longer owned by `worker_id`.
    pub async fn complete_job(
        &self,
        id: Uuid,
        worker_id: &str,
        outcome: JobOutcome,
    ) -> Result<(), AutomationError> {
        validate_worker_id(worker_id)?;

        if self.queue.finish(id, worker_id, &outcome).await? {
            match &outcome {
                JobOutcome::Completed { .. } => tracing::info!(job_id = %id, worker_id, "Job completed"),
                JobOutcome::Failed { reason } => {
                    tracing::warn!(job_id = %id, worker_id, reason = %reason, "Job failed")
                }
            }
            return Ok(());
        }

        match self.queue.get(id).await? {
            None => Err(AutomationError::NotFound(id)),
            Some(job) => Err(AutomationError::Conflict(format!(
                "job {} is {} and not owned by {}",
                id, job.state, worker_id
            ))),
        }
    }

    /// Requeue or fail jobs whose worker stopped heartbeating
    pub async fn recover_expired_leases(&self) -> Result<ReapReport, AutomationError> {
        let report = self.queue.reap_expired(self.policy.max_attempts).await?;

        if report.requeued > 0 || report.failed > 0 {
            tracing::warn!(
                requeued = report.requeued,
                failed = report.failed,
                "Recovered jobs with expired leases"
            );
        }

        Ok(report)
    }
}

fn validate_worker_id(worker_id: &str) -> Result<(), AutomationError> {
    if worker_id.trim().is_empty() {
        return Err(AutomationError::InvalidRequest(
            "worker id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryJobQueue;
    use cloudops_core::domain::config::{DockerJobConfig, TerraformConfig};
    use cloudops_core::domain::job::{JobOutput, JobReturnValue, JobState};

    fn service() -> AutomationService {
        AutomationService::new(Arc::new(InMemoryJobQueue::new()), QueuePolicy::default())
    }

    fn docker_request() -> JobRequest {
        JobRequest::GenerateDocker(DockerJobConfig::default())
    }

    fn completed() -> JobOutcome {
        JobOutcome::Completed {
            return_value: JobReturnValue {
                success: true,
                output: JobOutput::Text("FROM node:20-alpine".to_string()),
                artifact_path: "artifacts/r1/Dockerfile".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_create_job_is_waiting() {
        let service = service();
        let id = service
            .create_job(
                JobRequest::ProvisionTerraform(TerraformConfig::default()),
                Some("r1".to_string()),
            )
            .await
            .unwrap();

        let status = service.get_job_status(id).await.unwrap().unwrap();
        assert_eq!(status.state, JobState::Waiting);
        assert_eq!(status.progress, 0);
        assert_eq!(status.data.action, "provision-terraform");
        assert_eq!(status.data.config["region"], "us-east-1");
        assert!(status.return_value.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job_status_is_none() {
        let service = service();
        assert!(service.get_job_status(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_semantics() {
        let service = service();

        assert!(!service.cancel_job(Uuid::new_v4()).await.unwrap());

        let id = service.create_job(docker_request(), None).await.unwrap();
        assert!(service.cancel_job(id).await.unwrap());
        assert!(!service.cancel_job(id).await.unwrap());

        let status = service.get_job_status(id).await.unwrap().unwrap();
        assert_eq!(status.state, JobState::Removed);
    }

    #[tokio::test]
    async fn test_cancel_finished_job_returns_false() {
        let service = service();
        let id = service.create_job(docker_request(), None).await.unwrap();
        service.claim_job(id, "w1").await.unwrap();
        service.complete_job(id, "w1", completed()).await.unwrap();

        assert!(!service.cancel_job(id).await.unwrap());
        let status = service.get_job_status(id).await.unwrap().unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.progress, 100);
        assert!(status.return_value.is_some());
    }

    #[tokio::test]
    async fn test_claim_race_conflicts() {
        let service = service();
        let id = service.create_job(docker_request(), None).await.unwrap();

        service.claim_job(id, "w1").await.unwrap();
        let err = service.claim_job(id, "w2").await.unwrap_err();
        assert!(matches!(err, AutomationError::Conflict(_)));

        let err = service.claim_job(Uuid::new_v4(), "w2").await.unwrap_err();
        assert!(matches!(err, AutomationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_active_job_is_observed_by_heartbeat() {
        let service = service();
        let id = service.create_job(docker_request(), None).await.unwrap();
        service.claim_job(id, "w1").await.unwrap();

        let beat = service.heartbeat(id, "w1").await.unwrap();
        assert!(!beat.cancelled);
        assert!(beat.lease_expires_at.is_some());

        assert!(service.cancel_job(id).await.unwrap());

        let beat = service.heartbeat(id, "w1").await.unwrap();
        assert!(beat.cancelled);

        let err = service.complete_job(id, "w1", completed()).await.unwrap_err();
        assert!(matches!(err, AutomationError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_outcome_records_reason() {
        let service = service();
        let id = service.create_job(docker_request(), None).await.unwrap();
        service.claim_job(id, "w1").await.unwrap();
        service
            .complete_job(
                id,
                "w1",
                JobOutcome::Failed {
                    reason: "unknown action: deploy".to_string(),
                },
            )
            .await
            .unwrap();

        let status = service.get_job_status(id).await.unwrap().unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.failed_reason.as_deref(), Some("unknown action: deploy"));
    }

    #[tokio::test]
    async fn test_expired_lease_is_requeued() {
        let service = AutomationService::new(
            Arc::new(InMemoryJobQueue::new()),
            QueuePolicy {
                lease: Duration::ZERO,
                max_attempts: 3,
            },
        );
        let id = service.create_job(docker_request(), None).await.unwrap();
        service.claim_job(id, "w1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = service.recover_expired_leases().await.unwrap();
        assert_eq!(report.requeued, 1);

        // The crashed worker's late heartbeat is told to stop
        let beat = service.heartbeat(id, "w1").await.unwrap();
        assert!(beat.cancelled);

        let waiting = service.list_waiting().await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, id);
    }

    #[tokio::test]
    async fn test_empty_worker_id_rejected() {
        let service = service();
        let id = service.create_job(docker_request(), None).await.unwrap();
        let err = service.claim_job(id, " ").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidRequest(_)));
    }
}
