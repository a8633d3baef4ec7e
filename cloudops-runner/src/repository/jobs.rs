//! Jobs repository
//!
//! Queue operations a worker performs against the orchestrator:
//! - Listing waiting jobs
//! - Claiming a job under a lease
//! - Heartbeating in-flight jobs
//! - Reporting terminal outcomes

use anyhow::{Context, Result};
use async_trait::async_trait;
use cloudops_client::OrchestratorClient;
use cloudops_core::domain::job::QueuedJob;
use cloudops_core::dto::job::{HeartbeatResponse, JobOutcome};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Jobs currently waiting to be claimed, oldest first
    async fn list_waiting(&self) -> Result<Vec<QueuedJob>>;

    /// Claims a job for this worker
    ///
    /// Returns `None` when another worker won the race or the job is gone.
    async fn claim(&self, job_id: Uuid) -> Result<Option<QueuedJob>>;

    /// Renews the job's lease; `cancelled` tells the worker to stop
    async fn heartbeat(&self, job_id: Uuid) -> Result<HeartbeatResponse>;

    /// Reports the terminal outcome of a job
    async fn complete(&self, job_id: Uuid, outcome: JobOutcome) -> Result<()>;
}

/// HTTP implementation of [`JobRepository`]
pub struct HttpJobRepository {
    client: Arc<OrchestratorClient>,
    worker_id: String,
}

impl HttpJobRepository {
    pub fn new(client: Arc<OrchestratorClient>, worker_id: impl Into<String>) -> Self {
        Self {
            client,
            worker_id: worker_id.into(),
        }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn list_waiting(&self) -> Result<Vec<QueuedJob>> {
        self.client
            .list_waiting_jobs()
            .await
            .context("Failed to fetch waiting jobs")
    }

    async fn claim(&self, job_id: Uuid) -> Result<Option<QueuedJob>> {
        match self.client.claim_job(job_id, &self.worker_id).await {
            Ok(job) => Ok(Some(job)),
            Err(e) if e.is_conflict() || e.is_not_found() => {
                debug!(job_id = %job_id, "Job no longer claimable: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to claim job"),
        }
    }

    async fn heartbeat(&self, job_id: Uuid) -> Result<HeartbeatResponse> {
        self.client
            .heartbeat_job(job_id, &self.worker_id)
            .await
            .context("Failed to send job heartbeat")
    }

    async fn complete(&self, job_id: Uuid, outcome: JobOutcome) -> Result<()> {
        self.client
            .complete_job(job_id, &self.worker_id, outcome)
            .await
            .context("Failed to complete job")
    }
}
