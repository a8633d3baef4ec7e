//! Job-related API endpoints

use std::time::Duration;

use cloudops_core::domain::job::{JobAction, JobRequest, QueuedJob};
use cloudops_core::dto::job::{
    CancelJobResponse, ClaimJobRequest, CompleteJobRequest, CreateJobResponse, HeartbeatRequest,
    HeartbeatResponse, JobOutcome, JobStatus, JobStatusResponse,
};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::OrchestratorClient;
use crate::error::{ClientError, Result};

/// Route segment under `/automation` for each action
fn action_route(action: JobAction) -> &'static str {
    match action {
        JobAction::ProvisionTerraform => "terraform",
        JobAction::ProvisionKubernetes => "kubernetes",
        JobAction::GenerateDocker => "docker",
    }
}

impl OrchestratorClient {
    // =============================================================================
    // Job Submission & Status
    // =============================================================================

    /// Submit an automation job for a resource
    ///
    /// Returns as soon as the job is queued.
    ///
    /// # Arguments
    /// * `resource_id` - Resource the job's outcome is recorded against
    /// * `request` - Typed job request
    pub async fn submit_job(
        &self,
        resource_id: &str,
        request: JobRequest,
    ) -> Result<CreateJobResponse> {
        let url = format!(
            "{}/automation/{}/{}",
            self.base_url,
            action_route(request.action()),
            resource_id
        );
        let payload = request.into_payload(Some(resource_id.to_string()));
        let response = self.client.post(&url).json(&payload.config).send().await?;

        self.handle_response(response).await
    }

    /// Get the status of a job
    ///
    /// # Returns
    /// `None` if the orchestrator does not know the job
    pub async fn get_job_status(&self, job_id: Uuid) -> Result<Option<JobStatus>> {
        let url = format!("{}/automation/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        let envelope: Option<JobStatusResponse> = self.handle_optional_response(response).await?;
        Ok(envelope.map(|e| e.data))
    }

    /// Cancel a job
    ///
    /// # Returns
    /// Whether the job was removed
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<bool> {
        let url = format!("{}/automation/jobs/{}", self.base_url, job_id);
        let response = self.client.delete(&url).send().await?;

        let body: CancelJobResponse = self.handle_response(response).await?;
        Ok(body.cancelled)
    }

    /// Poll a job until it reaches a final state
    ///
    /// # Arguments
    /// * `job_id` - The job to wait for
    /// * `interval` - Delay between polls
    /// * `timeout` - Overall deadline
    ///
    /// # Errors
    /// [`ClientError::Timeout`] if the deadline passes first, or a 404 API
    /// error if the job is unknown
    pub async fn wait_for_job(
        &self,
        job_id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<JobStatus> {
        let started = Instant::now();

        loop {
            let status = self
                .get_job_status(job_id)
                .await?
                .ok_or_else(|| ClientError::api_error(404, format!("job {} not found", job_id)))?;

            if status.state.is_terminal() {
                return Ok(status);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ClientError::Timeout { job_id, elapsed });
            }

            debug!(job_id = %job_id, state = %status.state, "Job not finished yet");
            tokio::time::sleep(interval.min(timeout - elapsed)).await;
        }
    }

    // =============================================================================
    // Queue Operations (Runner-specific)
    // =============================================================================

    /// List jobs waiting to be claimed, oldest first
    pub async fn list_waiting_jobs(&self) -> Result<Vec<QueuedJob>> {
        let url = format!("{}/automation/queue/waiting", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Claim a waiting job
    ///
    /// Fails with a 409 API error if another worker got it first.
    pub async fn claim_job(&self, job_id: Uuid, worker_id: &str) -> Result<QueuedJob> {
        let url = format!("{}/automation/jobs/{}/claim", self.base_url, job_id);
        let response = self
            .client
            .post(&url)
            .json(&ClaimJobRequest {
                worker_id: worker_id.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Renew the lease on an active job
    ///
    /// # Returns
    /// The heartbeat response; `cancelled` is set once the job was removed
    pub async fn heartbeat_job(&self, job_id: Uuid, worker_id: &str) -> Result<HeartbeatResponse> {
        let url = format!("{}/automation/jobs/{}/heartbeat", self.base_url, job_id);
        let response = self
            .client
            .post(&url)
            .json(&HeartbeatRequest {
                worker_id: worker_id.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Report the terminal outcome of a job
    pub async fn complete_job(
        &self,
        job_id: Uuid,
        worker_id: &str,
        outcome: JobOutcome,
    ) -> Result<()> {
        let url = format!("{}/automation/jobs/{}/complete", self.base_url, job_id);
        let response = self
            .client
            .post(&url)
            .json(&CompleteJobRequest {
                worker_id: worker_id.to_string(),
                outcome,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_routes() {
        assert_eq!(action_route(JobAction::ProvisionTerraform), "terraform");
        assert_eq!(action_route(JobAction::ProvisionKubernetes), "kubernetes");
        assert_eq!(action_route(JobAction::GenerateDocker), "docker");
    }
}
