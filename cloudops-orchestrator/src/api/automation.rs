//! Automation API Handlers
//!
//! Job submission, status and cancellation endpoints consumed by the
//! dashboard and the CLI.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use cloudops_core::domain::config::{DockerJobConfig, KubernetesStackConfig, TerraformConfig};
use cloudops_core::domain::job::JobRequest;
use cloudops_core::dto::job::{CancelJobResponse, CreateJobResponse, JobStatusResponse};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

// =============================================================================
// Job Submission
// =============================================================================

/// POST /automation/terraform/{resource_id}
pub async fn create_terraform_job(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    payload: Result<Json<TerraformConfig>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let Json(config) = payload?;
    submit(
        &state,
        resource_id,
        JobRequest::ProvisionTerraform(config),
        "Terraform generation job created",
    )
    .await
}

/// POST /automation/kubernetes/{resource_id}
pub async fn create_kubernetes_job(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    payload: Result<Json<KubernetesStackConfig>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let Json(config) = payload?;
    submit(
        &state,
        resource_id,
        JobRequest::ProvisionKubernetes(config),
        "Kubernetes generation job created",
    )
    .await
}

/// POST /automation/docker/{resource_id}
pub async fn create_docker_job(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    payload: Result<Json<DockerJobConfig>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let Json(config) = payload?;
    submit(
        &state,
        resource_id,
        JobRequest::GenerateDocker(config),
        "Dockerfile generation job created",
    )
    .await
}

async fn submit(
    state: &AppState,
    resource_id: String,
    request: JobRequest,
    message: &str,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    tracing::info!("Submitting {} job for resource: {}", request.action(), resource_id);

    let job_id = state
        .automation
        .create_job(request, Some(resource_id))
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse::queued(job_id, message)),
    ))
}

// =============================================================================
// Job Status & Cancellation
// =============================================================================

/// GET /automation/jobs/{job_id}
///
/// Ids that are not UUIDs cannot name a job and are reported as not found.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    tracing::debug!("Getting job status: {}", job_id);

    let not_found = || ApiError::NotFound("Job not found".to_string());
    let id = Uuid::parse_str(&job_id).map_err(|_| not_found())?;

    let status = state
        .automation
        .get_job_status(id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(JobStatusResponse { data: status }))
}

/// DELETE /automation/jobs/{job_id}
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelJobResponse>> {
    let cancelled = match Uuid::parse_str(&job_id) {
        Ok(id) => state.automation.cancel_job(id).await?,
        Err(_) => false,
    };

    let message = if cancelled {
        "Job cancelled successfully"
    } else {
        "Job not found or already finished"
    };

    Ok(Json(CancelJobResponse {
        cancelled,
        message: message.to_string(),
    }))
}
