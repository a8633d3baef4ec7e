//! Queue API Handlers
//!
//! Worker-facing endpoints: list waiting jobs, claim, heartbeat, complete.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use cloudops_core::domain::job::QueuedJob;
use cloudops_core::dto::job::{
    ClaimJobRequest, CompleteJobRequest, HeartbeatRequest, HeartbeatResponse,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /automation/queue/waiting
pub async fn list_waiting(State(state): State<AppState>) -> ApiResult<Json<Vec<QueuedJob>>> {
    let jobs = state.automation.list_waiting().await?;
    Ok(Json(jobs))
}

/// POST /automation/jobs/{job_id}/claim
pub async fn claim_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<ClaimJobRequest>,
) -> ApiResult<Json<QueuedJob>> {
    tracing::info!("Worker {} claiming job: {}", req.worker_id, job_id);

    let job = state.automation.claim_job(job_id, &req.worker_id).await?;
    Ok(Json(job))
}

/// POST /automation/jobs/{job_id}/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<HeartbeatRequest>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let response = state.automation.heartbeat(job_id, &req.worker_id).await?;
    Ok(Json(response))
}

/// POST /automation/jobs/{job_id}/complete
pub async fn complete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<CompleteJobRequest>,
) -> ApiResult<StatusCode> {
    state
        .automation
        .complete_job(job_id, &req.worker_id, req.outcome)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
