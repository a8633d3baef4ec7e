//! Resource API Handlers

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use cloudops_core::domain::resource::Resource;
use cloudops_core::dto::resource::{CreateResource, RecordAutomation};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /resources
pub async fn create_resource(
    State(state): State<AppState>,
    payload: Result<Json<CreateResource>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let Json(req) = payload?;
    let resource = state.resources.create_resource(req).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// GET /resources/{resource_id}
pub async fn get_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> ApiResult<Json<Resource>> {
    let id = parse_resource_id(&resource_id)?;
    let resource = state.resources.get_resource(id).await?;
    Ok(Json(resource))
}

/// POST /resources/{resource_id}/automation
///
/// Status update written by workers after a job. Merges the audit entry
/// into the resource config.
pub async fn record_automation(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    payload: Result<Json<RecordAutomation>, JsonRejection>,
) -> ApiResult<Json<Resource>> {
    let id = parse_resource_id(&resource_id)?;
    let Json(update) = payload?;
    let resource = state.resources.record_automation(id, update).await?;
    Ok(Json(resource))
}

/// Resource ids are UUIDs; anything else cannot exist
fn parse_resource_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Resource {} not found", raw)))
}
