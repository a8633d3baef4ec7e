//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod automation;
pub mod error;
pub mod health;
pub mod queue;
pub mod resource;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::{AutomationService, ResourceService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub automation: Arc<AutomationService>,
    pub resources: Arc<ResourceService>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job submission
        .route(
            "/automation/terraform/{resource_id}",
            post(automation::create_terraform_job),
        )
        .route(
            "/automation/kubernetes/{resource_id}",
            post(automation::create_kubernetes_job),
        )
        .route(
            "/automation/docker/{resource_id}",
            post(automation::create_docker_job),
        )
        // Job status and cancellation
        .route(
            "/automation/jobs/{job_id}",
            get(automation::get_job_status).delete(automation::cancel_job),
        )
        // Worker-facing queue endpoints
        .route("/automation/queue/waiting", get(queue::list_waiting))
        .route("/automation/jobs/{job_id}/claim", post(queue::claim_job))
        .route("/automation/jobs/{job_id}/heartbeat", post(queue::heartbeat))
        .route("/automation/jobs/{job_id}/complete", post(queue::complete_job))
        // Resource records
        .route("/resources", post(resource::create_resource))
        .route("/resources/{resource_id}", get(resource::get_resource))
        .route(
            "/resources/{resource_id}/automation",
            post(resource::record_automation),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
