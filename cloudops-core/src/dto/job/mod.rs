//! Job DTOs
//!
//! Submission and status shapes used by API callers, plus the claim,
//! heartbeat and completion exchange used by runners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{JobPayload, JobReturnValue, JobState, QueuedJob};

/// Response to a job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    /// Always `queued`: submission never waits for execution
    pub status: String,
    pub message: String,
}

impl CreateJobResponse {
    pub fn queued(job_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            job_id,
            status: "queued".to_string(),
            message: message.into(),
        }
    }
}

/// Caller-facing view of a queued job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: Uuid,
    pub state: JobState,
    pub progress: u8,
    /// The submitted payload
    pub data: JobPayload,
    pub return_value: Option<JobReturnValue>,
    pub failed_reason: Option<String>,
}

impl From<QueuedJob> for JobStatus {
    fn from(job: QueuedJob) -> Self {
        JobStatus {
            id: job.id,
            state: job.state,
            progress: job.progress,
            data: job.payload,
            return_value: job.return_value,
            failed_reason: job.failed_reason,
        }
    }
}

/// `{ "data": ... }` envelope for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub data: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelJobResponse {
    pub cancelled: bool,
    pub message: String,
}

/// Request from a runner to take ownership of a waiting job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimJobRequest {
    pub worker_id: String,
}

/// Lease renewal for an in-flight job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    /// The job was removed; the runner should stop working on it
    pub cancelled: bool,
    pub lease_expires_at: Option<DateTime<Utc>>,
}

/// Terminal outcome reported by a runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Completed {
        #[serde(rename = "returnValue")]
        return_value: JobReturnValue,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteJobRequest {
    pub worker_id: String,
    pub outcome: JobOutcome,
}
