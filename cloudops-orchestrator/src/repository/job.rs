//! Job Repository
//!
//! Database operations for the `automation_jobs` queue table. Every state
//! transition is a single conditional `UPDATE`, so concurrent claims,
//! cancellations and completions cannot interleave.

use chrono::{DateTime, Utc};
use cloudops_core::domain::job::{JobPayload, JobReturnValue, JobState, QueuedJob};
use cloudops_core::dto::job::JobOutcome;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::store::{LeaseRenewal, ReapReport};

/// Reason recorded when a job runs out of attempts through lease expiry
pub const LEASE_EXPIRED_REASON: &str = "worker lease expired";

/// Insert a newly enqueued job
pub async fn insert(pool: &PgPool, job: &QueuedJob) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO automation_jobs (id, action, resource_id, config, state, progress, attempts, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(job.id)
    .bind(&job.payload.action)
    .bind(&job.payload.resource_id)
    .bind(&job.payload.config)
    .bind(job.state.as_str())
    .bind(job.progress as i16)
    .bind(job.attempts as i32)
    .bind(job.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<QueuedJob>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, action, resource_id, config, state, progress, attempts, created_at,
               started_at, finished_at, worker_id, lease_expires_at, return_value, failed_reason
        FROM automation_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List waiting jobs, oldest first
pub async fn find_waiting(pool: &PgPool, limit: i64) -> Result<Vec<QueuedJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, action, resource_id, config, state, progress, attempts, created_at,
               started_at, finished_at, worker_id, lease_expires_at, return_value, failed_reason
        FROM automation_jobs
        WHERE state = 'waiting'
        ORDER BY created_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Move a waiting job to active under `worker_id`
///
/// # Returns
/// The claimed job, or `None` if the job is not waiting (already claimed,
/// removed, finished or unknown)
pub async fn claim(
    pool: &PgPool,
    id: Uuid,
    worker_id: &str,
    now: DateTime<Utc>,
    lease_expires_at: DateTime<Utc>,
) -> Result<Option<QueuedJob>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE automation_jobs
        SET state = 'active', worker_id = $2, started_at = $3, lease_expires_at = $4,
            attempts = attempts + 1, progress = 0
        WHERE id = $1 AND state = 'waiting'
        RETURNING id, action, resource_id, config, state, progress, attempts, created_at,
                  started_at, finished_at, worker_id, lease_expires_at, return_value, failed_reason
        "#,
    )
    .bind(id)
    .bind(worker_id)
    .bind(now)
    .bind(lease_expires_at)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Extend the lease of an active job owned by `worker_id`
///
/// # Returns
/// `None` if the job is unknown
pub async fn renew_lease(
    pool: &PgPool,
    id: Uuid,
    worker_id: &str,
    lease_expires_at: DateTime<Utc>,
) -> Result<Option<LeaseRenewal>, sqlx::Error> {
    let renewed = sqlx::query(
        r#"
        UPDATE automation_jobs
        SET lease_expires_at = $3
        WHERE id = $1 AND state = 'active' AND worker_id = $2
        "#,
    )
    .bind(id)
    .bind(worker_id)
    .bind(lease_expires_at)
    .execute(pool)
    .await?;

    if renewed.rows_affected() > 0 {
        return Ok(Some(LeaseRenewal::Renewed(lease_expires_at)));
    }

    let state: Option<(String,)> =
        sqlx::query_as("SELECT state FROM automation_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(state.map(|(state,)| match JobState::parse(&state) {
        Some(JobState::Removed) => LeaseRenewal::Removed,
        _ => LeaseRenewal::Lost,
    }))
}

/// Record the terminal outcome of an active job owned by `worker_id`
///
/// # Returns
/// `false` if the job is not active under that worker (removed, reaped or
/// unknown)
pub async fn finish(
    pool: &PgPool,
    id: Uuid,
    worker_id: &str,
    outcome: &JobOutcome,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let (state, return_value, failed_reason) = match outcome {
        JobOutcome::Completed { return_value } => {
            (JobState::Completed, Some(Json(return_value)), None)
        }
        JobOutcome::Failed { reason } => (JobState::Failed, None, Some(reason.as_str())),
    };

    let result = sqlx::query(
        r#"
        UPDATE automation_jobs
        SET state = $3, finished_at = $4, lease_expires_at = NULL,
            progress = CASE WHEN $3 = 'completed' THEN 100 ELSE progress END,
            return_value = $5, failed_reason = $6
        WHERE id = $1 AND state = 'active' AND worker_id = $2
        "#,
    )
    .bind(id)
    .bind(worker_id)
    .bind(state.as_str())
    .bind(now)
    .bind(return_value)
    .bind(failed_reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a waiting or active job as removed
pub async fn mark_removed(pool: &PgPool, id: Uuid, now: DateTime<Utc>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE automation_jobs
        SET state = 'removed', finished_at = $2, lease_expires_at = NULL
        WHERE id = $1 AND state IN ('waiting', 'active')
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Recover active jobs whose lease expired before `now`
///
/// Jobs with attempts left go back to `waiting`; the rest are failed.
pub async fn reap_expired(
    pool: &PgPool,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<ReapReport, sqlx::Error> {
    let states: Vec<(String,)> = sqlx::query_as(
        r#"
        UPDATE automation_jobs
        SET state = CASE WHEN attempts >= $2 THEN 'failed' ELSE 'waiting' END,
            failed_reason = CASE WHEN attempts >= $2 THEN $3 ELSE failed_reason END,
            finished_at = CASE WHEN attempts >= $2 THEN $1 ELSE NULL END,
            started_at = CASE WHEN attempts >= $2 THEN started_at ELSE NULL END,
            worker_id = CASE WHEN attempts >= $2 THEN worker_id ELSE NULL END,
            lease_expires_at = NULL
        WHERE state = 'active' AND lease_expires_at < $1
        RETURNING state
        "#,
    )
    .bind(now)
    .bind(max_attempts as i32)
    .bind(LEASE_EXPIRED_REASON)
    .fetch_all(pool)
    .await?;

    let failed = states.iter().filter(|(s,)| s == "failed").count() as u64;

    Ok(ReapReport {
        requeued: states.len() as u64 - failed,
        failed,
    })
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    action: String,
    resource_id: Option<String>,
    config: serde_json::Value,
    state: String,
    progress: i16,
    attempts: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    worker_id: Option<String>,
    lease_expires_at: Option<DateTime<Utc>>,
    return_value: Option<serde_json::Value>,
    failed_reason: Option<String>,
}

impl From<JobRow> for QueuedJob {
    fn from(row: JobRow) -> Self {
        // Unknown states only come from manual edits; surface them as failed
        let state = JobState::parse(&row.state).unwrap_or(JobState::Failed);

        let return_value = row
            .return_value
            .and_then(|v| serde_json::from_value::<JobReturnValue>(v).ok());

        QueuedJob {
            id: row.id,
            payload: JobPayload {
                action: row.action,
                resource_id: row.resource_id,
                config: row.config,
            },
            state,
            progress: row.progress.clamp(0, 100) as u8,
            attempts: row.attempts.max(0) as u32,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            worker_id: row.worker_id,
            lease_expires_at: row.lease_expires_at,
            return_value,
            failed_reason: row.failed_reason,
        }
    }
}
