//! Storage seams for the queue and resource records
//!
//! The service layer talks to these traits so the same facade runs against
//! PostgreSQL in production and against process memory in tests and local
//! development.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudops_core::domain::job::{JobPayload, QueuedJob};
use cloudops_core::domain::resource::Resource;
use cloudops_core::dto::job::JobOutcome;
use cloudops_core::dto::resource::{CreateResource, RecordAutomation};
use uuid::Uuid;

pub use memory::{InMemoryJobQueue, InMemoryResourceStore};
pub use postgres::{PgJobQueue, PgResourceStore};

/// Result of a lease renewal attempt on a known job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseRenewal {
    /// Still owned by the caller; lease extended to the given instant
    Renewed(DateTime<Utc>),
    /// The job was cancelled
    Removed,
    /// The caller no longer owns the job (reaped, requeued or finished)
    Lost,
}

/// Counts from one lease reaper pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub requeued: u64,
    pub failed: u64,
}

/// Durable job queue
///
/// Implementations own all job state. Each transition must be atomic with
/// respect to concurrent callers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store a new job in the `waiting` state
    async fn enqueue(&self, payload: JobPayload) -> Result<QueuedJob, sqlx::Error>;

    async fn get(&self, id: Uuid) -> Result<Option<QueuedJob>, sqlx::Error>;

    /// Waiting jobs, oldest first
    async fn list_waiting(&self, limit: usize) -> Result<Vec<QueuedJob>, sqlx::Error>;

    /// `waiting -> active`; `None` if the job is not waiting
    async fn claim(
        &self,
        id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<QueuedJob>, sqlx::Error>;

    /// `None` if the job is unknown
    async fn renew_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<LeaseRenewal>, sqlx::Error>;

    /// `active -> completed | failed`; `false` if the caller does not own an active job
    async fn finish(
        &self,
        id: Uuid,
        worker_id: &str,
        outcome: &JobOutcome,
    ) -> Result<bool, sqlx::Error>;

    /// `waiting | active -> removed`; `false` for unknown or final jobs
    async fn remove(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    /// Requeue or fail active jobs whose lease has expired
    async fn reap_expired(&self, max_attempts: u32) -> Result<ReapReport, sqlx::Error>;
}

/// Infrastructure resource records
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn create(&self, req: CreateResource) -> Result<Resource, sqlx::Error>;

    async fn get(&self, id: Uuid) -> Result<Option<Resource>, sqlx::Error>;

    /// Set status and merge the audit entry into config; `None` if unknown
    async fn record_automation(
        &self,
        id: Uuid,
        update: &RecordAutomation,
    ) -> Result<Option<Resource>, sqlx::Error>;
}

/// Converts a lease length into an absolute expiry
pub(crate) fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::seconds(60))
}
