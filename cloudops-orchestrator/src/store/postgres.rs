//! PostgreSQL-backed stores

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cloudops_core::domain::job::{JobPayload, QueuedJob};
use cloudops_core::domain::resource::Resource;
use cloudops_core::dto::job::JobOutcome;
use cloudops_core::dto::resource::{CreateResource, RecordAutomation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{job_repository, resource_repository};
use crate::store::{JobQueue, LeaseRenewal, ReapReport, ResourceStore, lease_deadline};

/// Queue backed by the `automation_jobs` table
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, payload: JobPayload) -> Result<QueuedJob, sqlx::Error> {
        let job = QueuedJob::new(payload);
        job_repository::insert(&self.pool, &job).await?;
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedJob>, sqlx::Error> {
        job_repository::find_by_id(&self.pool, id).await
    }

    async fn list_waiting(&self, limit: usize) -> Result<Vec<QueuedJob>, sqlx::Error> {
        job_repository::find_waiting(&self.pool, limit as i64).await
    }

    async fn claim(
        &self,
        id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<QueuedJob>, sqlx::Error> {
        let now = Utc::now();
        job_repository::claim(&self.pool, id, worker_id, now, lease_deadline(now, lease)).await
    }

    async fn renew_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<LeaseRenewal>, sqlx::Error> {
        let expires = lease_deadline(Utc::now(), lease);
        job_repository::renew_lease(&self.pool, id, worker_id, expires).await
    }

    async fn finish(
        &self,
        id: Uuid,
        worker_id: &str,
        outcome: &JobOutcome,
    ) -> Result<bool, sqlx::Error> {
        job_repository::finish(&self.pool, id, worker_id, outcome, Utc::now()).await
    }

    async fn remove(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        job_repository::mark_removed(&self.pool, id, Utc::now()).await
    }

    async fn reap_expired(&self, max_attempts: u32) -> Result<ReapReport, sqlx::Error> {
        job_repository::reap_expired(&self.pool, Utc::now(), max_attempts).await
    }
}

/// Resource records in the `infrastructure` table
#[derive(Clone)]
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn create(&self, req: CreateResource) -> Result<Resource, sqlx::Error> {
        resource_repository::create(&self.pool, req).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Resource>, sqlx::Error> {
        resource_repository::find_by_id(&self.pool, id).await
    }

    async fn record_automation(
        &self,
        id: Uuid,
        update: &RecordAutomation,
    ) -> Result<Option<Resource>, sqlx::Error> {
        resource_repository::record_automation(&self.pool, id, update).await
    }
}
