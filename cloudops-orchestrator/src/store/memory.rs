//! In-memory stores
//!
//! Used for local development (`STORAGE_BACKEND=memory`) and as the backing
//! store for service tests. Every operation takes a single lock, which gives
//! the same atomicity the SQL implementations get from conditional updates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cloudops_core::domain::job::{JobPayload, JobState, QueuedJob};
use cloudops_core::domain::resource::{Resource, ResourceStatus, merge_audit};
use cloudops_core::dto::job::JobOutcome;
use cloudops_core::dto::resource::{CreateResource, RecordAutomation};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repository::job::LEASE_EXPIRED_REASON;
use crate::store::{JobQueue, LeaseRenewal, ReapReport, ResourceStore, lease_deadline};

#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, QueuedJob>,
    /// Insertion order, used for FIFO listing
    order: Vec<Uuid>,
}

/// Queue held in process memory
#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    table: Arc<Mutex<JobTable>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, payload: JobPayload) -> Result<QueuedJob, sqlx::Error> {
        let job = QueuedJob::new(payload);
        let mut table = self.table.lock().await;
        table.order.push(job.id);
        table.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedJob>, sqlx::Error> {
        Ok(self.table.lock().await.jobs.get(&id).cloned())
    }

    async fn list_waiting(&self, limit: usize) -> Result<Vec<QueuedJob>, sqlx::Error> {
        let table = self.table.lock().await;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.jobs.get(id))
            .filter(|job| job.state == JobState::Waiting)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn claim(
        &self,
        id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<QueuedJob>, sqlx::Error> {
        let mut table = self.table.lock().await;
        let Some(job) = table.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.state != JobState::Waiting {
            return Ok(None);
        }

        let now = Utc::now();
        job.state = JobState::Active;
        job.worker_id = Some(worker_id.to_string());
        job.started_at = Some(now);
        job.lease_expires_at = Some(lease_deadline(now, lease));
        job.attempts += 1;
        job.progress = 0;

        Ok(Some(job.clone()))
    }

    async fn renew_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<LeaseRenewal>, sqlx::Error> {
        let mut table = self.table.lock().await;
        let Some(job) = table.jobs.get_mut(&id) else {
            return Ok(None);
        };

        let renewal = match job.state {
            JobState::Removed => LeaseRenewal::Removed,
            JobState::Active if job.worker_id.as_deref() == Some(worker_id) => {
                let expires = lease_deadline(Utc::now(), lease);
                job.lease_expires_at = Some(expires);
                LeaseRenewal::Renewed(expires)
            }
            _ => LeaseRenewal::Lost,
        };

        Ok(Some(renewal))
    }

    async fn finish(
        &self,
        id: Uuid,
        worker_id: &str,
        outcome: &JobOutcome,
    ) -> Result<bool, sqlx::Error> {
        let mut table = self.table.lock().await;
        let Some(job) = table.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.state != JobState::Active || job.worker_id.as_deref() != Some(worker_id) {
            return Ok(false);
        }

        match outcome {
            JobOutcome::Completed { return_value } => {
                job.state = JobState::Completed;
                job.progress = 100;
                job.return_value = Some(return_value.clone());
                job.failed_reason = None;
            }
            JobOutcome::Failed { reason } => {
                job.state = JobState::Failed;
                job.return_value = None;
                job.failed_reason = Some(reason.clone());
            }
        }
        job.finished_at = Some(Utc::now());
        job.lease_expires_at = None;

        Ok(true)
    }

    async fn remove(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut table = self.table.lock().await;
        let Some(job) = table.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.state.is_terminal() {
            return Ok(false);
        }

        job.state = JobState::Removed;
        job.finished_at = Some(Utc::now());
        job.lease_expires_at = None;

        Ok(true)
    }

    async fn reap_expired(&self, max_attempts: u32) -> Result<ReapReport, sqlx::Error> {
        let now = Utc::now();
        let mut report = ReapReport::default();
        let mut table = self.table.lock().await;

        for job in table.jobs.values_mut() {
            let expired = job.state == JobState::Active
                && job.lease_expires_at.is_some_and(|expires| expires < now);
            if !expired {
                continue;
            }

            job.lease_expires_at = None;
            if job.attempts >= max_attempts {
                job.state = JobState::Failed;
                job.failed_reason = Some(LEASE_EXPIRED_REASON.to_string());
                job.finished_at = Some(now);
                report.failed += 1;
            } else {
                job.state = JobState::Waiting;
                job.started_at = None;
                job.worker_id = None;
                report.requeued += 1;
            }
        }

        Ok(report)
    }
}

/// Resource records held in process memory
#[derive(Clone, Default)]
pub struct InMemoryResourceStore {
    resources: Arc<Mutex<HashMap<Uuid, Resource>>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn create(&self, req: CreateResource) -> Result<Resource, sqlx::Error> {
        let now = Utc::now();
        let as_object = |value: serde_json::Value| match value {
            serde_json::Value::Object(_) => value,
            _ => serde_json::Value::Object(Default::default()),
        };

        let resource = Resource {
            id: Uuid::new_v4(),
            name: req.name,
            kind: req.kind,
            provider: req.provider,
            region: req.region,
            status: ResourceStatus::Pending,
            config: as_object(req.config),
            tags: as_object(req.tags),
            created_at: now,
            updated_at: now,
        };

        self.resources
            .lock()
            .await
            .insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Resource>, sqlx::Error> {
        Ok(self.resources.lock().await.get(&id).cloned())
    }

    async fn record_automation(
        &self,
        id: Uuid,
        update: &RecordAutomation,
    ) -> Result<Option<Resource>, sqlx::Error> {
        let mut resources = self.resources.lock().await;
        let Some(resource) = resources.get_mut(&id) else {
            return Ok(None);
        };

        resource.status = update.status;
        resource.config = merge_audit(&resource.config, &update.last_automation);
        resource.updated_at = Utc::now();

        Ok(Some(resource.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudops_core::domain::resource::AutomationAudit;
    use serde_json::json;

    fn payload(action: &str) -> JobPayload {
        JobPayload {
            action: action.to_string(),
            resource_id: None,
            config: json!({}),
        }
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let queue = InMemoryJobQueue::new();
        let job = queue.enqueue(payload("generate-docker")).await.unwrap();

        let first = queue
            .claim(job.id, "worker-a", Duration::from_secs(60))
            .await
            .unwrap();
        let second = queue
            .claim(job.id, "worker-b", Duration::from_secs(60))
            .await
            .unwrap();

        let claimed = first.unwrap();
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-a"));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_list_waiting_is_fifo() {
        let queue = InMemoryJobQueue::new();
        let a = queue.enqueue(payload("a")).await.unwrap();
        let b = queue.enqueue(payload("b")).await.unwrap();
        let c = queue.enqueue(payload("c")).await.unwrap();

        queue
            .claim(b.id, "worker", Duration::from_secs(60))
            .await
            .unwrap();

        let waiting: Vec<Uuid> = queue
            .list_waiting(10)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(waiting, vec![a.id, c.id]);
    }

    #[tokio::test]
    async fn test_finish_requires_owner() {
        let queue = InMemoryJobQueue::new();
        let job = queue.enqueue(payload("a")).await.unwrap();
        queue
            .claim(job.id, "worker-a", Duration::from_secs(60))
            .await
            .unwrap();

        let failed = JobOutcome::Failed {
            reason: "boom".to_string(),
        };
        assert!(!queue.finish(job.id, "worker-b", &failed).await.unwrap());
        assert!(queue.finish(job.id, "worker-a", &failed).await.unwrap());

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.failed_reason.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_reap_requeues_then_fails() {
        let queue = InMemoryJobQueue::new();
        let job = queue.enqueue(payload("a")).await.unwrap();

        queue.claim(job.id, "w", Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = queue.reap_expired(2).await.unwrap();
        assert_eq!(report, ReapReport { requeued: 1, failed: 0 });
        assert_eq!(
            queue.get(job.id).await.unwrap().unwrap().state,
            JobState::Waiting
        );

        queue.claim(job.id, "w", Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = queue.reap_expired(2).await.unwrap();
        assert_eq!(report, ReapReport { requeued: 0, failed: 1 });

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.failed_reason.as_deref(), Some(LEASE_EXPIRED_REASON));
    }

    #[tokio::test]
    async fn test_renew_reports_removed_and_lost() {
        let queue = InMemoryJobQueue::new();
        let job = queue.enqueue(payload("a")).await.unwrap();
        queue
            .claim(job.id, "w", Duration::from_secs(60))
            .await
            .unwrap();

        let renewal = queue
            .renew_lease(job.id, "other", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(renewal, Some(LeaseRenewal::Lost));

        assert!(queue.remove(job.id).await.unwrap());
        let renewal = queue
            .renew_lease(job.id, "w", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(renewal, Some(LeaseRenewal::Removed));

        let unknown = queue
            .renew_lease(Uuid::new_v4(), "w", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(unknown, None);
    }

    #[tokio::test]
    async fn test_resource_merge_preserves_config() {
        let store = InMemoryResourceStore::new();
        let resource = store
            .create(CreateResource {
                name: "web".to_string(),
                kind: "compute".to_string(),
                provider: "aws".to_string(),
                region: None,
                config: json!({ "a": 1 }),
                tags: json!({}),
            })
            .await
            .unwrap();

        let updated = store
            .record_automation(
                resource.id,
                &RecordAutomation {
                    status: ResourceStatus::Running,
                    last_automation: AutomationAudit::now(Uuid::new_v4(), true),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, ResourceStatus::Running);
        assert_eq!(updated.config["a"], 1);
        assert_eq!(updated.config["lastAutomation"]["success"], true);
    }

    #[tokio::test]
    async fn test_concurrent_resource_merges_keep_every_key() {
        let store = InMemoryResourceStore::new();
        let resource = store
            .create(CreateResource {
                name: "cluster".to_string(),
                kind: "cluster".to_string(),
                provider: "gcp".to_string(),
                region: Some("europe-west1".to_string()),
                config: json!({ "nodes": 3, "version": "1.30", "network": { "vpc": "main" } }),
                tags: json!({}),
            })
            .await
            .unwrap();

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let store = store.clone();
                let id = resource.id;
                tokio::spawn(async move {
                    store
                        .record_automation(
                            id,
                            &RecordAutomation {
                                status: ResourceStatus::Running,
                                last_automation: AutomationAudit::now(Uuid::new_v4(), true),
                            },
                        )
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        let stored = store.get(resource.id).await.unwrap().unwrap();
        assert_eq!(stored.config["nodes"], 3);
        assert_eq!(stored.config["version"], "1.30");
        assert_eq!(stored.config["network"]["vpc"], "main");
        assert!(stored.last_automation().is_some());
        assert_eq!(stored.config.as_object().unwrap().len(), 4);
    }
}
