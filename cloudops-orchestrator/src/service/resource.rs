//! Resource Service
//!
//! Infrastructure records and the status update written after each
//! automation job.

use std::sync::Arc;

use cloudops_core::domain::resource::Resource;
use cloudops_core::dto::resource::{CreateResource, RecordAutomation};
use uuid::Uuid;

use crate::store::ResourceStore;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource {0} not found")]
    NotFound(Uuid),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
}

impl ResourceService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    pub async fn create_resource(&self, req: CreateResource) -> Result<Resource, ResourceError> {
        if req.name.trim().is_empty() {
            return Err(ResourceError::ValidationError(
                "name cannot be empty".to_string(),
            ));
        }
        if req.kind.trim().is_empty() {
            return Err(ResourceError::ValidationError(
                "kind cannot be empty".to_string(),
            ));
        }

        let resource = self.store.create(req).await?;
        tracing::info!(resource_id = %resource.id, name = %resource.name, "Resource created");

        Ok(resource)
    }

    pub async fn get_resource(&self, id: Uuid) -> Result<Resource, ResourceError> {
        self.store
            .get(id)
            .await?
            .ok_or(ResourceError::NotFound(id))
    }

    /// Apply a post-job status update
    ///
    /// The audit entry replaces any previous `lastAutomation`; every other
    /// config key is kept.
    pub async fn record_automation(
        &self,
        id: Uuid,
        update: RecordAutomation,
    ) -> Result<Resource, ResourceError> {
        let resource = self
            .store
            .record_automation(id, &update)
            .await?
            .ok_or(ResourceError::NotFound(id))?;

        tracing::info!(
            resource_id = %id,
            status = %update.status,
            job_id = %update.last_automation.job_id,
            "Automation recorded on resource"
        );

        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryResourceStore;
    use cloudops_core::domain::resource::{AutomationAudit, ResourceStatus};
    use serde_json::json;

    fn create_request(config: serde_json::Value) -> CreateResource {
        CreateResource {
            name: "db-primary".to_string(),
            kind: "database".to_string(),
            provider: "aws".to_string(),
            region: Some("us-east-1".to_string()),
            config,
            tags: json!({ "team": "platform" }),
        }
    }

    #[tokio::test]
    async fn test_record_automation_keeps_existing_keys() {
        let service = ResourceService::new(Arc::new(InMemoryResourceStore::new()));
        let resource = service
            .create_resource(create_request(json!({ "a": 1, "engine": "postgres" })))
            .await
            .unwrap();
        assert_eq!(resource.status, ResourceStatus::Pending);

        let job_id = Uuid::new_v4();
        let updated = service
            .record_automation(
                resource.id,
                RecordAutomation {
                    status: ResourceStatus::Running,
                    last_automation: AutomationAudit::now(job_id, true),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, ResourceStatus::Running);
        assert_eq!(updated.config["a"], 1);
        assert_eq!(updated.config["engine"], "postgres");
        assert_eq!(updated.last_automation().unwrap().job_id, job_id);
    }

    #[tokio::test]
    async fn test_concurrent_records_keep_config() {
        let service = Arc::new(ResourceService::new(Arc::new(InMemoryResourceStore::new())));
        let resource = service
            .create_resource(create_request(json!({
                "a": 1,
                "engine": "postgres",
                "backup": { "retentionDays": 7 },
            })))
            .await
            .unwrap();

        let resource_id = resource.id;
        let job_ids: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();
        let updates: Vec<_> = job_ids
            .iter()
            .enumerate()
            .map(|(i, &job_id)| {
                let service = service.clone();
                tokio::spawn(async move {
                    let success = i % 2 == 0;
                    service
                        .record_automation(
                            resource_id,
                            RecordAutomation {
                                status: if success {
                                    ResourceStatus::Running
                                } else {
                                    ResourceStatus::Failed
                                },
                                last_automation: AutomationAudit::now(job_id, success),
                            },
                        )
                        .await
                })
            })
            .collect();

        for handle in updates {
            let updated = handle.await.unwrap().unwrap();
            assert_eq!(updated.config["a"], 1);
            assert_eq!(updated.config["engine"], "postgres");
        }

        let stored = service.get_resource(resource.id).await.unwrap();
        assert_eq!(stored.config["a"], 1);
        assert_eq!(stored.config["engine"], "postgres");
        assert_eq!(stored.config["backup"]["retentionDays"], 7);
        assert_eq!(stored.config.as_object().unwrap().len(), 4);

        // status and audit come from the same write
        let audit = stored.last_automation().unwrap();
        assert!(job_ids.contains(&audit.job_id));
        let expected = if audit.success {
            ResourceStatus::Running
        } else {
            ResourceStatus::Failed
        };
        assert_eq!(stored.status, expected);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let service = ResourceService::new(Arc::new(InMemoryResourceStore::new()));
        let err = service
            .record_automation(
                Uuid::new_v4(),
                RecordAutomation {
                    status: ResourceStatus::Failed,
                    last_automation: AutomationAudit::now(Uuid::new_v4(), false),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let service = ResourceService::new(Arc::new(InMemoryResourceStore::new()));
        let mut req = create_request(json!({}));
        req.name = "  ".to_string();
        assert!(matches!(
            service.create_resource(req).await.unwrap_err(),
            ResourceError::ValidationError(_)
        ));
    }
}
