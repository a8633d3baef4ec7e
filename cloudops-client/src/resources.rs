//! Resource-related API endpoints

use cloudops_core::domain::resource::Resource;
use cloudops_core::dto::resource::{CreateResource, RecordAutomation};
use uuid::Uuid;

use crate::OrchestratorClient;
use crate::error::Result;

impl OrchestratorClient {
    /// Register a new infrastructure resource
    pub async fn create_resource(&self, req: CreateResource) -> Result<Resource> {
        let url = format!("{}/resources", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get a resource by ID, or `None` if it does not exist
    pub async fn get_resource(&self, resource_id: Uuid) -> Result<Option<Resource>> {
        let url = format!("{}/resources/{}", self.base_url, resource_id);
        let response = self.client.get(&url).send().await?;

        self.handle_optional_response(response).await
    }

    /// Record an automation outcome against a resource
    ///
    /// The orchestrator merges the audit entry into the resource config.
    ///
    /// # Arguments
    /// * `resource_id` - Resource id as carried by the job payload
    /// * `update` - New status and audit entry
    pub async fn record_automation(
        &self,
        resource_id: &str,
        update: &RecordAutomation,
    ) -> Result<Resource> {
        let url = format!("{}/resources/{}/automation", self.base_url, resource_id);
        let response = self.client.post(&url).json(update).send().await?;

        self.handle_response(response).await
    }
}
