//! Resources repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use cloudops_client::OrchestratorClient;
use cloudops_core::dto::resource::RecordAutomation;
use std::sync::Arc;

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Sets the resource status and merges the audit entry into its config
    async fn record_automation(&self, resource_id: &str, update: &RecordAutomation) -> Result<()>;
}

/// HTTP implementation of [`ResourceRepository`]
pub struct HttpResourceRepository {
    client: Arc<OrchestratorClient>,
}

impl HttpResourceRepository {
    pub fn new(client: Arc<OrchestratorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceRepository for HttpResourceRepository {
    async fn record_automation(&self, resource_id: &str, update: &RecordAutomation) -> Result<()> {
        self.client
            .record_automation(resource_id, update)
            .await
            .map(|_| ())
            .with_context(|| format!("Failed to record automation for resource {}", resource_id))
    }
}
