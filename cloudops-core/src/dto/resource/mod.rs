//! Resource DTOs

use serde::{Deserialize, Serialize};

use crate::domain::resource::{AutomationAudit, ResourceStatus};

/// Request to register an infrastructure resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResource {
    pub name: String,
    pub kind: String,
    pub provider: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub tags: serde_json::Value,
}

/// Status update written after an automation job
///
/// The audit entry is merged into the resource's existing config; other
/// config keys are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAutomation {
    pub status: ResourceStatus,
    pub last_automation: AutomationAudit,
}
