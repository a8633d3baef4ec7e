//! Infrastructure resource records
//!
//! Resources are owned by the orchestrator. Automation jobs only touch them
//! through a status update that merges an audit entry into `config`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Running => "running",
            ResourceStatus::Completed => "completed",
            ResourceStatus::Failed => "failed",
            ResourceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(ResourceStatus::Pending),
            "running" => Some(ResourceStatus::Running),
            "completed" => Some(ResourceStatus::Completed),
            "failed" => Some(ResourceStatus::Failed),
            "cancelled" => Some(ResourceStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An infrastructure record (compute, database, cluster...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub provider: String,
    pub region: Option<String>,
    pub status: ResourceStatus,
    /// Free-form configuration; automation audits live under `lastAutomation`
    pub config: serde_json::Value,
    pub tags: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// The audit entry written by the most recent automation job, if any
    pub fn last_automation(&self) -> Option<AutomationAudit> {
        self.config
            .get(AutomationAudit::CONFIG_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Audit entry merged into a resource's config after an automation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationAudit {
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl AutomationAudit {
    pub const CONFIG_KEY: &'static str = "lastAutomation";

    pub fn now(job_id: Uuid, success: bool) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            success,
        }
    }
}

/// Merges `audit` into `config` under `lastAutomation`
///
/// Every other key is preserved. A non-object `config` is replaced by an
/// object holding only the audit entry.
pub fn merge_audit(config: &serde_json::Value, audit: &AutomationAudit) -> serde_json::Value {
    let mut merged = match config {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };

    merged.insert(
        AutomationAudit::CONFIG_KEY.to_string(),
        serde_json::to_value(audit).unwrap_or(serde_json::Value::Null),
    );

    serde_json::Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_preserves_existing_keys() {
        let audit = AutomationAudit::now(Uuid::new_v4(), true);
        let merged = merge_audit(&json!({ "a": 1, "nested": { "b": 2 } }), &audit);

        assert_eq!(merged["a"], 1);
        assert_eq!(merged["nested"]["b"], 2);
        assert_eq!(merged["lastAutomation"]["success"], true);
        assert_eq!(
            merged["lastAutomation"]["jobId"],
            json!(audit.job_id.to_string())
        );
    }

    #[test]
    fn test_merge_replaces_previous_audit() {
        let first = AutomationAudit::now(Uuid::new_v4(), false);
        let second = AutomationAudit::now(Uuid::new_v4(), true);

        let merged = merge_audit(&merge_audit(&json!({ "a": 1 }), &first), &second);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["lastAutomation"]["success"], true);
    }

    #[test]
    fn test_merge_into_non_object() {
        let audit = AutomationAudit::now(Uuid::new_v4(), false);
        let merged = merge_audit(&serde_json::Value::Null, &audit);
        assert!(merged.get("lastAutomation").is_some());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ResourceStatus::parse("running"), Some(ResourceStatus::Running));
        assert_eq!(ResourceStatus::parse("bogus"), None);
        assert_eq!(ResourceStatus::Failed.to_string(), "failed");
    }
}
