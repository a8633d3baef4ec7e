//! Queued automation job domain types
//!
//! The queue stores a loosely typed [`JobPayload`] (the wire and storage
//! shape). Producers and consumers work with the typed [`JobRequest`], which
//! is keyed by action and carries a concrete configuration for each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::config::{DockerJobConfig, KubernetesStackConfig, TerraformConfig};

/// Action a queued job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobAction {
    ProvisionTerraform,
    ProvisionKubernetes,
    GenerateDocker,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::ProvisionTerraform => "provision-terraform",
            JobAction::ProvisionKubernetes => "provision-kubernetes",
            JobAction::GenerateDocker => "generate-docker",
        }
    }

    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "provision-terraform" => Some(JobAction::ProvisionTerraform),
            "provision-kubernetes" => Some(JobAction::ProvisionKubernetes),
            "generate-docker" => Some(JobAction::GenerateDocker),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Queue-managed job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Removed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Removed => "removed",
        }
    }

    pub fn parse(state: &str) -> Option<Self> {
        match state {
            "waiting" => Some(JobState::Waiting),
            "active" => Some(JobState::Active),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "removed" => Some(JobState::Removed),
            _ => None,
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Removed
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Queue submission payload as stored and transferred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum JobRequestError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid config for {action}: {reason}")]
    InvalidConfig { action: JobAction, reason: String },
}

/// A typed job submission, one variant per action
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    ProvisionTerraform(TerraformConfig),
    ProvisionKubernetes(KubernetesStackConfig),
    GenerateDocker(DockerJobConfig),
}

impl JobRequest {
    pub fn action(&self) -> JobAction {
        match self {
            JobRequest::ProvisionTerraform(_) => JobAction::ProvisionTerraform,
            JobRequest::ProvisionKubernetes(_) => JobAction::ProvisionKubernetes,
            JobRequest::GenerateDocker(_) => JobAction::GenerateDocker,
        }
    }

    /// Lowers the request into its stored payload form
    pub fn into_payload(self, resource_id: Option<String>) -> JobPayload {
        let action = self.action().as_str().to_string();
        let config = match self {
            JobRequest::ProvisionTerraform(config) => serde_json::to_value(config),
            JobRequest::ProvisionKubernetes(config) => serde_json::to_value(config),
            JobRequest::GenerateDocker(config) => serde_json::to_value(config),
        }
        .unwrap_or(serde_json::Value::Null);

        JobPayload {
            action,
            resource_id,
            config,
        }
    }

    /// Parses a stored payload back into its typed form
    ///
    /// A `null` config is treated as an empty object so every field takes its
    /// default.
    pub fn from_payload(payload: &JobPayload) -> Result<Self, JobRequestError> {
        let action = JobAction::parse(&payload.action)
            .ok_or_else(|| JobRequestError::UnknownAction(payload.action.clone()))?;

        let config = match &payload.config {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };

        let invalid = |e: serde_json::Error| JobRequestError::InvalidConfig {
            action,
            reason: e.to_string(),
        };

        let request = match action {
            JobAction::ProvisionTerraform => {
                JobRequest::ProvisionTerraform(serde_json::from_value(config).map_err(invalid)?)
            }
            JobAction::ProvisionKubernetes => {
                JobRequest::ProvisionKubernetes(serde_json::from_value(config).map_err(invalid)?)
            }
            JobAction::GenerateDocker => {
                JobRequest::GenerateDocker(serde_json::from_value(config).map_err(invalid)?)
            }
        };

        Ok(request)
    }
}

/// Output carried by a successful job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    KubernetesStack {
        deployment: String,
        service: String,
        ingress: String,
    },
    Text(String),
}

/// Return value recorded when a job completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReturnValue {
    pub success: bool,
    pub output: JobOutput,
    /// File (or directory for multi-file output) where artifacts were saved
    pub artifact_path: String,
}

/// Durable queue record
///
/// Owned by the orchestrator's queue. Runners only see it through claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedJob {
    pub id: Uuid,
    pub payload: JobPayload,
    pub state: JobState,
    pub progress: u8,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub return_value: Option<JobReturnValue>,
    pub failed_reason: Option<String>,
}

impl QueuedJob {
    /// A freshly enqueued job in the `waiting` state
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            state: JobState::Waiting,
            progress: 0,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            worker_id: None,
            lease_expires_at: None,
            return_value: None,
            failed_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_round_trips_through_payload() {
        let request = JobRequest::ProvisionKubernetes(KubernetesStackConfig {
            namespace: "prod".to_string(),
            ..Default::default()
        });

        let payload = request.clone().into_payload(Some("res-1".to_string()));
        assert_eq!(payload.action, "provision-kubernetes");
        assert_eq!(payload.resource_id.as_deref(), Some("res-1"));
        assert_eq!(payload.config["namespace"], "prod");

        assert_eq!(JobRequest::from_payload(&payload).unwrap(), request);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let payload = JobPayload {
            action: "deploy-ansible".to_string(),
            resource_id: None,
            config: json!({}),
        };

        let err = JobRequest::from_payload(&payload).unwrap_err();
        assert!(matches!(err, JobRequestError::UnknownAction(a) if a == "deploy-ansible"));
    }

    #[test]
    fn test_null_config_uses_defaults() {
        let payload = JobPayload {
            action: "generate-docker".to_string(),
            resource_id: None,
            config: serde_json::Value::Null,
        };

        match JobRequest::from_payload(&payload).unwrap() {
            JobRequest::GenerateDocker(config) => assert_eq!(config.port, 3000),
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_reports_action() {
        let payload = JobPayload {
            action: "provision-terraform".to_string(),
            resource_id: None,
            config: json!({ "provider": "oracle" }),
        };

        let err = JobRequest::from_payload(&payload).unwrap_err();
        assert!(matches!(
            err,
            JobRequestError::InvalidConfig {
                action: JobAction::ProvisionTerraform,
                ..
            }
        ));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Waiting.is_terminal());
        assert!(!JobState::Active.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Removed.is_terminal());
        assert_eq!(JobState::parse("removed"), Some(JobState::Removed));
    }

    #[test]
    fn test_job_output_untagged() {
        let stack: JobOutput = serde_json::from_value(json!({
            "deployment": "a", "service": "b", "ingress": "c"
        }))
        .unwrap();
        assert!(matches!(stack, JobOutput::KubernetesStack { .. }));

        let text: JobOutput = serde_json::from_value(json!("resource {}")).unwrap();
        assert_eq!(text, JobOutput::Text("resource {}".to_string()));
    }
}
