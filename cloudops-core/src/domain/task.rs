//! Automation task domain types
//!
//! An [`AutomationTask`] is one request to the external generator. It only
//! lives for the duration of a single invocation and is never persisted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout applied when a task does not carry its own (5 minutes)
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 300_000;

/// What the generator is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Terraform,
    Kubernetes,
    Docker,
    Ansible,
    Custom,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Terraform => write!(f, "terraform"),
            TaskKind::Kubernetes => write!(f, "kubernetes"),
            TaskKind::Docker => write!(f, "docker"),
            TaskKind::Ansible => write!(f, "ansible"),
            TaskKind::Custom => write!(f, "custom"),
        }
    }
}

/// Task priority
///
/// Only [`Priority::Critical`] changes control flow: a failed critical task
/// stops a sequential batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A unit of generation work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationTask {
    pub id: String,
    pub kind: TaskKind,
    /// Free-text instruction, used verbatim for kinds without a prompt builder
    pub description: String,
    /// Kind-specific configuration (provider/region/resources for terraform, ...)
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl AutomationTask {
    /// Creates a task with medium priority and the default timeout
    pub fn new(
        id: impl Into<String>,
        kind: TaskKind,
        description: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            description: description.into(),
            context,
            priority: Priority::default(),
            timeout_ms: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Effective timeout, falling back to [`DEFAULT_TASK_TIMEOUT_MS`]
    ///
    /// A zero timeout is treated as unset.
    pub fn timeout(&self) -> Duration {
        self.timeout_or(Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS))
    }

    /// Effective timeout with a caller-supplied default
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    /// Task id with every character outside `[A-Za-z0-9_-]` replaced by `_`
    ///
    /// Used as the name of the task's working directory.
    pub fn sanitized_id(&self) -> String {
        self.id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    pub fn is_critical(&self) -> bool {
        self.priority == Priority::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_id_replaces_unsafe_characters() {
        let task = AutomationTask::new(
            "../tf job:1",
            TaskKind::Terraform,
            "desc",
            serde_json::Value::Null,
        );
        assert_eq!(task.sanitized_id(), "___tf_job_1");
    }

    #[test]
    fn test_sanitized_id_keeps_dashes_and_underscores() {
        let task = AutomationTask::new("k8s-abc_1", TaskKind::Kubernetes, "", serde_json::Value::Null);
        assert_eq!(task.sanitized_id(), "k8s-abc_1");
    }

    #[test]
    fn test_timeout_defaults() {
        let task = AutomationTask::new("t", TaskKind::Docker, "", serde_json::Value::Null);
        assert_eq!(task.timeout(), Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS));

        let task = task.with_timeout_ms(0);
        assert_eq!(task.timeout(), Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS));

        let task = task.with_timeout_ms(1500);
        assert_eq!(task.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_task_deserializes_with_defaults() {
        let task: AutomationTask = serde_json::from_value(serde_json::json!({
            "id": "t-1",
            "kind": "custom",
            "description": "write a README",
        }))
        .unwrap();

        assert_eq!(task.kind, TaskKind::Custom);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.context.is_null());
        assert!(task.timeout_ms.is_none());
    }
}
