//! Type-specific generators
//!
//! Each generator shapes a typed config into an [`AutomationTask`], runs it
//! through a [`GeneratorInvoker`] and picks the expected file out of the
//! harvested artifacts. When the invocation succeeds but the expected file is
//! missing, the artifact is rendered locally from the config instead.

pub mod docker;
pub mod kubernetes;
pub mod terraform;

pub use docker::DockerGenerator;
pub use kubernetes::{KubernetesGenerator, KubernetesStack};
pub use terraform::TerraformGenerator;

use cloudops_core::domain::artifact::InvocationResult;
use cloudops_core::domain::task::AutomationTask;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::invoker::GeneratorInvoker;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Terraform generation failed: {0}")]
    Terraform(String),

    #[error("Kubernetes generation failed: {0}")]
    Kubernetes(String),

    #[error("Dockerfile generation failed: {0}")]
    Docker(String),

    #[error("generation cancelled")]
    Cancelled,
}

/// Invokes `task` and turns an unsuccessful result into an error
async fn invoke_checked(
    invoker: &dyn GeneratorInvoker,
    task: &AutomationTask,
    cancel: &CancellationToken,
    wrap: fn(String) -> GenerationError,
) -> Result<InvocationResult, GenerationError> {
    let result = invoker.invoke(task, cancel).await;

    if result.success {
        return Ok(result);
    }

    if cancel.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }

    Err(wrap(
        result
            .error
            .unwrap_or_else(|| "generator reported failure".to_string()),
    ))
}

fn task_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use cloudops_core::domain::artifact::{Artifact, ArtifactBundle};
    use std::sync::Mutex;

    /// Returns a canned result and records every task it receives
    pub(crate) struct FakeInvoker {
        files: Vec<Artifact>,
        failure: Option<String>,
        pub(crate) tasks: Mutex<Vec<AutomationTask>>,
    }

    impl FakeInvoker {
        pub(crate) fn succeeding(files: &[(&str, &str)]) -> Self {
            Self {
                files: files.iter().map(|(p, c)| Artifact::new(*p, *c)).collect(),
                failure: None,
                tasks: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(reason: &str) -> Self {
            Self {
                files: Vec::new(),
                failure: Some(reason.to_string()),
                tasks: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn recorded(&self) -> Vec<AutomationTask> {
            self.tasks.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GeneratorInvoker for FakeInvoker {
        async fn invoke(&self, task: &AutomationTask, _cancel: &CancellationToken) -> InvocationResult {
            self.tasks.lock().unwrap().push(task.clone());

            match &self.failure {
                Some(reason) => InvocationResult::failed("", reason.clone(), 1),
                None => InvocationResult {
                    success: true,
                    output: String::new(),
                    error: None,
                    duration_ms: 1,
                    artifacts: Some(ArtifactBundle {
                        files: self.files.clone(),
                    }),
                },
            }
        }
    }
}
