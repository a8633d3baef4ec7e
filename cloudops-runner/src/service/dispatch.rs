//! Job dispatch
//!
//! Turns a claimed [`QueuedJob`] into generator calls according to its
//! action, saves what was generated and builds the job's return value.

use async_trait::async_trait;
use cloudops_core::domain::job::{JobOutput, JobRequest, JobRequestError, JobReturnValue, QueuedJob};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::generator::{DockerGenerator, GenerationError, KubernetesGenerator, TerraformGenerator};
use crate::invoker::GeneratorInvoker;
use crate::service::artifact_store::ArtifactStore;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unknown action or malformed config; never worth retrying
    #[error(transparent)]
    InvalidRequest(#[from] JobRequestError),

    #[error(transparent)]
    Generation(GenerationError),

    #[error("failed to save artifact: {0:#}")]
    Storage(anyhow::Error),

    #[error("job cancelled")]
    Cancelled,
}

impl DispatchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DispatchError::Cancelled)
    }
}

impl From<GenerationError> for DispatchError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Cancelled => DispatchError::Cancelled,
            other => DispatchError::Generation(other),
        }
    }
}

/// Executes claimed jobs
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &QueuedJob,
        cancel: &CancellationToken,
    ) -> Result<JobReturnValue, DispatchError>;
}

/// [`JobExecutor`] that routes each action to its generator
pub struct AutomationDispatcher {
    terraform: TerraformGenerator,
    kubernetes: KubernetesGenerator,
    docker: DockerGenerator,
    store: Arc<dyn ArtifactStore>,
}

impl AutomationDispatcher {
    pub fn new(invoker: Arc<dyn GeneratorInvoker>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            terraform: TerraformGenerator::new(Arc::clone(&invoker)),
            kubernetes: KubernetesGenerator::new(Arc::clone(&invoker)),
            docker: DockerGenerator::new(invoker),
            store,
        }
    }

    async fn save(&self, owner: &str, file_name: &str, content: &str) -> Result<String, DispatchError> {
        self.store
            .save(owner, file_name, content)
            .await
            .map(|path| path.display().to_string())
            .map_err(DispatchError::Storage)
    }
}

#[async_trait]
impl JobExecutor for AutomationDispatcher {
    async fn execute(
        &self,
        job: &QueuedJob,
        cancel: &CancellationToken,
    ) -> Result<JobReturnValue, DispatchError> {
        let request = JobRequest::from_payload(&job.payload)?;
        let owner = job
            .payload
            .resource_id
            .clone()
            .unwrap_or_else(|| job.id.to_string());

        info!(job_id = %job.id, action = %request.action(), owner = %owner, "Dispatching job");

        let value = match request {
            JobRequest::ProvisionTerraform(config) => {
                let tf = self.terraform.generate(&config, cancel).await?;
                let artifact_path = self.save(&owner, "main.tf", &tf).await?;

                JobReturnValue {
                    success: true,
                    output: JobOutput::Text(tf),
                    artifact_path,
                }
            }
            JobRequest::ProvisionKubernetes(config) => {
                let stack = self.kubernetes.generate_full_stack(&config, cancel).await?;
                self.save(&owner, "deployment.yaml", &stack.deployment).await?;
                self.save(&owner, "service.yaml", &stack.service).await?;
                self.save(&owner, "ingress.yaml", &stack.ingress).await?;

                JobReturnValue {
                    success: true,
                    output: JobOutput::KubernetesStack {
                        deployment: stack.deployment,
                        service: stack.service,
                        ingress: stack.ingress,
                    },
                    artifact_path: self.store.location(&owner).display().to_string(),
                }
            }
            JobRequest::GenerateDocker(config) => {
                let dockerfile = self.docker.generate_nodejs(&config, cancel).await?;
                let artifact_path = self.save(&owner, "Dockerfile", &dockerfile).await?;

                JobReturnValue {
                    success: true,
                    output: JobOutput::Text(dockerfile),
                    artifact_path,
                }
            }
        };

        Ok(value)
    }
}
