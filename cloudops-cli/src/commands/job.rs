//! Job command handlers
//!
//! Submits automation jobs for a resource and follows them through the
//! queue: status, cancellation and waiting for a final state.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use cloudops_client::OrchestratorClient;
use cloudops_core::domain::job::{JobAction, JobOutput, JobPayload, JobRequest, JobState};
use cloudops_core::dto::job::JobStatus;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use super::load_json;
use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Queue Terraform generation for a resource
    Terraform {
        /// Resource the outcome is recorded against
        resource_id: String,

        /// JSON file with the Terraform configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Queue a Kubernetes deployment/service/ingress stack for a resource
    Kubernetes {
        /// Resource the outcome is recorded against
        resource_id: String,

        /// JSON file with the stack configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Queue Dockerfile generation for a resource
    Docker {
        /// Resource the outcome is recorded against
        resource_id: String,

        /// JSON file with the image configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show a job's state and result
    Status {
        /// Job ID
        id: Uuid,
    },
    /// Cancel a waiting or running job
    Cancel {
        /// Job ID
        id: Uuid,
    },
    /// Block until a job completes or fails
    Wait {
        /// Job ID
        id: Uuid,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,

        /// Seconds between status polls
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
///
/// # Arguments
/// * `command` - The job command to execute
/// * `config` - The CLI configuration
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(config.orchestrator_url.clone());

    match command {
        JobCommands::Terraform {
            resource_id,
            config,
        } => submit(&client, JobAction::ProvisionTerraform, &resource_id, config.as_deref()).await,
        JobCommands::Kubernetes {
            resource_id,
            config,
        } => submit(&client, JobAction::ProvisionKubernetes, &resource_id, config.as_deref()).await,
        JobCommands::Docker {
            resource_id,
            config,
        } => submit(&client, JobAction::GenerateDocker, &resource_id, config.as_deref()).await,
        JobCommands::Status { id } => show_status(&client, id).await,
        JobCommands::Cancel { id } => cancel(&client, id).await,
        JobCommands::Wait {
            id,
            timeout,
            interval,
        } => wait(&client, id, timeout, interval).await,
    }
}

/// Validates the config file locally, then queues the job
async fn submit(
    client: &OrchestratorClient,
    action: JobAction,
    resource_id: &str,
    config_path: Option<&Path>,
) -> Result<()> {
    let request = build_request(action, load_json(config_path)?)?;

    let created = client
        .submit_job(resource_id, request)
        .await
        .with_context(|| format!("Failed to submit {} job", action))?;

    println!(
        "{} {} job queued for resource {}",
        "✓".green(),
        action.to_string().bold(),
        resource_id.cyan()
    );
    println!("  Job ID:  {}", created.job_id.to_string().cyan());
    println!("  Status:  {}", created.status);
    println!(
        "  {}",
        format!("Follow with: cloudops job wait {}", created.job_id).dimmed()
    );

    Ok(())
}

/// Types `config` for `action` so malformed input is caught before queueing
fn build_request(action: JobAction, config: serde_json::Value) -> Result<JobRequest> {
    let payload = JobPayload {
        action: action.as_str().to_string(),
        resource_id: None,
        config,
    };

    Ok(JobRequest::from_payload(&payload)?)
}

async fn show_status(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    match client.get_job_status(id).await? {
        Some(status) => print_job_details(&status),
        None => println!("{}", format!("Job {} not found.", id).yellow()),
    }

    Ok(())
}

async fn cancel(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    if client.cancel_job(id).await? {
        println!("{} Job {} cancelled", "✓".green(), id.to_string().cyan());
    } else {
        println!(
            "{}",
            format!("Job {} was not cancelled (unknown or already finished).", id).yellow()
        );
    }

    Ok(())
}

async fn wait(client: &OrchestratorClient, id: Uuid, timeout: u64, interval: u64) -> Result<()> {
    println!(
        "{}",
        format!("Waiting for job {} (timeout {}s)...", id, timeout).dimmed()
    );

    let status = client
        .wait_for_job(
            id,
            Duration::from_secs(interval.max(1)),
            Duration::from_secs(timeout),
        )
        .await?;

    print_job_details(&status);

    if status.state != JobState::Completed {
        bail!("job {} finished as {}", id, status.state);
    }

    Ok(())
}

/// Print detailed job information
fn print_job_details(status: &JobStatus) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", status.id.to_string().cyan());
    println!("  Action:    {}", status.data.action);
    if let Some(resource_id) = &status.data.resource_id {
        println!("  Resource:  {}", resource_id.dimmed());
    }
    println!("  State:     {}", colorize_state(status.state));
    println!("  Progress:  {}%", status.progress);

    if let Some(value) = &status.return_value {
        println!("\n{}", "Result:".bold());
        println!("  Artifacts: {}", value.artifact_path.cyan());
        println!("\n{}", "Output:".bold());
        for (title, body) in output_sections(&value.output) {
            if let Some(title) = title {
                println!("{}", format!("--- {} ---", title).dimmed());
            }
            println!("{}", body);
        }
    }

    if let Some(reason) = &status.failed_reason {
        println!("\n{}", "Error:".bold());
        println!("{}", reason.red());
    }
}

/// Splits a job's output into printable sections, titled for multi-file stacks
fn output_sections(output: &JobOutput) -> Vec<(Option<&'static str>, &str)> {
    match output {
        JobOutput::Text(text) => vec![(None, text.as_str())],
        JobOutput::KubernetesStack {
            deployment,
            service,
            ingress,
        } => vec![
            (Some("deployment.yaml"), deployment.as_str()),
            (Some("service.yaml"), service.as_str()),
            (Some("ingress.yaml"), ingress.as_str()),
        ],
    }
}

/// Colorize job state for display
fn colorize_state(state: JobState) -> ColoredString {
    let label = state.as_str();
    match state {
        JobState::Waiting => label.yellow(),
        JobState::Active => label.cyan(),
        JobState::Completed => label.green(),
        JobState::Failed => label.red(),
        JobState::Removed => label.dimmed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_request_applies_defaults() {
        let request = build_request(JobAction::GenerateDocker, serde_json::Value::Null).unwrap();

        let JobRequest::GenerateDocker(config) = request else {
            panic!("expected docker request");
        };
        assert_eq!(config.node_version, "20");
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_build_request_reads_kubernetes_fields() {
        let request = build_request(
            JobAction::ProvisionKubernetes,
            json!({ "name": "shop", "namespace": "prod", "replicas": 3 }),
        )
        .unwrap();

        let JobRequest::ProvisionKubernetes(config) = request else {
            panic!("expected kubernetes request");
        };
        assert_eq!(config.name, "shop");
        assert_eq!(config.namespace, "prod");
        assert_eq!(config.replicas, 3);
    }

    #[test]
    fn test_build_request_rejects_mistyped_config() {
        let err = build_request(JobAction::GenerateDocker, json!({ "port": "eighty" })).unwrap_err();

        assert!(err.to_string().starts_with("invalid config for generate-docker"));
    }

    #[test]
    fn test_output_sections() {
        let text = JobOutput::Text("FROM alpine".into());
        assert_eq!(output_sections(&text), vec![(None, "FROM alpine")]);

        let stack = JobOutput::KubernetesStack {
            deployment: "d".into(),
            service: "s".into(),
            ingress: "i".into(),
        };
        let titles: Vec<_> = output_sections(&stack).into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            titles,
            vec![Some("deployment.yaml"), Some("service.yaml"), Some("ingress.yaml")]
        );
    }
}
