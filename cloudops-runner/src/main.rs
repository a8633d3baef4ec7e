//! CloudOps Runner
//!
//! A stateless worker that executes automation jobs by driving an external
//! generator CLI.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Invoker: Spawns the generator in isolated task directories and harvests artifacts
//! - Generators: Terraform, Kubernetes and Docker builders with local fallbacks
//! - Repositories: HTTP communication with the orchestrator (jobs, resources)
//! - Services: Action dispatch and artifact persistence
//! - Scheduler: Job polling, heartbeats and task directory cleanup
//!
//! The runner polls the orchestrator for waiting jobs, claims them under a
//! lease, keeps the lease alive while the generator runs and reports the
//! outcome back.

pub mod artifacts;
pub mod config;
pub mod generator;
pub mod invoker;
pub mod repository;
pub mod scheduler;
pub mod service;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::invoker::CliInvoker;
use crate::repository::{HttpJobRepository, HttpResourceRepository};
use crate::scheduler::{JobEvent, Worker, run_cleanup_loop};
use crate::service::{AutomationDispatcher, LocalArtifactStore};
use cloudops_client::OrchestratorClient;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting CloudOps Runner");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: worker_id={}, orchestrator_url={}",
        config.worker_id, config.orchestrator_url
    );

    let invoker = Arc::new(
        CliInvoker::new(&config.generator_work_dir, &config.generator_command)
            .with_args(config.generator_args.clone())
            .with_default_timeout(config.generator_timeout),
    );

    if !invoker.validate_cli().await {
        warn!(
            "Generator CLI '{}' is not usable; generation jobs will fail until it is installed",
            config.generator_command
        );
    }

    let client = Arc::new(OrchestratorClient::new(config.orchestrator_url.clone()));
    info!("Orchestrator client initialized");

    let jobs = Arc::new(HttpJobRepository::new(
        Arc::clone(&client),
        config.worker_id.clone(),
    ));
    let resources = Arc::new(HttpResourceRepository::new(Arc::clone(&client)));
    let store = Arc::new(LocalArtifactStore::new(&config.artifacts_dir));
    let executor = Arc::new(AutomationDispatcher::new(invoker.clone(), store));

    let worker = Worker::new(&config, jobs, resources, executor);
    let shutdown = CancellationToken::new();

    let events = tokio::spawn(log_events(worker.subscribe()));
    let cleanup = tokio::spawn(run_cleanup_loop(
        invoker,
        config.cleanup_interval,
        config.cleanup_max_age,
        shutdown.clone(),
    ));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_shutdown.cancel();
    });

    info!("Runner initialized successfully");

    let result = worker.run(shutdown.clone()).await;

    shutdown.cancel();
    let _ = cleanup.await;
    drop(worker);
    let _ = events.await;

    if let Err(e) = &result {
        error!("Worker error: {:#}", e);
    }

    info!("Runner stopped");
    result
}

/// Installs the global subscriber; `LOG_FORMAT=json` selects JSON output
fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "cloudops_runner=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to initialize JSON logging")?,
        _ => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to initialize logging")?,
    }

    Ok(())
}

/// Logs terminal job events until the worker is dropped
async fn log_events(mut events: tokio::sync::broadcast::Receiver<JobEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(JobEvent::Completed {
                job_id,
                return_value,
            }) => info!(job_id = %job_id, artifact_path = %return_value.artifact_path, "job.completed"),
            Ok(JobEvent::Failed { job_id, error }) => {
                warn!(job_id = %job_id, error = %error, "job.failed")
            }
            Err(RecvError::Lagged(skipped)) => warn!("Dropped {} job events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
