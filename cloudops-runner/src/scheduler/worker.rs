//! Job worker
//!
//! Polls the orchestrator for waiting jobs, claims as many as capacity
//! allows and runs each in its own task. Every running job is heartbeated so
//! its lease stays alive; a heartbeat answered with `cancelled` trips the
//! job's cancellation token, which kills the generator process.

use anyhow::{Context, Result};
use cloudops_core::domain::job::{JobReturnValue, QueuedJob};
use cloudops_core::domain::resource::{AutomationAudit, ResourceStatus};
use cloudops_core::dto::job::JobOutcome;
use cloudops_core::dto::resource::RecordAutomation;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::repository::{JobRepository, ResourceRepository};
use crate::service::JobExecutor;

const EVENT_CAPACITY: usize = 64;

/// Terminal event published for every job the worker reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Completed {
        job_id: Uuid,
        return_value: JobReturnValue,
    },
    Failed {
        job_id: Uuid,
        error: String,
    },
}

/// Worker that continuously polls for and executes automation jobs
#[derive(Clone)]
pub struct Worker {
    poll_interval: Duration,
    heartbeat_interval: Duration,
    max_parallel_jobs: usize,
    semaphore: Arc<Semaphore>,
    jobs: Arc<dyn JobRepository>,
    resources: Arc<dyn ResourceRepository>,
    executor: Arc<dyn JobExecutor>,
    events: broadcast::Sender<JobEvent>,
}

impl Worker {
    pub fn new(
        config: &Config,
        jobs: Arc<dyn JobRepository>,
        resources: Arc<dyn ResourceRepository>,
        executor: Arc<dyn JobExecutor>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            poll_interval: config.poll_interval,
            heartbeat_interval: config.heartbeat_interval,
            max_parallel_jobs: config.max_parallel_jobs,
            semaphore: Arc::new(Semaphore::new(config.max_parallel_jobs)),
            jobs,
            resources,
            executor,
            events,
        }
    }

    /// Receives a [`JobEvent`] for every job completed or failed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Polls until `shutdown` is cancelled, then waits for in-flight jobs
    ///
    /// Jobs interrupted by shutdown are not reported; their leases expire
    /// and the orchestrator hands them out again.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Starting worker (poll interval: {:?}, max parallel jobs: {})",
            self.poll_interval, self.max_parallel_jobs
        );

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            debug!("Polling for waiting jobs");

            match self.poll_once(&shutdown).await {
                Ok(started) if started > 0 => info!("Started {} job(s) this cycle", started),
                Ok(_) => {}
                Err(e) => error!("Error during poll cycle: {:#}", e),
            }
        }

        info!("Worker stopping, waiting for in-flight jobs");
        self.wait_idle().await;
        info!("Worker stopped");
        Ok(())
    }

    /// Performs a single poll cycle and returns the number of jobs started
    pub async fn poll_once(&self, shutdown: &CancellationToken) -> Result<usize> {
        let waiting = self
            .jobs
            .list_waiting()
            .await
            .context("Failed to fetch waiting jobs")?;

        if waiting.is_empty() {
            debug!("No jobs available");
            return Ok(0);
        }

        let mut started = 0;

        for job in waiting {
            let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                debug!("Max parallel jobs reached, leaving remaining jobs for later");
                break;
            };

            let claimed = match self.jobs.claim(job.id).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => continue,
                Err(e) => {
                    warn!(job_id = %job.id, "Failed to claim job: {:#}", e);
                    continue;
                }
            };

            info!(job_id = %claimed.id, action = %claimed.payload.action, "Claimed job");

            let worker = self.clone();
            let cancel = shutdown.child_token();
            tokio::spawn(async move {
                worker.process(claimed, cancel).await;
                drop(permit);
            });

            started += 1;
        }

        Ok(started)
    }

    /// Resolves once no job is running
    pub async fn wait_idle(&self) {
        let permits = u32::try_from(self.max_parallel_jobs).unwrap_or(u32::MAX);
        if let Ok(all) = self.semaphore.acquire_many(permits).await {
            drop(all);
        }
    }

    async fn process(&self, job: QueuedJob, cancel: CancellationToken) {
        let job_id = job.id;
        let heartbeat = self.spawn_heartbeat(job_id, cancel.clone());

        let result = self.executor.execute(&job, &cancel).await;
        heartbeat.abort();

        match result {
            Ok(return_value) => {
                info!(job_id = %job_id, artifact_path = %return_value.artifact_path, "Job completed");
                self.record_resource(&job, ResourceStatus::Running, true).await;
                self.report(
                    job_id,
                    JobOutcome::Completed {
                        return_value: return_value.clone(),
                    },
                )
                .await;
                self.publish(JobEvent::Completed {
                    job_id,
                    return_value,
                });
            }
            Err(e) if e.is_cancelled() => {
                info!(job_id = %job_id, "Job stopped before completion, not reporting");
            }
            Err(e) => {
                let reason = e.to_string();
                error!(job_id = %job_id, "Job failed: {}", reason);
                self.record_resource(&job, ResourceStatus::Failed, false).await;
                self.report(job_id, JobOutcome::Failed { reason: reason.clone() })
                    .await;
                self.publish(JobEvent::Failed {
                    job_id,
                    error: reason,
                });
            }
        }
    }

    /// Best-effort resource update; failures are logged and dropped
    async fn record_resource(&self, job: &QueuedJob, status: ResourceStatus, success: bool) {
        let Some(resource_id) = job.payload.resource_id.as_deref() else {
            debug!(job_id = %job.id, "No linked resource, skipping status update");
            return;
        };

        let update = RecordAutomation {
            status,
            last_automation: AutomationAudit::now(job.id, success),
        };

        if let Err(e) = self.resources.record_automation(resource_id, &update).await {
            warn!(job_id = %job.id, resource_id = %resource_id, "Failed to update resource status: {:#}", e);
        }
    }

    async fn report(&self, job_id: Uuid, outcome: JobOutcome) {
        if let Err(e) = self.jobs.complete(job_id, outcome).await {
            error!(job_id = %job_id, "Failed to report job outcome: {:#}", e);
        }
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn spawn_heartbeat(&self, job_id: Uuid, cancel: CancellationToken) -> JoinHandle<()> {
        let jobs = Arc::clone(&self.jobs);
        let mut ticker = time::interval(self.heartbeat_interval);

        tokio::spawn(async move {
            // First tick fires immediately; the claim already set the lease
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                match jobs.heartbeat(job_id).await {
                    Ok(beat) if beat.cancelled => {
                        info!(job_id = %job_id, "Job cancelled by orchestrator, stopping");
                        cancel.cancel();
                        return;
                    }
                    Ok(beat) => debug!(job_id = %job_id, lease_expires_at = ?beat.lease_expires_at, "Heartbeat sent"),
                    Err(e) => warn!(job_id = %job_id, "Failed to send heartbeat: {:#}", e),
                }
            }
        })
    }
}
