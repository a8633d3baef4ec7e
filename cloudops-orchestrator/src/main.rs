use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
pub mod store;

use config::{Config, StorageBackend};
use service::{AutomationService, QueuePolicy, ResourceService};
use store::{
    InMemoryJobQueue, InMemoryResourceStore, JobQueue, PgJobQueue, PgResourceStore, ResourceStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    tracing::info!("Starting CloudOps Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let (queue, resources) = build_stores(&config).await?;

    let automation = Arc::new(AutomationService::new(
        queue,
        QueuePolicy {
            lease: config.job_lease,
            max_attempts: config.max_attempts,
        },
    ));
    let resources = Arc::new(ResourceService::new(resources));

    let shutdown = CancellationToken::new();

    let reaper = tokio::spawn(service::reaper::run_lease_reaper(
        automation.clone(),
        config.reaper_interval,
        shutdown.clone(),
    ));

    let app = api::create_router(api::AppState {
        automation,
        resources,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    let _ = reaper.await;

    tracing::info!("Orchestrator stopped");
    Ok(())
}

/// Installs the global subscriber; `LOG_FORMAT=json` selects JSON output
fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cloudops_orchestrator=debug,tower_http=debug".into());
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

async fn build_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn JobQueue>, Arc<dyn ResourceStore>)> {
    match config.storage {
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(&config.database_url)
                .await
                .context("Failed to create database pool")?;

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok((
                Arc::new(PgJobQueue::new(pool.clone())),
                Arc::new(PgResourceStore::new(pool)),
            ))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; jobs and resources are lost on restart");
            Ok((
                Arc::new(InMemoryJobQueue::new()),
                Arc::new(InMemoryResourceStore::new()),
            ))
        }
    }
}
