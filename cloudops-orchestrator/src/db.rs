use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Durable automation queue
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS automation_jobs (
            id UUID PRIMARY KEY,
            action VARCHAR(64) NOT NULL,
            resource_id VARCHAR(255),
            config JSONB NOT NULL DEFAULT '{}',
            state VARCHAR(20) NOT NULL,
            progress SMALLINT NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ,
            worker_id VARCHAR(255),
            lease_expires_at TIMESTAMPTZ,
            return_value JSONB,
            failed_reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_automation_jobs_state ON automation_jobs(state, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_automation_jobs_lease ON automation_jobs(lease_expires_at) WHERE state = 'active'",
    )
    .execute(pool)
    .await?;

    // Infrastructure resource records
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS infrastructure (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            kind VARCHAR(64) NOT NULL,
            provider VARCHAR(64) NOT NULL,
            region VARCHAR(64),
            status VARCHAR(20) NOT NULL,
            config JSONB NOT NULL DEFAULT '{}',
            tags JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_infrastructure_status ON infrastructure(status)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
