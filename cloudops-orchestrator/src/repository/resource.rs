//! Resource Repository
//!
//! Database operations for the `infrastructure` table.

use chrono::{DateTime, Utc};
use cloudops_core::domain::resource::{AutomationAudit, Resource, ResourceStatus};
use cloudops_core::dto::resource::{CreateResource, RecordAutomation};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

/// Create a new resource record
pub async fn create(pool: &PgPool, req: CreateResource) -> Result<Resource, sqlx::Error> {
    let now = Utc::now();

    let resource = Resource {
        id: Uuid::new_v4(),
        name: req.name,
        kind: req.kind,
        provider: req.provider,
        region: req.region,
        status: ResourceStatus::Pending,
        config: object_or_empty(req.config),
        tags: object_or_empty(req.tags),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO infrastructure (id, name, kind, provider, region, status, config, tags, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(resource.id)
    .bind(&resource.name)
    .bind(&resource.kind)
    .bind(&resource.provider)
    .bind(&resource.region)
    .bind(resource.status.as_str())
    .bind(&resource.config)
    .bind(&resource.tags)
    .bind(resource.created_at)
    .bind(resource.updated_at)
    .execute(pool)
    .await?;

    Ok(resource)
}

/// Find a resource by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Resource>, sqlx::Error> {
    let row = sqlx::query_as::<_, ResourceRow>(
        r#"
        SELECT id, name, kind, provider, region, status, config, tags, created_at, updated_at
        FROM infrastructure
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Set a resource's status and merge an automation audit into its config
///
/// The merge happens inside one `UPDATE`, so concurrent jobs on the same
/// resource serialize on the row lock and never drop each other's keys.
pub async fn record_automation(
    pool: &PgPool,
    id: Uuid,
    update: &RecordAutomation,
) -> Result<Option<Resource>, sqlx::Error> {
    let row = sqlx::query_as::<_, ResourceRow>(
        r#"
        UPDATE infrastructure
        SET status = $2,
            config = (CASE WHEN jsonb_typeof(config) = 'object' THEN config ELSE '{}'::jsonb END)
                     || jsonb_build_object($3::text, $4::jsonb),
            updated_at = $5
        WHERE id = $1
        RETURNING id, name, kind, provider, region, status, config, tags, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(update.status.as_str())
    .bind(AutomationAudit::CONFIG_KEY)
    .bind(Json(&update.last_automation))
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn object_or_empty(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(_) => value,
        _ => serde_json::Value::Object(Default::default()),
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: Uuid,
    name: String,
    kind: String,
    provider: String,
    region: Option<String>,
    status: String,
    config: serde_json::Value,
    tags: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Resource {
            id: row.id,
            name: row.name,
            kind: row.kind,
            provider: row.provider,
            region: row.region,
            status: ResourceStatus::parse(&row.status).unwrap_or_default(),
            config: row.config,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
