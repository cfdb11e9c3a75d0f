//! Workflow template model.
//!
//! Templates are versioned: a `(code, version)` row is immutable once
//! published. Editing a template publishes the next version and deactivates
//! the previous one; running instances keep the version they started with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A published workflow definition.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Unique identifier for this version row.
    pub id: Uuid,

    /// Stable template code shared across versions.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Entity type this template applies to (e.g. `incident`, `audit`).
    pub trigger_entity_type: String,

    /// Predicate over the start context; `NULL` means always applicable.
    pub trigger_conditions: Option<serde_json::Value>,

    /// Whether entity modules may start this template automatically.
    pub auto_trigger: bool,

    /// Overall SLA for the instance, in hours.
    pub sla_hours: i32,

    /// Explicit warning lead time in hours; `NULL` derives the warning from
    /// the configured threshold percentage.
    pub warning_hours: Option<i32>,

    /// Whether SLA hours accrue only during business hours.
    pub business_hours_only: bool,

    /// First business hour of the day (0-23).
    pub business_start_hour: i32,

    /// First non-business hour of the day (1-24).
    pub business_end_hour: i32,

    /// Whether weekends are excluded from business-hours accounting.
    pub exclude_weekends: bool,

    /// Ordered step definitions (JSON, parsed by the domain crate).
    pub steps: serde_json::Value,

    /// Ordered escalation rule definitions (JSON).
    pub escalation_rules: serde_json::Value,

    /// Whether this version is the active one for its code.
    pub is_active: bool,

    /// Monotonically increasing version number per code.
    pub version: i32,

    /// User who published this version.
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for publishing a template version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkflowTemplate {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub trigger_entity_type: String,
    pub trigger_conditions: Option<serde_json::Value>,
    pub auto_trigger: bool,
    pub sla_hours: i32,
    pub warning_hours: Option<i32>,
    pub business_hours_only: bool,
    pub business_start_hour: i32,
    pub business_end_hour: i32,
    pub exclude_weekends: bool,
    pub steps: serde_json::Value,
    pub escalation_rules: serde_json::Value,
    pub created_by: Option<Uuid>,
}

/// Filter options for listing templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub trigger_entity_type: Option<String>,
    pub is_active: Option<bool>,
}

impl WorkflowTemplate {
    /// Find the active version for a template code.
    pub async fn find_active_by_code(
        pool: &sqlx::PgPool,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM workflow_templates
            WHERE code = $1 AND is_active
            ORDER BY version DESC
            LIMIT 1
            ",
        )
        .bind(code)
        .fetch_optional(pool)
        .await
    }

    /// Find a template version row by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM workflow_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List active auto-trigger templates for an entity type.
    ///
    /// Used by entity modules to discover which workflows should start when a
    /// record is created or changed.
    pub async fn find_auto_trigger_for_entity_type(
        pool: &sqlx::PgPool,
        entity_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM workflow_templates
            WHERE trigger_entity_type = $1 AND is_active AND auto_trigger
            ORDER BY code, version DESC
            ",
        )
        .bind(entity_type)
        .fetch_all(pool)
        .await
    }

    /// List templates with filtering and pagination.
    pub async fn list(
        pool: &sqlx::PgPool,
        filter: &TemplateFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM workflow_templates
            WHERE ($1::text IS NULL OR trigger_entity_type = $1)
              AND ($2::boolean IS NULL OR is_active = $2)
            ORDER BY code, version DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(&filter.trigger_entity_type)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Deactivate all versions of a code. Returns the number of rows changed.
    ///
    /// Called inside the publish transaction before inserting the next
    /// version.
    pub async fn deactivate_code(
        conn: &mut sqlx::PgConnection,
        code: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE workflow_templates
            SET is_active = FALSE, updated_at = NOW()
            WHERE code = $1 AND is_active
            ",
        )
        .bind(code)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Highest published version for a code, 0 if none.
    pub async fn max_version(
        conn: &mut sqlx::PgConnection,
        code: &str,
    ) -> Result<i32, sqlx::Error> {
        let row: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) FROM workflow_templates WHERE code = $1",
        )
        .bind(code)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Insert a new template version.
    pub async fn insert_version(
        conn: &mut sqlx::PgConnection,
        input: &CreateWorkflowTemplate,
        version: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO workflow_templates (
                code, name, description, trigger_entity_type, trigger_conditions,
                auto_trigger, sla_hours, warning_hours, business_hours_only,
                business_start_hour, business_end_hour, exclude_weekends,
                steps, escalation_rules, version, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            ",
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.trigger_entity_type)
        .bind(&input.trigger_conditions)
        .bind(input.auto_trigger)
        .bind(input.sla_hours)
        .bind(input.warning_hours)
        .bind(input.business_hours_only)
        .bind(input.business_start_hour)
        .bind(input.business_end_hour)
        .bind(input.exclude_weekends)
        .bind(&input.steps)
        .bind(&input.escalation_rules)
        .bind(version)
        .bind(input.created_by)
        .fetch_one(conn)
        .await
    }
}
