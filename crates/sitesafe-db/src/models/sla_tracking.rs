//! SLA tracking model.
//!
//! The live per-entity row holding computed due dates and met/breached
//! state. Independent of workflow instances: an incident's response-time
//! SLA and the approval workflow's SLA are separate consumers of the same
//! clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-entity SLA state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SlaTracking {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,

    /// Configuration the deadlines were computed from.
    pub config_id: Option<Uuid>,

    pub started_at: DateTime<Utc>,
    pub response_due_at: Option<DateTime<Utc>>,
    pub resolution_due_at: DateTime<Utc>,
    pub warning_at: Option<DateTime<Utc>>,

    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,

    /// Whether the response deadline was met; `NULL` until responded.
    pub response_met: Option<bool>,

    /// Whether the resolution deadline was met; `NULL` until resolved.
    pub resolution_met: Option<bool>,

    /// Monotonic: once TRUE it is never reset.
    pub breached: bool,

    pub warning_sent: bool,

    pub is_paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_paused_seconds: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for starting tracking on an entity.
#[derive(Debug, Clone)]
pub struct CreateSlaTracking {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub config_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub response_due_at: Option<DateTime<Utc>>,
    pub resolution_due_at: DateTime<Utc>,
    pub warning_at: Option<DateTime<Utc>>,
}

impl SlaTracking {
    /// Insert a tracking row.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: &CreateSlaTracking,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO sla_tracking (
                entity_type, entity_id, config_id, started_at,
                response_due_at, resolution_due_at, warning_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(&input.entity_type)
        .bind(input.entity_id)
        .bind(input.config_id)
        .bind(input.started_at)
        .bind(input.response_due_at)
        .bind(input.resolution_due_at)
        .bind(input.warning_at)
        .fetch_one(pool)
        .await
    }

    /// Find the tracking row for an entity.
    pub async fn find_by_entity(
        pool: &sqlx::PgPool,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM sla_tracking WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(pool)
        .await
    }

    /// Record first response and whether the response deadline was met.
    pub async fn record_first_response(
        pool: &sqlx::PgPool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE sla_tracking
            SET first_response_at = COALESCE(first_response_at, $2),
                response_met = COALESCE(
                    response_met,
                    CASE
                        WHEN response_due_at IS NULL THEN NULL
                        ELSE $2 <= response_due_at
                    END
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(at)
        .fetch_one(pool)
        .await
    }

    /// Record resolution and whether the resolution deadline was met.
    pub async fn record_resolution(
        pool: &sqlx::PgPool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE sla_tracking
            SET resolved_at = COALESCE(resolved_at, $2),
                resolution_met = COALESCE(resolution_met, $2 <= resolution_due_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(at)
        .fetch_one(pool)
        .await
    }

    /// Mark breached. Monotonic; returns true if this call made the change.
    pub async fn mark_breached(pool: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE sla_tracking
            SET breached = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT breached
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the warning as sent; returns true if this call made the change.
    pub async fn mark_warning_sent(pool: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE sla_tracking
            SET warning_sent = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT warning_sent
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Suspend the SLA clock. No-op if already paused.
    pub async fn pause(
        pool: &sqlx::PgPool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE sla_tracking
            SET is_paused = TRUE,
                paused_at = CASE WHEN is_paused THEN paused_at ELSE $2 END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Resume the SLA clock.
    ///
    /// The caller computes the shifted deadlines with the domain clock
    /// (`sla::shifted_deadline`); this only persists them alongside the
    /// pause bookkeeping.
    pub async fn resume(
        pool: &sqlx::PgPool,
        id: Uuid,
        paused_seconds: i64,
        response_due_at: Option<DateTime<Utc>>,
        resolution_due_at: DateTime<Utc>,
        warning_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE sla_tracking
            SET is_paused = FALSE,
                paused_at = NULL,
                total_paused_seconds = total_paused_seconds + $2,
                response_due_at = $3,
                resolution_due_at = $4,
                warning_at = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(paused_seconds)
        .bind(response_due_at)
        .bind(resolution_due_at)
        .bind(warning_at)
        .fetch_one(pool)
        .await
    }

    /// Unresolved rows past their warning threshold, warning not yet sent.
    pub async fn find_warning_candidates(
        pool: &sqlx::PgPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM sla_tracking
            WHERE resolved_at IS NULL
              AND NOT breached
              AND NOT warning_sent
              AND NOT is_paused
              AND warning_at IS NOT NULL
              AND warning_at <= $1
            ORDER BY warning_at
            LIMIT $2
            ",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Unresolved rows past their resolution deadline, not yet marked.
    pub async fn find_breach_candidates(
        pool: &sqlx::PgPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM sla_tracking
            WHERE resolved_at IS NULL
              AND NOT breached
              AND NOT is_paused
              AND resolution_due_at <= $1
            ORDER BY resolution_due_at
            LIMIT $2
            ",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
