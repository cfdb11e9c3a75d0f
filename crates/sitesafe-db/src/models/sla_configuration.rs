//! SLA configuration model.
//!
//! A rule-matching table keyed by entity type plus optional priority,
//! category and department qualifiers. Selection happens in the domain
//! crate: highest `match_priority` wins, then the most specific rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An SLA matching rule.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SlaConfiguration {
    pub id: Uuid,
    pub name: String,

    /// Entity type this rule applies to.
    pub entity_type: String,

    /// Optional qualifiers; `NULL` matches anything.
    pub priority: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,

    /// Deadline for first response, if the entity type has one.
    pub response_hours: Option<i32>,

    /// Deadline for resolution.
    pub resolution_hours: i32,

    /// Warning threshold as a percentage of the resolution window.
    pub warning_threshold_percent: i32,

    pub business_hours_only: bool,
    pub business_start_hour: i32,
    pub business_end_hour: i32,
    pub exclude_weekends: bool,

    /// Tie-break weight; highest wins.
    pub match_priority: i32,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlaConfiguration {
    /// Active rules for an entity type.
    pub async fn list_active_for_entity_type(
        pool: &sqlx::PgPool,
        entity_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM sla_configurations
            WHERE entity_type = $1 AND is_active
            ORDER BY match_priority DESC, created_at
            ",
        )
        .bind(entity_type)
        .fetch_all(pool)
        .await
    }
}
