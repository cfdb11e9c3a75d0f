//! Escalation log model.
//!
//! Append-only audit of escalation firings. The unique constraint on
//! `(instance_id, rule_id, step_number)` is the idempotency guard for the
//! sweeper: recording uses `ON CONFLICT DO NOTHING`, so concurrent sweep
//! processes cannot double-fire a rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::workflow_instance::WorkflowPriority;

/// What condition fired the escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "escalation_trigger", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EscalationTrigger {
    StepOverdue,
    NoResponse,
    SlaWarning,
    SlaBreach,
}

/// One escalation firing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EscalationLog {
    pub id: Uuid,
    pub instance_id: Uuid,

    /// Identifier of the rule within the template's escalation rule list.
    pub rule_id: String,

    /// Step that was current when the rule fired.
    pub step_number: i32,

    pub trigger: EscalationTrigger,

    /// Approver the work was escalated away from, when known.
    pub from_user_id: Option<Uuid>,

    /// Escalation target, by user or role.
    pub to_user_id: Option<Uuid>,
    pub to_role: Option<String>,

    /// Priority transition applied by a `change_priority` action.
    pub priority_before: Option<WorkflowPriority>,
    pub priority_after: Option<WorkflowPriority>,

    pub reason: Option<String>,
    pub escalated_at: DateTime<Utc>,
}

/// Input for recording a firing.
#[derive(Debug, Clone)]
pub struct CreateEscalationLog {
    pub instance_id: Uuid,
    pub rule_id: String,
    pub step_number: i32,
    pub trigger: EscalationTrigger,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Option<Uuid>,
    pub to_role: Option<String>,
    pub priority_before: Option<WorkflowPriority>,
    pub priority_after: Option<WorkflowPriority>,
    pub reason: Option<String>,
}

impl EscalationLog {
    /// Record a firing. Returns true if this call inserted the row, false if
    /// the (instance, rule, step) combination had already fired.
    pub async fn record(
        pool: &sqlx::PgPool,
        input: &CreateEscalationLog,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO escalation_logs (
                instance_id, rule_id, step_number, "trigger",
                from_user_id, to_user_id, to_role,
                priority_before, priority_after, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (instance_id, rule_id, step_number) DO NOTHING
            "#,
        )
        .bind(input.instance_id)
        .bind(&input.rule_id)
        .bind(input.step_number)
        .bind(input.trigger)
        .bind(input.from_user_id)
        .bind(input.to_user_id)
        .bind(&input.to_role)
        .bind(input.priority_before)
        .bind(input.priority_after)
        .bind(&input.reason)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Escalation history of an instance, oldest first.
    pub async fn find_by_instance(
        pool: &sqlx::PgPool,
        instance_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM escalation_logs
            WHERE instance_id = $1
            ORDER BY escalated_at, id
            ",
        )
        .bind(instance_id)
        .fetch_all(pool)
        .await
    }
}
