//! Workflow instance model.
//!
//! One running execution of a template against a specific entity. Instance
//! rows are the primary contended resource: every mutating operation loads
//! the row `FOR UPDATE` inside a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_instance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Construction-only: template matched, steps not yet dispatched.
    Pending,
    /// Actively advancing between steps.
    InProgress,
    /// Current approval step has outstanding requests.
    AwaitingApproval,
    /// All steps finished with an approved outcome.
    Completed,
    /// An approval step resolved as rejected.
    Rejected,
    /// Cancelled by an external caller.
    Cancelled,
}

impl InstanceStatus {
    /// Check whether the instance has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Check whether the instance is live (visible to the sweeper).
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::AwaitingApproval)
    }
}

/// Instance priority, mutable by escalation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl WorkflowPriority {
    /// Parse from the lowercase wire form used in templates and contexts.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A running workflow execution.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,

    /// Template version row this instance was started from.
    pub template_id: Uuid,

    /// Captured template version; immutable for the life of the instance.
    pub template_version: i32,

    /// Originating entity reference. Loose linkage: the engine never assumes
    /// the referenced record still exists.
    pub entity_type: String,
    pub entity_id: Uuid,

    pub status: InstanceStatus,

    /// 0-based index into the template's step list.
    pub current_step: i32,

    pub priority: WorkflowPriority,

    pub initiated_by: Option<Uuid>,

    /// Workflow-level SLA deadline.
    pub sla_due_at: Option<DateTime<Utc>>,

    /// Workflow-level SLA warning threshold.
    pub sla_warning_at: Option<DateTime<Utc>>,

    /// Monotonic: once TRUE it is never reset.
    pub sla_breached: bool,

    /// Whether SLA time is currently suspended.
    pub is_paused: bool,

    /// When the current pause began.
    pub paused_at: Option<DateTime<Utc>>,

    /// Accumulated paused time across all pause/resume cycles.
    pub total_paused_seconds: i64,

    /// Opaque context payload read by step and trigger conditions.
    pub context: serde_json::Value,

    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an instance.
#[derive(Debug, Clone)]
pub struct CreateWorkflowInstance {
    pub template_id: Uuid,
    pub template_version: i32,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub priority: WorkflowPriority,
    pub initiated_by: Option<Uuid>,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub sla_warning_at: Option<DateTime<Utc>>,
    pub context: serde_json::Value,
}

impl WorkflowInstance {
    /// Create a new instance in the `pending` state.
    pub async fn create(
        conn: &mut sqlx::PgConnection,
        input: &CreateWorkflowInstance,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO workflow_instances (
                template_id, template_version, entity_type, entity_id,
                priority, initiated_by, sla_due_at, sla_warning_at, context
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            ",
        )
        .bind(input.template_id)
        .bind(input.template_version)
        .bind(&input.entity_type)
        .bind(input.entity_id)
        .bind(input.priority)
        .bind(input.initiated_by)
        .bind(input.sla_due_at)
        .bind(input.sla_warning_at)
        .bind(&input.context)
        .fetch_one(conn)
        .await
    }

    /// Find an instance by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM workflow_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an instance by ID with row-level locking.
    ///
    /// Must run inside a transaction; the lock is held until commit so
    /// concurrent `record_response` / `cancel` calls serialize here.
    pub async fn find_by_id_for_update(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM workflow_instances WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Update instance status, stamping `completed_at` on terminal states.
    pub async fn update_status(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        status: InstanceStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_instances
            SET status = $2,
                completed_at = CASE
                    WHEN $2 IN ('completed', 'rejected', 'cancelled') THEN NOW()
                    ELSE completed_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(status)
        .fetch_one(conn)
        .await
    }

    /// Advance the step pointer and set the accompanying status.
    pub async fn advance_to_step(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        step_number: i32,
        status: InstanceStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_instances
            SET current_step = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(step_number)
        .bind(status)
        .fetch_one(conn)
        .await
    }

    /// Merge top-level fields into the instance context.
    pub async fn merge_context(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        patch: &serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_instances
            SET context = context || $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(patch)
        .fetch_one(conn)
        .await
    }

    /// Change priority. Returns the updated row.
    pub async fn set_priority(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        priority: WorkflowPriority,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_instances
            SET priority = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(priority)
        .fetch_one(conn)
        .await
    }

    /// Mark the workflow SLA as breached. Monotonic: a no-op once set.
    ///
    /// Returns true if this call performed the transition.
    pub async fn mark_sla_breached(pool: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE workflow_instances
            SET sla_breached = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT sla_breached
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Suspend SLA accrual. No-op if already paused.
    pub async fn pause_sla(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_instances
            SET is_paused = TRUE,
                paused_at = CASE WHEN is_paused THEN paused_at ELSE $2 END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_one(conn)
        .await
    }

    /// Resume SLA accrual.
    ///
    /// The caller computes the shifted deadlines with the domain clock
    /// (`sla::shifted_deadline`); this only persists them alongside the
    /// pause bookkeeping.
    pub async fn resume_sla(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        paused_seconds: i64,
        sla_due_at: Option<DateTime<Utc>>,
        sla_warning_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_instances
            SET is_paused = FALSE,
                paused_at = NULL,
                total_paused_seconds = total_paused_seconds + $2,
                sla_due_at = $3,
                sla_warning_at = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(paused_seconds)
        .bind(sla_due_at)
        .bind(sla_warning_at)
        .fetch_one(conn)
        .await
    }

    /// List live instances in id order, for sweeper batching.
    pub async fn list_active(
        pool: &sqlx::PgPool,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM workflow_instances
            WHERE status IN ('in_progress', 'awaiting_approval')
              AND ($1::uuid IS NULL OR id > $1)
            ORDER BY id
            LIMIT $2
            ",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Live instances whose SLA deadline has passed but are not yet marked
    /// breached.
    pub async fn find_sla_breach_candidates(
        pool: &sqlx::PgPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM workflow_instances
            WHERE status IN ('in_progress', 'awaiting_approval')
              AND NOT sla_breached
              AND NOT is_paused
              AND sla_due_at IS NOT NULL
              AND sla_due_at <= $1
            ORDER BY sla_due_at
            LIMIT $2
            ",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(InstanceStatus::Completed.is_terminal());
        assert!(InstanceStatus::Rejected.is_terminal());
        assert!(InstanceStatus::Cancelled.is_terminal());
        assert!(!InstanceStatus::AwaitingApproval.is_terminal());
        assert!(!InstanceStatus::Pending.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(InstanceStatus::InProgress.is_active());
        assert!(InstanceStatus::AwaitingApproval.is_active());
        assert!(!InstanceStatus::Pending.is_active());
        assert!(!InstanceStatus::Completed.is_active());
    }

    #[test]
    fn priority_parse() {
        assert_eq!(WorkflowPriority::parse("high"), Some(WorkflowPriority::High));
        assert_eq!(WorkflowPriority::parse("URGENT"), None);
    }
}
