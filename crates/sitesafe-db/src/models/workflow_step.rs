//! Workflow step model.
//!
//! One row per step instance (not per definition). `required_approvers` is
//! the snapshot resolved when the step starts; later delegation changes
//! affect routing only, never membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Step kind from the template definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_step_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Approval,
    Notification,
    Action,
}

/// How approvers on an approval step are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// One open request at a time, in definition order.
    Sequential,
    /// All approvers receive simultaneous requests.
    Parallel,
}

/// Step lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_step_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    /// Show condition evaluated false at instance start.
    Skipped,
}

/// Final outcome of a completed approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workflow_step_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Approved,
    Rejected,
}

/// One stage of an instance's execution.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub instance_id: Uuid,

    /// 0-based position in the template's step list.
    pub step_number: i32,

    pub name: String,
    pub step_type: StepType,

    /// Set for approval steps only.
    pub approval_mode: Option<ApprovalMode>,

    /// Parallel steps: whether every approver must approve.
    pub require_all: bool,

    /// Approver membership frozen at step start.
    pub required_approvers: Vec<Uuid>,

    /// Who actually acted, in response order.
    pub actual_approvers: Vec<Uuid>,

    pub status: StepStatus,
    pub outcome: Option<StepOutcome>,

    pub due_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a step row at instance start.
#[derive(Debug, Clone)]
pub struct CreateWorkflowStep {
    pub instance_id: Uuid,
    pub step_number: i32,
    pub name: String,
    pub step_type: StepType,
    pub approval_mode: Option<ApprovalMode>,
    pub require_all: bool,
    pub status: StepStatus,
}

impl WorkflowStep {
    /// Insert a step row.
    pub async fn create(
        conn: &mut sqlx::PgConnection,
        input: &CreateWorkflowStep,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO workflow_steps (
                instance_id, step_number, name, step_type,
                approval_mode, require_all, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(input.instance_id)
        .bind(input.step_number)
        .bind(&input.name)
        .bind(input.step_type)
        .bind(input.approval_mode)
        .bind(input.require_all)
        .bind(input.status)
        .fetch_one(conn)
        .await
    }

    /// All steps of an instance in execution order.
    pub async fn find_by_instance<'e, E>(executor: E, instance_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM workflow_steps
            WHERE instance_id = $1
            ORDER BY step_number
            ",
        )
        .bind(instance_id)
        .fetch_all(executor)
        .await
    }

    /// Find a specific step of an instance.
    pub async fn find_by_instance_and_number(
        conn: &mut sqlx::PgConnection,
        instance_id: Uuid,
        step_number: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM workflow_steps WHERE instance_id = $1 AND step_number = $2",
        )
        .bind(instance_id)
        .bind(step_number)
        .fetch_optional(conn)
        .await
    }

    /// Mark a step started, freezing the resolved approver snapshot.
    pub async fn start(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        required_approvers: &[Uuid],
        due_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_steps
            SET status = 'in_progress',
                required_approvers = $2,
                due_at = $3,
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(required_approvers)
        .bind(due_at)
        .fetch_one(conn)
        .await
    }

    /// Record that an approver acted on this step.
    pub async fn append_actual_approver(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        approver_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_steps
            SET actual_approvers = array_append(actual_approvers, $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(approver_id)
        .fetch_one(conn)
        .await
    }

    /// Complete a step with an outcome (`NULL` for non-approval steps).
    pub async fn complete(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        outcome: Option<StepOutcome>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE workflow_steps
            SET status = 'completed',
                outcome = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(outcome)
        .fetch_one(conn)
        .await
    }
}
