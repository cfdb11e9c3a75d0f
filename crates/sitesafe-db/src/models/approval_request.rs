//! Approval request model.
//!
//! One row per (step, approver) pair. `approver_id` keeps the original name
//! for audit; `delegated_to` records who can actually act, filled by the
//! delegation registry at dispatch time and updated by reassignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::workflow_instance::WorkflowPriority;

/// Request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRequestStatus {
    Pending,
    Responded,
    /// Closed without a response because the step resolved or the instance
    /// terminated.
    Expired,
}

/// An approver's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_decision", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

/// A pending or answered approval request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub step_id: Uuid,
    pub instance_id: Uuid,

    /// The approver named by the step snapshot. Never mutated.
    pub approver_id: Uuid,

    /// Effective actor when a delegation window or reassignment applies.
    pub delegated_to: Option<Uuid>,

    pub status: ApprovalRequestStatus,
    pub response: Option<ApprovalDecision>,
    pub notes: Option<String>,

    /// Reminder notifications sent for this request.
    pub reminder_count: i32,

    pub due_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Check whether a user may act on this request.
    ///
    /// Both the original approver and the recorded delegate count.
    #[must_use]
    pub fn actionable_by(&self, user_id: Uuid) -> bool {
        self.approver_id == user_id || self.delegated_to == Some(user_id)
    }
}

/// Input for dispatching a request.
#[derive(Debug, Clone)]
pub struct CreateApprovalRequest {
    pub step_id: Uuid,
    pub instance_id: Uuid,
    pub approver_id: Uuid,
    pub delegated_to: Option<Uuid>,
    pub due_at: Option<DateTime<Utc>>,
}

/// Worklist row for a user's pending approvals, joined with step and
/// instance context.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PendingApprovalRow {
    pub request_id: Uuid,
    pub instance_id: Uuid,
    pub step_id: Uuid,
    pub step_number: i32,
    pub step_name: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub priority: WorkflowPriority,
    pub approver_id: Uuid,
    pub delegated_to: Option<Uuid>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Insert a request row.
    pub async fn create(
        conn: &mut sqlx::PgConnection,
        input: &CreateApprovalRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO approval_requests (
                step_id, instance_id, approver_id, delegated_to, due_at
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(input.step_id)
        .bind(input.instance_id)
        .bind(input.approver_id)
        .bind(input.delegated_to)
        .bind(input.due_at)
        .fetch_one(conn)
        .await
    }

    /// Find a request by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM approval_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All requests for a step, dispatch order.
    pub async fn find_by_step<'e, E>(executor: E, step_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM approval_requests
            WHERE step_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(step_id)
        .fetch_all(executor)
        .await
    }

    /// All requests of an instance, dispatch order.
    pub async fn find_by_instance(
        pool: &sqlx::PgPool,
        instance_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM approval_requests
            WHERE instance_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(instance_id)
        .fetch_all(pool)
        .await
    }

    /// Record a response, guarded against duplicate submissions.
    ///
    /// Returns `None` if the request was not pending anymore; the caller
    /// surfaces that as a conflict, never a silent overwrite.
    pub async fn record_response(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        response: ApprovalDecision,
        notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE approval_requests
            SET status = 'responded',
                response = $2,
                notes = $3,
                responded_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(response)
        .bind(notes)
        .fetch_optional(conn)
        .await
    }

    /// Expire all still-open requests of a step (step resolved or instance
    /// terminated). Returns the number of requests closed.
    pub async fn expire_open_for_step(
        conn: &mut sqlx::PgConnection,
        step_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE approval_requests
            SET status = 'expired', updated_at = NOW()
            WHERE step_id = $1 AND status = 'pending'
            ",
        )
        .bind(step_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Expire all open requests of an instance (cancellation path).
    pub async fn expire_open_for_instance(
        conn: &mut sqlx::PgConnection,
        instance_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE approval_requests
            SET status = 'expired', updated_at = NOW()
            WHERE instance_id = $1 AND status = 'pending'
            ",
        )
        .bind(instance_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reroute open requests of a step to a new effective actor.
    ///
    /// Escalation reassignment: `approver_id` keeps the original name for
    /// audit, only `delegated_to` changes.
    pub async fn reassign_open_for_step(
        pool: &sqlx::PgPool,
        step_id: Uuid,
        delegate_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE approval_requests
            SET delegated_to = $2, updated_at = NOW()
            WHERE step_id = $1 AND status = 'pending'
            ",
        )
        .bind(step_id)
        .bind(delegate_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Bump the reminder counter on open requests of a step.
    pub async fn bump_reminders_for_step(
        pool: &sqlx::PgPool,
        step_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE approval_requests
            SET reminder_count = reminder_count + 1, updated_at = NOW()
            WHERE step_id = $1 AND status = 'pending'
            ",
        )
        .bind(step_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Oldest open dispatch time for a step, if any request is still open.
    ///
    /// Used by the `no_response` escalation trigger.
    pub async fn oldest_open_dispatch_for_step(
        pool: &sqlx::PgPool,
        step_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r"
            SELECT MIN(created_at) FROM approval_requests
            WHERE step_id = $1 AND status = 'pending'
            HAVING MIN(created_at) IS NOT NULL
            ",
        )
        .bind(step_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(t,)| t))
    }

    /// Pending worklist for a user, newest first.
    ///
    /// Matches requests where the user is the named approver or the current
    /// effective actor, restricted to live instances.
    pub async fn list_pending_for_user(
        pool: &sqlx::PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PendingApprovalRow>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT r.id AS request_id,
                   r.instance_id,
                   r.step_id,
                   s.step_number,
                   s.name AS step_name,
                   i.entity_type,
                   i.entity_id,
                   i.priority,
                   r.approver_id,
                   r.delegated_to,
                   r.due_at,
                   r.created_at
            FROM approval_requests r
            JOIN workflow_steps s ON s.id = r.step_id
            JOIN workflow_instances i ON i.id = r.instance_id
            WHERE r.status = 'pending'
              AND (r.approver_id = $1 OR r.delegated_to = $1)
              AND i.status IN ('in_progress', 'awaiting_approval')
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(approver: Uuid, delegate: Option<Uuid>) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: Uuid::new_v4(),
            step_id: Uuid::new_v4(),
            instance_id: Uuid::new_v4(),
            approver_id: approver,
            delegated_to: delegate,
            status: ApprovalRequestStatus::Pending,
            response: None,
            notes: None,
            reminder_count: 0,
            due_at: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn original_approver_can_act() {
        let approver = Uuid::new_v4();
        assert!(request(approver, None).actionable_by(approver));
    }

    #[test]
    fn delegate_and_original_both_act() {
        let approver = Uuid::new_v4();
        let delegate = Uuid::new_v4();
        let req = request(approver, Some(delegate));
        assert!(req.actionable_by(approver));
        assert!(req.actionable_by(delegate));
        assert!(!req.actionable_by(Uuid::new_v4()));
    }
}
