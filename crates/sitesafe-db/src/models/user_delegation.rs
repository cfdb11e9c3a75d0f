//! User delegation model.
//!
//! A time-boxed redirection of approval authority, created by a user going
//! out of office. "Active" is derived from the date window at lookup time;
//! `is_active` is an administrative kill-switch on top of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A delegation window.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserDelegation {
    pub id: Uuid,

    /// The delegating user (owner of this row).
    pub user_id: Uuid,

    /// Who receives the authority.
    pub delegate_id: Uuid,

    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,

    /// Covers every workflow type when true.
    pub delegate_all: bool,

    /// Template codes covered when `delegate_all` is false.
    pub workflow_types: Option<Vec<String>>,

    pub reason: Option<String>,

    /// Administrative kill-switch; the date window still applies.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a delegation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserDelegation {
    pub user_id: Uuid,
    pub delegate_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub delegate_all: bool,
    pub workflow_types: Option<Vec<String>>,
    pub reason: Option<String>,
}

impl UserDelegation {
    /// Insert a delegation row.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: &CreateUserDelegation,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO user_delegations (
                user_id, delegate_id, start_date, end_date,
                delegate_all, workflow_types, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(input.user_id)
        .bind(input.delegate_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.delegate_all)
        .bind(&input.workflow_types)
        .bind(&input.reason)
        .fetch_one(pool)
        .await
    }

    /// Delegations whose window contains `at` for a user, newest-created
    /// first (the tie-break order for overlapping windows).
    pub async fn find_active_for_user(
        pool: &sqlx::PgPool,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM user_delegations
            WHERE user_id = $1
              AND is_active
              AND start_date <= $2
              AND end_date >= $2
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .bind(at)
        .fetch_all(pool)
        .await
    }

    /// Deactivate a delegation (kill-switch, keeps the row for audit).
    pub async fn deactivate(pool: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE user_delegations
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND is_active
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
