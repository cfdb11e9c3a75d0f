//! Delegation registry.
//!
//! Creates and revokes out-of-office delegation windows and answers the
//! routing question: who is the effective actor for an approver right now.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use sitesafe_db::models::{CreateUserDelegation, UserDelegation};
use sitesafe_workflow::delegation::{resolve_effective_approver, DelegationWindow};
use sitesafe_workflow::error::{Result, WorkflowError};

/// Service for delegation operations.
pub struct DelegationService {
    pool: PgPool,
}

impl DelegationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a delegation window.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, delegate_id = %input.delegate_id))]
    pub async fn create(&self, input: CreateUserDelegation) -> Result<UserDelegation> {
        if input.delegate_id == input.user_id {
            return Err(WorkflowError::Validation(
                "cannot delegate to oneself".to_string(),
            ));
        }
        if input.end_date <= input.start_date {
            return Err(WorkflowError::Validation(
                "delegation end date must be after start date".to_string(),
            ));
        }
        if !input.delegate_all
            && input
                .workflow_types
                .as_ref()
                .map_or(true, |types| types.is_empty())
        {
            return Err(WorkflowError::Validation(
                "scoped delegation must name at least one workflow type".to_string(),
            ));
        }

        let delegation = UserDelegation::create(&self.pool, &input).await?;
        info!(delegation_id = %delegation.id, "Created delegation");
        Ok(delegation)
    }

    /// Deactivate a delegation. The row stays for audit.
    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        if !UserDelegation::deactivate(&self.pool, id).await? {
            return Err(WorkflowError::Conflict(format!(
                "delegation {id} not found or already inactive"
            )));
        }
        info!(delegation_id = %id, "Deactivated delegation");
        Ok(())
    }

    /// Delegations of a user whose window contains `at`.
    pub async fn active_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<UserDelegation>> {
        Ok(UserDelegation::find_active_for_user(&self.pool, user_id, at).await?)
    }

    /// Who acts in `approver`'s place for `workflow_type` at `at`.
    ///
    /// Returns `None` when the approver acts for themselves. Single hop: the
    /// delegate's own delegations are not followed.
    pub async fn effective_delegate(
        &self,
        approver: Uuid,
        workflow_type: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        let rows = UserDelegation::find_active_for_user(&self.pool, approver, at).await?;
        let windows: Vec<DelegationWindow> = rows.into_iter().map(to_window).collect();
        let effective = resolve_effective_approver(approver, at, workflow_type, &windows);
        Ok((effective != approver).then_some(effective))
    }
}

fn to_window(row: UserDelegation) -> DelegationWindow {
    DelegationWindow {
        delegate_id: row.delegate_id,
        starts_at: row.start_date,
        ends_at: row.end_date,
        is_active: row.is_active,
        delegate_all: row.delegate_all,
        workflow_types: row.workflow_types.unwrap_or_default(),
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn window_mapping_preserves_scope() {
        let now = Utc::now();
        let row = UserDelegation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            delegate_id: Uuid::new_v4(),
            start_date: now,
            end_date: now + Duration::days(5),
            delegate_all: false,
            workflow_types: Some(vec!["incident_approval".to_string()]),
            reason: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let window = to_window(row.clone());
        assert_eq!(window.delegate_id, row.delegate_id);
        assert!(!window.delegate_all);
        assert_eq!(window.workflow_types, vec!["incident_approval"]);
    }
}
