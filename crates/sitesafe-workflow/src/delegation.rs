//! Effective-approver resolution over delegation windows.
//!
//! Delegation changes who can act on a request, never who the step formally
//! requires. Resolution is single-hop: a delegate's own delegations are not
//! followed.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A delegation window for one delegator, already loaded from storage.
#[derive(Debug, Clone)]
pub struct DelegationWindow {
    pub delegate_id: Uuid,
    pub starts_at: DateTime<Utc>,
    /// Inclusive end of the window.
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    /// When true the window covers every workflow type.
    pub delegate_all: bool,
    /// Template codes covered when `delegate_all` is false.
    pub workflow_types: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DelegationWindow {
    /// Whether this window covers `workflow_type` at instant `at`.
    #[must_use]
    pub fn covers(&self, at: DateTime<Utc>, workflow_type: &str) -> bool {
        if !self.is_active {
            return false;
        }
        if at < self.starts_at || at > self.ends_at {
            return false;
        }
        self.delegate_all || self.workflow_types.iter().any(|t| t == workflow_type)
    }
}

/// Resolve who may act in place of `user_id` for `workflow_type` at `at`.
///
/// Among the covering windows the most recently created wins. With no
/// covering window the user acts for themselves. Never fails: a malformed or
/// expired delegation simply does not apply.
#[must_use]
pub fn resolve_effective_approver(
    user_id: Uuid,
    at: DateTime<Utc>,
    workflow_type: &str,
    windows: &[DelegationWindow],
) -> Uuid {
    windows
        .iter()
        .filter(|w| w.covers(at, workflow_type))
        .max_by_key(|w| w.created_at)
        .map_or(user_id, |w| w.delegate_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn window(delegate: Uuid, created_offset_hours: i64) -> DelegationWindow {
        DelegationWindow {
            delegate_id: delegate,
            starts_at: at() - Duration::days(1),
            ends_at: at() + Duration::days(7),
            is_active: true,
            delegate_all: true,
            workflow_types: vec![],
            created_at: at() - Duration::days(2) + Duration::hours(created_offset_hours),
        }
    }

    #[test]
    fn no_windows_resolves_to_self() {
        let user = Uuid::new_v4();
        assert_eq!(resolve_effective_approver(user, at(), "incident", &[]), user);
    }

    #[test]
    fn covering_window_redirects() {
        let user = Uuid::new_v4();
        let delegate = Uuid::new_v4();
        let windows = vec![window(delegate, 0)];
        assert_eq!(
            resolve_effective_approver(user, at(), "incident", &windows),
            delegate
        );
    }

    #[test]
    fn latest_created_window_wins() {
        let user = Uuid::new_v4();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        let windows = vec![window(older, 0), window(newer, 5)];
        assert_eq!(
            resolve_effective_approver(user, at(), "incident", &windows),
            newer
        );
    }

    #[test]
    fn scoped_window_checks_workflow_type() {
        let user = Uuid::new_v4();
        let delegate = Uuid::new_v4();
        let mut w = window(delegate, 0);
        w.delegate_all = false;
        w.workflow_types = vec!["permit_to_work".to_string()];
        let windows = vec![w];

        assert_eq!(
            resolve_effective_approver(user, at(), "permit_to_work", &windows),
            delegate
        );
        assert_eq!(
            resolve_effective_approver(user, at(), "incident", &windows),
            user
        );
    }

    #[test]
    fn expired_or_inactive_windows_are_inert() {
        let user = Uuid::new_v4();
        let delegate = Uuid::new_v4();

        let mut expired = window(delegate, 0);
        expired.ends_at = at() - Duration::hours(1);
        assert_eq!(
            resolve_effective_approver(user, at(), "incident", &[expired]),
            user
        );

        let mut disabled = window(delegate, 0);
        disabled.is_active = false;
        assert_eq!(
            resolve_effective_approver(user, at(), "incident", &[disabled]),
            user
        );
    }

    #[test]
    fn end_boundary_is_inclusive() {
        let user = Uuid::new_v4();
        let delegate = Uuid::new_v4();
        let mut w = window(delegate, 0);
        w.ends_at = at();
        assert_eq!(
            resolve_effective_approver(user, at(), "incident", &[w]),
            delegate
        );
    }
}
