//! Approver directory seam.
//!
//! Templates may name approvers by role; the directory resolves a role to
//! concrete user IDs when a step starts. The resolved list is frozen into the
//! step snapshot, so later role membership changes never affect a running
//! step.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

/// Errors from role resolution.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("role lookup failed: {0}")]
    Lookup(String),
}

/// Resolves role references to user IDs.
#[async_trait]
pub trait ApproverDirectory: Send + Sync {
    /// Users currently holding `role`. An unknown role resolves to an empty
    /// list, not an error.
    async fn members_of(&self, role: &str) -> Result<Vec<Uuid>, DirectoryError>;
}

/// In-memory directory backed by a fixed role table.
#[derive(Debug, Clone, Default)]
pub struct StaticApproverDirectory {
    roles: HashMap<String, Vec<Uuid>>,
}

impl StaticApproverDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>, members: Vec<Uuid>) -> Self {
        self.roles.insert(role.into(), members);
        self
    }
}

#[async_trait]
impl ApproverDirectory for StaticApproverDirectory {
    async fn members_of(&self, role: &str) -> Result<Vec<Uuid>, DirectoryError> {
        Ok(self.roles.get(role).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_directory_resolves_members() {
        let manager = Uuid::new_v4();
        let directory = StaticApproverDirectory::new().with_role("hse_manager", vec![manager]);
        assert_eq!(
            directory.members_of("hse_manager").await.unwrap(),
            vec![manager]
        );
        assert!(directory.members_of("unknown").await.unwrap().is_empty());
    }
}
