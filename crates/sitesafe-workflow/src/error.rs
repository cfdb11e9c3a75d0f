//! Error types for the workflow engine.

use thiserror::Error;
use uuid::Uuid;

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors surfaced by the workflow engine.
///
/// State-machine violations (`Conflict`, the not-found variants) are always
/// surfaced to the caller; the engine never silently drops a caller-initiated
/// mutation. `Validation` fires at template publish time, never at run time
/// for an already-published template.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Unknown or inactive template code. Fatal to `start`.
    #[error("workflow template not found or inactive: {0}")]
    TemplateNotFound(String),

    /// No such workflow instance.
    #[error("workflow instance not found: {0}")]
    InstanceNotFound(Uuid),

    /// No open approval request for the given (request, effective approver).
    #[error("approval request not found: {0}")]
    ApprovalRequestNotFound(String),

    /// Duplicate response, or an operation against a terminal instance.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed template structure, caught at publish time.
    #[error("validation error: {0}")]
    Validation(String),

    /// Role lookup against the approver directory failed.
    #[error("approver directory error: {0}")]
    Directory(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkflowError {
    /// Whether this error represents a caller mistake rather than an engine
    /// or infrastructure fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Directory(_))
    }
}
