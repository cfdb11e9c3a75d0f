//! Notification intents.
//!
//! The engine emits intents; delivery belongs to a collaborator service
//! behind [`NotificationSink`]. Sink failures are logged by the caller and
//! never fail the state transition that produced them.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// A notification the engine wants delivered.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// An approval request was dispatched.
    ApprovalRequested {
        request_id: Uuid,
        instance_id: Uuid,
        step_name: String,
        approver_id: Uuid,
        /// Delegate who will act in the approver's place, when one applies.
        delegated_to: Option<Uuid>,
    },
    /// Reminder for an outstanding approval request.
    ApprovalReminder {
        instance_id: Uuid,
        step_name: String,
        approver_id: Uuid,
    },
    /// A notification step fired.
    StepMessage {
        instance_id: Uuid,
        step_name: String,
        recipients: Vec<Uuid>,
        message: String,
    },
    /// An escalation rule fired.
    Escalated {
        instance_id: Uuid,
        rule_id: String,
        step_number: i32,
        to_user_id: Option<Uuid>,
        to_role: Option<String>,
    },
    /// A workflow instance reached a terminal state.
    WorkflowFinished {
        instance_id: Uuid,
        entity_type: String,
        entity_id: Uuid,
        status: String,
    },
    /// A workflow instance crossed its SLA deadline.
    WorkflowSlaBreached { instance_id: Uuid },
    /// An entity SLA crossed its warning threshold.
    SlaWarning { entity_type: String, entity_id: Uuid },
    /// An entity SLA crossed its resolution deadline.
    SlaBreached { entity_type: String, entity_id: Uuid },
}

/// Errors from notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivery seam for notification intents.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Sink that records intents to the log. The default for the worker binary;
/// deployments with a real notification service provide their own sink.
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(notification = ?notification, "Notification emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_sink_accepts_everything() {
        let sink = TracingNotificationSink;
        let n = Notification::SlaWarning {
            entity_type: "incident".to_string(),
            entity_id: Uuid::new_v4(),
        };
        assert!(sink.deliver(&n).await.is_ok());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let n = Notification::WorkflowSlaBreached {
            instance_id: Uuid::new_v4(),
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["kind"], "workflow_sla_breached");
    }
}
