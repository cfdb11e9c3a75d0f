//! Workflow engine services.
//!
//! Each service owns a `PgPool` and composes the domain crate's pure logic
//! with the persistence models. The [`directory`] and [`notification`]
//! modules are the seams to collaborator systems.

pub mod delegation_service;
pub mod directory;
pub mod escalation_service;
pub mod notification;
pub mod sla_tracking_service;
pub mod template_service;
pub mod workflow_service;

pub use delegation_service::DelegationService;
pub use directory::{ApproverDirectory, DirectoryError, StaticApproverDirectory};
pub use escalation_service::{EscalationOutcome, EscalationService};
pub use notification::{Notification, NotificationError, NotificationSink, TracingNotificationSink};
pub use sla_tracking_service::SlaTrackingService;
pub use template_service::TemplateService;
pub use workflow_service::{
    InstanceDetail, ResponseOutcome, StartOutcome, StartWorkflow, WorkflowService,
};
