//! Database models for the workflow engine.

pub mod approval_request;
pub mod escalation_log;
pub mod sla_configuration;
pub mod sla_tracking;
pub mod user_delegation;
pub mod workflow_instance;
pub mod workflow_step;
pub mod workflow_template;

pub use approval_request::{
    ApprovalDecision, ApprovalRequest, ApprovalRequestStatus, CreateApprovalRequest,
    PendingApprovalRow,
};
pub use escalation_log::{CreateEscalationLog, EscalationLog, EscalationTrigger};
pub use sla_configuration::SlaConfiguration;
pub use sla_tracking::{CreateSlaTracking, SlaTracking};
pub use user_delegation::{CreateUserDelegation, UserDelegation};
pub use workflow_instance::{
    CreateWorkflowInstance, InstanceStatus, WorkflowInstance, WorkflowPriority,
};
pub use workflow_step::{
    ApprovalMode, CreateWorkflowStep, StepOutcome, StepStatus, StepType, WorkflowStep,
};
pub use workflow_template::{CreateWorkflowTemplate, TemplateFilter, WorkflowTemplate};
