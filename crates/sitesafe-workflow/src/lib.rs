//! Workflow engine domain logic.
//!
//! Pure building blocks for templated, multi-step approval processes:
//!
//! - [`template`] - typed step and escalation-rule definitions with
//!   publish-time validation
//! - [`conditions`] - the trigger/show condition predicate DSL
//! - [`sla`] - the SLA clock (business-hours-aware due-date arithmetic)
//! - [`chain`] - sequential / parallel approval chain resolution
//! - [`delegation`] - effective-approver resolution over delegation windows
//! - [`sla_match`] - SLA configuration rule selection
//!
//! Nothing here touches the database; the service layer in
//! `sitesafe-api-workflow` wires these against persisted state.

pub mod chain;
pub mod conditions;
pub mod delegation;
pub mod error;
pub mod sla;
pub mod sla_match;
pub mod template;
pub mod types;

pub use chain::{evaluate, ChainEvaluation, ChainOutcome, Decision};
pub use conditions::{Condition, ConditionOp, ConditionSet};
pub use delegation::{resolve_effective_approver, DelegationWindow};
pub use error::{Result, WorkflowError};
pub use sla::{
    compute_due_at, compute_warning_at, is_business_time, paused_duration, shifted_deadline,
    BusinessCalendar,
};
pub use sla_match::{select_rule, SlaMatchContext, SlaRule};
pub use template::{
    parse_escalation_rules, parse_steps, validate_template, ActionStepDef, ApprovalMode,
    ApprovalStepDef, ApproverRef, EscalationActionDef, EscalationRuleDef, EscalationTriggerKind,
    NotificationStepDef, StepAction, StepDefinition, TriggerUnit, MAX_TEMPLATE_STEPS,
};
pub use types::EntityRef;
