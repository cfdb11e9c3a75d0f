//! Typed workflow template definitions.
//!
//! Templates are stored as JSON; this module is the closed tagged union they
//! must parse into. Unknown step or action types are rejected here, at
//! publish time, so instance execution never sees a malformed definition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conditions::ConditionSet;
use crate::error::{Result, WorkflowError};

/// Maximum number of steps allowed in a template.
pub const MAX_TEMPLATE_STEPS: usize = 20;

/// Reference to an approver: a concrete user or a role resolved through the
/// approver directory when the step starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApproverRef {
    User { user_id: Uuid },
    Role { role: String },
}

/// How approvers on an approval step are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Sequential,
    Parallel,
}

fn default_true() -> bool {
    true
}

/// An approval stage: one or more approvers must sign off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStepDef {
    pub name: String,
    pub approval_type: ApprovalMode,
    /// Parallel steps: whether every approver must approve.
    #[serde(default = "default_true")]
    pub require_all: bool,
    pub required_approvers: Vec<ApproverRef>,
    /// Step-level deadline in hours from step start.
    #[serde(default)]
    pub due_hours: Option<i32>,
    #[serde(default)]
    pub show_condition: Option<ConditionSet>,
}

/// A notification stage: emits a send-notification intent and advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationStepDef {
    pub name: String,
    pub recipients: Vec<ApproverRef>,
    pub message: String,
    #[serde(default)]
    pub show_condition: Option<ConditionSet>,
}

/// Side effect performed by an action step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// Change the instance priority.
    SetPriority { priority: String },
    /// Merge a value into the instance context.
    SetContextField {
        field: String,
        value: serde_json::Value,
    },
}

/// An automated stage: applies its action and advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStepDef {
    pub name: String,
    pub action: StepAction,
    #[serde(default)]
    pub show_condition: Option<ConditionSet>,
}

/// Closed union of step types. Serde's internal tag rejects unknown
/// `step_type` values at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum StepDefinition {
    Approval(ApprovalStepDef),
    Notification(NotificationStepDef),
    Action(ActionStepDef),
}

impl StepDefinition {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Approval(s) => &s.name,
            Self::Notification(s) => &s.name,
            Self::Action(s) => &s.name,
        }
    }

    #[must_use]
    pub fn show_condition(&self) -> Option<&ConditionSet> {
        match self {
            Self::Approval(s) => s.show_condition.as_ref(),
            Self::Notification(s) => s.show_condition.as_ref(),
            Self::Action(s) => s.show_condition.as_ref(),
        }
    }
}

/// Unit for an escalation rule's trigger threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerUnit {
    Hours,
    Days,
}

/// What condition an escalation rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTriggerKind {
    /// Current step open longer than the threshold.
    StepOverdue,
    /// Oldest open approval request unanswered longer than the threshold.
    NoResponse,
    /// Instance SLA warning threshold crossed.
    SlaWarning,
    /// Instance SLA deadline crossed.
    SlaBreach,
}

/// Action fired by an escalation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EscalationActionDef {
    /// Notify the escalation target (or the outstanding approvers).
    Notify,
    /// Reroute open requests to the escalation target.
    Reassign,
    /// Re-prioritize the instance.
    ChangePriority { to: String },
}

/// An escalation rule attached to a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRuleDef {
    /// Rule identifier, unique within the template. Part of the escalation
    /// log idempotency key.
    pub id: String,
    pub trigger: EscalationTriggerKind,
    pub trigger_value: i64,
    pub trigger_unit: TriggerUnit,
    /// Convert the threshold with business-hours accounting.
    #[serde(default)]
    pub business_hours: bool,
    #[serde(default)]
    pub escalate_to: Option<ApproverRef>,
    pub actions: Vec<EscalationActionDef>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl EscalationRuleDef {
    /// Threshold in hours.
    #[must_use]
    pub fn trigger_hours(&self) -> i64 {
        match self.trigger_unit {
            TriggerUnit::Hours => self.trigger_value,
            TriggerUnit::Days => self.trigger_value * 24,
        }
    }
}

/// Parse the step list out of a template's stored JSON.
pub fn parse_steps(steps: &serde_json::Value) -> Result<Vec<StepDefinition>> {
    serde_json::from_value(steps.clone())
        .map_err(|e| WorkflowError::Validation(format!("invalid step definitions: {e}")))
}

/// Parse the escalation rule list out of a template's stored JSON.
pub fn parse_escalation_rules(rules: &serde_json::Value) -> Result<Vec<EscalationRuleDef>> {
    serde_json::from_value(rules.clone())
        .map_err(|e| WorkflowError::Validation(format!("invalid escalation rules: {e}")))
}

/// Validate a template definition at publish time.
///
/// Everything rejected here is unrepresentable at run time: instance
/// execution assumes published templates are well-formed.
pub fn validate_template(
    steps: &[StepDefinition],
    rules: &[EscalationRuleDef],
    sla_hours: i32,
    warning_hours: Option<i32>,
    business_start_hour: i32,
    business_end_hour: i32,
) -> Result<()> {
    if steps.is_empty() {
        return Err(WorkflowError::Validation(
            "template must define at least one step".to_string(),
        ));
    }
    if steps.len() > MAX_TEMPLATE_STEPS {
        return Err(WorkflowError::Validation(format!(
            "template defines {} steps, maximum is {MAX_TEMPLATE_STEPS}",
            steps.len()
        )));
    }
    if sla_hours <= 0 {
        return Err(WorkflowError::Validation(
            "sla_hours must be positive".to_string(),
        ));
    }
    if let Some(warning) = warning_hours {
        if warning <= 0 || warning >= sla_hours {
            return Err(WorkflowError::Validation(
                "warning_hours must be positive and less than sla_hours".to_string(),
            ));
        }
    }
    if !(0..24).contains(&business_start_hour)
        || !(1..=24).contains(&business_end_hour)
        || business_start_hour >= business_end_hour
    {
        return Err(WorkflowError::Validation(format!(
            "invalid business hours range {business_start_hour}..{business_end_hour}"
        )));
    }

    for (i, step) in steps.iter().enumerate() {
        if step.name().trim().is_empty() {
            return Err(WorkflowError::Validation(format!(
                "step {i} has an empty name"
            )));
        }
        match step {
            StepDefinition::Approval(def) => {
                if def.required_approvers.is_empty() {
                    return Err(WorkflowError::Validation(format!(
                        "approval step '{}' has no required approvers",
                        def.name
                    )));
                }
                if let Some(hours) = def.due_hours {
                    if hours <= 0 {
                        return Err(WorkflowError::Validation(format!(
                            "approval step '{}' has non-positive due_hours",
                            def.name
                        )));
                    }
                }
            }
            StepDefinition::Notification(def) => {
                if def.recipients.is_empty() {
                    return Err(WorkflowError::Validation(format!(
                        "notification step '{}' has no recipients",
                        def.name
                    )));
                }
            }
            StepDefinition::Action(def) => {
                if let StepAction::SetPriority { priority } = &def.action {
                    validate_priority(priority)?;
                }
            }
        }
    }

    let mut seen_ids = std::collections::HashSet::new();
    for rule in rules {
        if rule.id.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "escalation rule has an empty id".to_string(),
            ));
        }
        if !seen_ids.insert(rule.id.as_str()) {
            return Err(WorkflowError::Validation(format!(
                "duplicate escalation rule id '{}'",
                rule.id
            )));
        }
        if rule.trigger_value <= 0 {
            return Err(WorkflowError::Validation(format!(
                "escalation rule '{}' has non-positive trigger_value",
                rule.id
            )));
        }
        if rule.actions.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "escalation rule '{}' has no actions",
                rule.id
            )));
        }
        for action in &rule.actions {
            match action {
                EscalationActionDef::Reassign => {
                    if rule.escalate_to.is_none() {
                        return Err(WorkflowError::Validation(format!(
                            "escalation rule '{}' reassigns but has no escalate_to target",
                            rule.id
                        )));
                    }
                }
                EscalationActionDef::ChangePriority { to } => validate_priority(to)?,
                EscalationActionDef::Notify => {}
            }
        }
    }

    Ok(())
}

fn validate_priority(value: &str) -> Result<()> {
    match value {
        "low" | "medium" | "high" | "critical" => Ok(()),
        other => Err(WorkflowError::Validation(format!(
            "unknown priority '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approval_step(name: &str, approvers: Vec<ApproverRef>) -> StepDefinition {
        StepDefinition::Approval(ApprovalStepDef {
            name: name.to_string(),
            approval_type: ApprovalMode::Sequential,
            require_all: true,
            required_approvers: approvers,
            due_hours: None,
            show_condition: None,
        })
    }

    fn user_ref() -> ApproverRef {
        ApproverRef::User {
            user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn parses_tagged_step_union() {
        let steps = json!([
            {
                "step_type": "approval",
                "name": "Manager sign-off",
                "approval_type": "sequential",
                "required_approvers": [{"role": "hse_manager"}]
            },
            {
                "step_type": "notification",
                "name": "Notify safety team",
                "recipients": [{"role": "safety_team"}],
                "message": "Incident approved"
            },
            {
                "step_type": "action",
                "name": "Raise priority",
                "action": {"kind": "set_priority", "priority": "high"}
            }
        ]);

        let parsed = parse_steps(&steps).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].name(), "Manager sign-off");
        assert!(matches!(parsed[1], StepDefinition::Notification(_)));
        assert!(matches!(parsed[2], StepDefinition::Action(_)));
    }

    #[test]
    fn rejects_unknown_step_type() {
        let steps = json!([
            {"step_type": "teleport", "name": "Nope"}
        ]);
        assert!(matches!(
            parse_steps(&steps),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn approver_ref_forms() {
        let user: ApproverRef =
            serde_json::from_value(json!({"user_id": Uuid::new_v4()})).unwrap();
        assert!(matches!(user, ApproverRef::User { .. }));

        let role: ApproverRef = serde_json::from_value(json!({"role": "site_manager"})).unwrap();
        assert!(matches!(role, ApproverRef::Role { .. }));
    }

    #[test]
    fn validate_requires_steps() {
        let err = validate_template(&[], &[], 24, None, 9, 17).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn validate_rejects_empty_approvers() {
        let steps = vec![approval_step("Review", vec![])];
        assert!(validate_template(&steps, &[], 24, None, 9, 17).is_err());
    }

    #[test]
    fn validate_rejects_warning_past_sla() {
        let steps = vec![approval_step("Review", vec![user_ref()])];
        assert!(validate_template(&steps, &[], 24, Some(24), 9, 17).is_err());
        assert!(validate_template(&steps, &[], 24, Some(4), 9, 17).is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_rule_ids() {
        let steps = vec![approval_step("Review", vec![user_ref()])];
        let rule = EscalationRuleDef {
            id: "overdue-1".to_string(),
            trigger: EscalationTriggerKind::StepOverdue,
            trigger_value: 4,
            trigger_unit: TriggerUnit::Hours,
            business_hours: false,
            escalate_to: None,
            actions: vec![EscalationActionDef::Notify],
            is_active: true,
        };
        let rules = vec![rule.clone(), rule];
        assert!(validate_template(&steps, &rules, 24, None, 9, 17).is_err());
    }

    #[test]
    fn validate_reassign_needs_target() {
        let steps = vec![approval_step("Review", vec![user_ref()])];
        let rule = EscalationRuleDef {
            id: "reassign-1".to_string(),
            trigger: EscalationTriggerKind::NoResponse,
            trigger_value: 1,
            trigger_unit: TriggerUnit::Days,
            business_hours: false,
            escalate_to: None,
            actions: vec![EscalationActionDef::Reassign],
            is_active: true,
        };
        assert!(validate_template(&steps, &[rule], 24, None, 9, 17).is_err());
    }

    #[test]
    fn trigger_hours_converts_days() {
        let rule = EscalationRuleDef {
            id: "r".to_string(),
            trigger: EscalationTriggerKind::StepOverdue,
            trigger_value: 2,
            trigger_unit: TriggerUnit::Days,
            business_hours: false,
            escalate_to: None,
            actions: vec![EscalationActionDef::Notify],
            is_active: true,
        };
        assert_eq!(rule.trigger_hours(), 48);
    }
}
