//! Escalation rule evaluation.
//!
//! Evaluates a template's escalation rules against one live instance and
//! applies the actions of every rule whose deadline has passed. Firing is
//! idempotent per `(instance, rule, step)`: the escalation log insert is the
//! claim, so overlapping sweeps apply each rule at most once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use sitesafe_db::models::{
    ApprovalRequest, CreateEscalationLog, EscalationLog, EscalationTrigger, StepStatus,
    WorkflowInstance, WorkflowPriority, WorkflowStep, WorkflowTemplate,
};
use sitesafe_workflow::error::{Result, WorkflowError};
use sitesafe_workflow::sla::{compute_due_at, BusinessCalendar};
use sitesafe_workflow::template::{
    parse_escalation_rules, ApproverRef, EscalationActionDef, EscalationRuleDef,
    EscalationTriggerKind,
};

use super::directory::ApproverDirectory;
use super::notification::{Notification, NotificationSink};

/// Outcome of evaluating one instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationOutcome {
    /// Rules that fired for the first time on this pass.
    pub fired: usize,
    /// Rules whose deadline had passed but had already fired.
    pub already_fired: usize,
}

/// Service for escalation operations.
pub struct EscalationService {
    pool: PgPool,
    directory: Arc<dyn ApproverDirectory>,
    notifier: Arc<dyn NotificationSink>,
}

impl EscalationService {
    pub fn new(
        pool: PgPool,
        directory: Arc<dyn ApproverDirectory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pool,
            directory,
            notifier,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Evaluate every active rule of an instance's template.
    ///
    /// Paused instances are skipped entirely: their clock is stopped.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn evaluate_instance(
        &self,
        instance: &WorkflowInstance,
        now: DateTime<Utc>,
    ) -> Result<EscalationOutcome> {
        let mut outcome = EscalationOutcome::default();
        if instance.is_paused || !instance.status.is_active() {
            return Ok(outcome);
        }

        let template = WorkflowTemplate::find_by_id(&self.pool, instance.template_id)
            .await?
            .ok_or_else(|| WorkflowError::TemplateNotFound(instance.template_id.to_string()))?;
        let rules = parse_escalation_rules(&template.escalation_rules)?;
        if rules.is_empty() {
            return Ok(outcome);
        }

        let mut conn = self.pool.acquire().await?;
        let step = WorkflowStep::find_by_instance_and_number(
            &mut *conn,
            instance.id,
            instance.current_step,
        )
        .await?;
        drop(conn);

        let calendar = BusinessCalendar {
            business_hours_only: template.business_hours_only,
            start_hour: template.business_start_hour.max(0) as u32,
            end_hour: template.business_end_hour.max(0) as u32,
            exclude_weekends: template.exclude_weekends,
        };

        for rule in rules.iter().filter(|r| r.is_active) {
            let Some(deadline) = self
                .rule_deadline(rule, instance, step.as_ref(), &calendar)
                .await?
            else {
                continue;
            };
            if now < deadline {
                continue;
            }

            let fired = self.fire_rule(rule, instance, step.as_ref()).await?;
            if fired {
                outcome.fired += 1;
            } else {
                outcome.already_fired += 1;
            }
        }

        Ok(outcome)
    }

    /// The instant at which a rule's condition becomes overdue, or `None`
    /// when the condition does not currently apply.
    async fn rule_deadline(
        &self,
        rule: &EscalationRuleDef,
        instance: &WorkflowInstance,
        step: Option<&WorkflowStep>,
        calendar: &BusinessCalendar,
    ) -> Result<Option<DateTime<Utc>>> {
        let base = match rule.trigger {
            EscalationTriggerKind::StepOverdue => step
                .filter(|s| s.status == StepStatus::InProgress)
                .and_then(|s| s.started_at),
            EscalationTriggerKind::NoResponse => match step {
                Some(s) => {
                    ApprovalRequest::oldest_open_dispatch_for_step(&self.pool, s.id).await?
                }
                None => None,
            },
            // SLA triggers fire off the precomputed instance deadlines; the
            // threshold already went into those at start time.
            EscalationTriggerKind::SlaWarning => return Ok(instance.sla_warning_at),
            EscalationTriggerKind::SlaBreach => return Ok(instance.sla_due_at),
        };
        Ok(base.map(|b| threshold_deadline(b, rule, calendar)))
    }

    /// Record the firing and, if this pass won the claim, apply the actions.
    async fn fire_rule(
        &self,
        rule: &EscalationRuleDef,
        instance: &WorkflowInstance,
        step: Option<&WorkflowStep>,
    ) -> Result<bool> {
        let (to_user_id, to_role) = match &rule.escalate_to {
            Some(ApproverRef::User { user_id }) => (Some(*user_id), None),
            Some(ApproverRef::Role { role }) => (None, Some(role.clone())),
            None => (None, None),
        };
        let priority_after = rule.actions.iter().find_map(|a| match a {
            EscalationActionDef::ChangePriority { to } => WorkflowPriority::parse(to),
            _ => None,
        });
        let from_user_id = step.and_then(|s| s.required_approvers.first().copied());

        let inserted = EscalationLog::record(
            &self.pool,
            &CreateEscalationLog {
                instance_id: instance.id,
                rule_id: rule.id.clone(),
                step_number: instance.current_step,
                trigger: to_db_trigger(rule.trigger),
                from_user_id,
                to_user_id,
                to_role: to_role.clone(),
                priority_before: priority_after.map(|_| instance.priority),
                priority_after,
                reason: Some(format!("escalation rule '{}' deadline passed", rule.id)),
            },
        )
        .await?;
        if !inserted {
            debug!(rule_id = %rule.id, "Escalation already recorded, skipping");
            return Ok(false);
        }

        info!(
            instance_id = %instance.id,
            rule_id = %rule.id,
            trigger = ?rule.trigger,
            "Escalation rule fired"
        );

        for action in &rule.actions {
            match action {
                EscalationActionDef::Notify => {
                    if let Some(s) = step {
                        ApprovalRequest::bump_reminders_for_step(&self.pool, s.id).await?;
                        for approver in &s.required_approvers {
                            self.notify(Notification::ApprovalReminder {
                                instance_id: instance.id,
                                step_name: s.name.clone(),
                                approver_id: *approver,
                            })
                            .await;
                        }
                    }
                }
                EscalationActionDef::Reassign => {
                    if let Some(s) = step {
                        if let Some(target) = self.resolve_target(&rule.escalate_to).await? {
                            let rerouted =
                                ApprovalRequest::reassign_open_for_step(&self.pool, s.id, target)
                                    .await?;
                            info!(
                                instance_id = %instance.id,
                                step_id = %s.id,
                                target = %target,
                                rerouted,
                                "Reassigned open approval requests"
                            );
                        } else {
                            warn!(
                                instance_id = %instance.id,
                                rule_id = %rule.id,
                                "Escalation target resolved to nobody, reassignment skipped"
                            );
                        }
                    }
                }
                EscalationActionDef::ChangePriority { to } => {
                    if let Some(parsed) = WorkflowPriority::parse(to) {
                        let mut conn = self.pool.acquire().await?;
                        WorkflowInstance::set_priority(&mut *conn, instance.id, parsed).await?;
                    }
                }
            }
        }

        self.notify(Notification::Escalated {
            instance_id: instance.id,
            rule_id: rule.id.clone(),
            step_number: instance.current_step,
            to_user_id,
            to_role,
        })
        .await;
        Ok(true)
    }

    /// Resolve an escalation target to a single user.
    async fn resolve_target(&self, target: &Option<ApproverRef>) -> Result<Option<Uuid>> {
        match target {
            Some(ApproverRef::User { user_id }) => Ok(Some(*user_id)),
            Some(ApproverRef::Role { role }) => {
                let members = self
                    .directory
                    .members_of(role)
                    .await
                    .map_err(|e| WorkflowError::Directory(e.to_string()))?;
                Ok(members.first().copied())
            }
            None => Ok(None),
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.deliver(&notification).await {
            warn!(error = %e, "Notification delivery failed");
        }
    }
}

/// Deadline for a threshold-based rule measured from `base`.
fn threshold_deadline(
    base: DateTime<Utc>,
    rule: &EscalationRuleDef,
    calendar: &BusinessCalendar,
) -> DateTime<Utc> {
    if rule.business_hours {
        compute_due_at(base, rule.trigger_hours(), calendar)
    } else {
        base + Duration::hours(rule.trigger_hours())
    }
}

fn to_db_trigger(kind: EscalationTriggerKind) -> EscalationTrigger {
    match kind {
        EscalationTriggerKind::StepOverdue => EscalationTrigger::StepOverdue,
        EscalationTriggerKind::NoResponse => EscalationTrigger::NoResponse,
        EscalationTriggerKind::SlaWarning => EscalationTrigger::SlaWarning,
        EscalationTriggerKind::SlaBreach => EscalationTrigger::SlaBreach,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sitesafe_workflow::template::TriggerUnit;

    fn rule(hours: i64, business_hours: bool) -> EscalationRuleDef {
        EscalationRuleDef {
            id: "r1".to_string(),
            trigger: EscalationTriggerKind::StepOverdue,
            trigger_value: hours,
            trigger_unit: TriggerUnit::Hours,
            business_hours,
            escalate_to: None,
            actions: vec![EscalationActionDef::Notify],
            is_active: true,
        }
    }

    #[test]
    fn wall_clock_threshold() {
        let base = Utc.with_ymd_and_hms(2025, 3, 7, 16, 0, 0).unwrap();
        let cal = BusinessCalendar::wall_clock();
        assert_eq!(
            threshold_deadline(base, &rule(3, false), &cal),
            base + Duration::hours(3)
        );
    }

    #[test]
    fn business_hours_threshold_skips_weekend() {
        // Friday 16:00 + 3 business hours in a 9-17 week lands Monday 11:00.
        let base = Utc.with_ymd_and_hms(2025, 3, 7, 16, 0, 0).unwrap();
        let cal = BusinessCalendar {
            business_hours_only: true,
            start_hour: 9,
            end_hour: 17,
            exclude_weekends: true,
        };
        assert_eq!(
            threshold_deadline(base, &rule(3, true), &cal),
            Utc.with_ymd_and_hms(2025, 3, 10, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn day_unit_converts() {
        let base = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut r = rule(2, false);
        r.trigger_unit = TriggerUnit::Days;
        assert_eq!(
            threshold_deadline(base, &r, &BusinessCalendar::wall_clock()),
            base + Duration::hours(48)
        );
    }

    #[test]
    fn trigger_mapping_is_total() {
        assert_eq!(
            to_db_trigger(EscalationTriggerKind::SlaBreach),
            EscalationTrigger::SlaBreach
        );
        assert_eq!(
            to_db_trigger(EscalationTriggerKind::NoResponse),
            EscalationTrigger::NoResponse
        );
    }
}
