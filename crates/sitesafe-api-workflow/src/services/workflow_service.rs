//! Workflow instance execution.
//!
//! Drives instances through their step lists: starting from a template,
//! recording approval responses, advancing past notification and action
//! steps, and terminating on rejection or cancellation. All mutating paths
//! lock the instance row `FOR UPDATE`, so a response racing a cancellation
//! serializes on the row and the loser sees the terminal state.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use sitesafe_db::models::{
    ApprovalDecision, ApprovalRequest, CreateApprovalRequest, CreateWorkflowInstance,
    CreateWorkflowStep, EscalationLog, InstanceStatus, PendingApprovalRow, StepOutcome, StepStatus,
    StepType, WorkflowInstance, WorkflowPriority, WorkflowStep, WorkflowTemplate,
};
use sitesafe_workflow::chain::{self, ChainEvaluation, ChainOutcome, Decision};
use sitesafe_workflow::conditions::ConditionSet;
use sitesafe_workflow::error::{Result, WorkflowError};
use sitesafe_workflow::sla::{
    compute_due_at, compute_warning_at, paused_duration, shifted_deadline, BusinessCalendar,
};
use sitesafe_workflow::template::{
    parse_steps, ApprovalStepDef, ApproverRef, StepAction, StepDefinition,
};
use sitesafe_workflow::types::EntityRef;

use super::delegation_service::DelegationService;
use super::directory::ApproverDirectory;
use super::notification::{Notification, NotificationSink};

/// Warning threshold used when a template gives no explicit warning lead.
const DEFAULT_WARNING_PERCENT: i64 = 80;

/// Input for starting a workflow.
#[derive(Debug, Clone)]
pub struct StartWorkflow {
    pub template_code: String,
    pub entity: EntityRef,
    pub context: serde_json::Value,
    pub initiated_by: Option<Uuid>,
    pub priority: Option<WorkflowPriority>,
}

/// Outcome of a start attempt.
#[derive(Debug)]
pub enum StartOutcome {
    Started(WorkflowInstance),
    /// Trigger conditions evaluated false; nothing was created.
    NotApplicable,
}

/// Result of recording an approval response.
#[derive(Debug)]
pub struct ResponseOutcome {
    pub instance: WorkflowInstance,
    /// `Some` when this response resolved the step, `None` while the chain
    /// is still awaiting other approvers.
    pub step_outcome: Option<StepOutcome>,
}

/// Full instance view for detail endpoints.
#[derive(Debug)]
pub struct InstanceDetail {
    pub instance: WorkflowInstance,
    pub steps: Vec<WorkflowStep>,
    pub requests: Vec<ApprovalRequest>,
    pub escalations: Vec<EscalationLog>,
}

/// Service for workflow instance operations.
pub struct WorkflowService {
    pool: PgPool,
    directory: Arc<dyn ApproverDirectory>,
    notifier: Arc<dyn NotificationSink>,
    delegations: DelegationService,
}

impl WorkflowService {
    pub fn new(
        pool: PgPool,
        directory: Arc<dyn ApproverDirectory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let delegations = DelegationService::new(pool.clone());
        Self {
            pool,
            directory,
            notifier,
            delegations,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start a workflow instance from a template code.
    ///
    /// Evaluates trigger conditions against the context first; a false
    /// result is a deliberate no-op, not an error. On a match the instance,
    /// its step rows and the first wave of approval requests are created in
    /// one transaction.
    #[instrument(skip(self, input), fields(template_code = %input.template_code, entity = %input.entity))]
    pub async fn start(&self, input: StartWorkflow) -> Result<StartOutcome> {
        let template = WorkflowTemplate::find_active_by_code(&self.pool, &input.template_code)
            .await?
            .ok_or_else(|| WorkflowError::TemplateNotFound(input.template_code.clone()))?;

        if let Some(raw) = &template.trigger_conditions {
            let conditions: ConditionSet = serde_json::from_value(raw.clone())
                .map_err(|e| WorkflowError::Validation(format!("invalid trigger conditions: {e}")))?;
            if !conditions.matches(&input.context) {
                info!("Trigger conditions not met, workflow not started");
                return Ok(StartOutcome::NotApplicable);
            }
        }

        let steps = parse_steps(&template.steps)?;
        let calendar = calendar_of(&template);
        let now = Utc::now();
        let sla_due_at = compute_due_at(now, i64::from(template.sla_hours), &calendar);
        let sla_warning_at = match template.warning_hours {
            Some(lead) => compute_due_at(
                now,
                i64::from(template.sla_hours - lead).max(0),
                &calendar,
            ),
            None => compute_warning_at(
                now,
                i64::from(template.sla_hours),
                DEFAULT_WARNING_PERCENT,
                &calendar,
            ),
        };

        let mut tx = self.pool.begin().await?;
        let instance = WorkflowInstance::create(
            &mut *tx,
            &CreateWorkflowInstance {
                template_id: template.id,
                template_version: template.version,
                entity_type: input.entity.entity_type.clone(),
                entity_id: input.entity.entity_id,
                priority: input.priority.unwrap_or(WorkflowPriority::Medium),
                initiated_by: input.initiated_by,
                sla_due_at: Some(sla_due_at),
                sla_warning_at: Some(sla_warning_at),
                context: input.context.clone(),
            },
        )
        .await?;

        for (i, def) in steps.iter().enumerate() {
            let skipped = def
                .show_condition()
                .map_or(false, |c| !c.matches(&input.context));
            WorkflowStep::create(
                &mut *tx,
                &CreateWorkflowStep {
                    instance_id: instance.id,
                    step_number: i as i32,
                    name: def.name().to_string(),
                    step_type: step_type_of(def),
                    approval_mode: approval_mode_of(def),
                    require_all: require_all_of(def),
                    status: if skipped {
                        StepStatus::Skipped
                    } else {
                        StepStatus::Pending
                    },
                },
            )
            .await?;
        }

        let instance = self
            .run_from(&mut *tx, instance, &template, &steps, 0)
            .await?;
        tx.commit().await?;
        self.notify_finished(&instance).await;

        info!(instance_id = %instance.id, status = ?instance.status, "Started workflow instance");
        Ok(StartOutcome::Started(instance))
    }

    /// Start every matching auto-trigger workflow for an entity event.
    ///
    /// Called by entity modules when a record is created or changed. Each
    /// template starts independently; one failing template does not block
    /// the others.
    #[instrument(skip(self, context), fields(entity = %entity))]
    pub async fn auto_start_for_entity(
        &self,
        entity: EntityRef,
        context: serde_json::Value,
        initiated_by: Option<Uuid>,
    ) -> Result<Vec<WorkflowInstance>> {
        let templates =
            WorkflowTemplate::find_auto_trigger_for_entity_type(&self.pool, &entity.entity_type)
                .await?;

        let mut started = Vec::new();
        for template in templates {
            let outcome = self
                .start(StartWorkflow {
                    template_code: template.code.clone(),
                    entity: entity.clone(),
                    context: context.clone(),
                    initiated_by,
                    priority: None,
                })
                .await;
            match outcome {
                Ok(StartOutcome::Started(instance)) => started.push(instance),
                Ok(StartOutcome::NotApplicable) => {}
                Err(e) => {
                    warn!(code = %template.code, error = %e, "Auto-trigger start failed");
                }
            }
        }
        Ok(started)
    }

    /// Record an approver's response.
    ///
    /// The instance row is locked first; a request that is no longer pending
    /// surfaces as a conflict, never a silent overwrite. Resolving the step
    /// advances the instance inside the same transaction.
    #[instrument(skip(self, notes), fields(request_id = %request_id, user_id = %user_id))]
    pub async fn respond(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        decision: ApprovalDecision,
        notes: Option<String>,
    ) -> Result<ResponseOutcome> {
        let request = ApprovalRequest::find_by_id(&self.pool, request_id)
            .await?
            .ok_or_else(|| WorkflowError::ApprovalRequestNotFound(request_id.to_string()))?;
        if !request.actionable_by(user_id) {
            // Not distinguishable from a nonexistent request on purpose.
            return Err(WorkflowError::ApprovalRequestNotFound(
                request_id.to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let instance = WorkflowInstance::find_by_id_for_update(&mut *tx, request.instance_id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(request.instance_id))?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "workflow instance {} already {:?}",
                instance.id, instance.status
            )));
        }

        ApprovalRequest::record_response(&mut *tx, request_id, decision, notes.as_deref())
            .await?
            .ok_or_else(|| {
                WorkflowError::Conflict(format!(
                    "approval request {request_id} was already answered or expired"
                ))
            })?;
        let step = WorkflowStep::append_actual_approver(&mut *tx, request.step_id, user_id).await?;

        let template = WorkflowTemplate::find_by_id(&self.pool, instance.template_id)
            .await?
            .ok_or_else(|| WorkflowError::TemplateNotFound(instance.template_id.to_string()))?;
        let defs = parse_steps(&template.steps)?;

        let requests = ApprovalRequest::find_by_step(&mut *tx, step.id).await?;
        let responses: Vec<(Uuid, Decision)> = requests
            .iter()
            .filter_map(|r| r.response.map(|d| (r.approver_id, to_decision(d))))
            .collect();

        let mode = step
            .approval_mode
            .map(to_domain_mode)
            .unwrap_or(sitesafe_workflow::template::ApprovalMode::Parallel);
        let evaluation = chain::evaluate(mode, step.require_all, &step.required_approvers, &responses);

        let (instance, step_outcome) = match evaluation {
            ChainEvaluation::Awaiting { open } => {
                // Sequential chains dispatch the next approver's request now.
                for approver in open {
                    let already_dispatched = requests.iter().any(|r| r.approver_id == approver);
                    if !already_dispatched {
                        self.dispatch_request(&mut *tx, &instance, &template, &step, approver)
                            .await?;
                    }
                }
                (instance, None)
            }
            ChainEvaluation::Resolved(ChainOutcome::Approved) => {
                ApprovalRequest::expire_open_for_step(&mut *tx, step.id).await?;
                WorkflowStep::complete(&mut *tx, step.id, Some(StepOutcome::Approved)).await?;
                let instance = self
                    .run_from(&mut *tx, instance, &template, &defs, step.step_number + 1)
                    .await?;
                (instance, Some(StepOutcome::Approved))
            }
            ChainEvaluation::Resolved(ChainOutcome::Rejected) => {
                ApprovalRequest::expire_open_for_step(&mut *tx, step.id).await?;
                WorkflowStep::complete(&mut *tx, step.id, Some(StepOutcome::Rejected)).await?;
                let instance =
                    WorkflowInstance::update_status(&mut *tx, instance.id, InstanceStatus::Rejected)
                        .await?;
                (instance, Some(StepOutcome::Rejected))
            }
        };

        tx.commit().await?;
        self.notify_finished(&instance).await;
        info!(
            instance_id = %instance.id,
            step_number = step.step_number,
            decision = ?decision,
            "Recorded approval response"
        );
        Ok(ResponseOutcome {
            instance,
            step_outcome,
        })
    }

    /// Cancel a live instance. Open approval requests are expired so they
    /// vanish from worklists.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        instance_id: Uuid,
        cancelled_by: Option<Uuid>,
        reason: Option<String>,
    ) -> Result<WorkflowInstance> {
        let mut tx = self.pool.begin().await?;
        let instance = WorkflowInstance::find_by_id_for_update(&mut *tx, instance_id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(instance_id))?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "workflow instance {instance_id} already {:?}",
                instance.status
            )));
        }

        ApprovalRequest::expire_open_for_instance(&mut *tx, instance_id).await?;
        let instance =
            WorkflowInstance::update_status(&mut *tx, instance_id, InstanceStatus::Cancelled).await?;
        tx.commit().await?;
        self.notify_finished(&instance).await;
        info!(
            instance_id = %instance_id,
            cancelled_by = ?cancelled_by,
            reason = reason.as_deref().unwrap_or(""),
            "Cancelled workflow instance"
        );
        Ok(instance)
    }

    /// Suspend the instance SLA clock. Idempotent.
    pub async fn pause_sla(&self, instance_id: Uuid) -> Result<WorkflowInstance> {
        let mut tx = self.pool.begin().await?;
        let instance = WorkflowInstance::find_by_id_for_update(&mut *tx, instance_id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(instance_id))?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "workflow instance {instance_id} already {:?}",
                instance.status
            )));
        }
        let instance = WorkflowInstance::pause_sla(&mut *tx, instance_id, Utc::now()).await?;
        tx.commit().await?;
        Ok(instance)
    }

    /// Resume the instance SLA clock, shifting deadlines by exactly the
    /// paused duration. A no-op on an unpaused instance.
    pub async fn resume_sla(&self, instance_id: Uuid) -> Result<WorkflowInstance> {
        let mut tx = self.pool.begin().await?;
        let instance = WorkflowInstance::find_by_id_for_update(&mut *tx, instance_id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(instance_id))?;
        let Some(paused_at) = instance.paused_at.filter(|_| instance.is_paused) else {
            return Ok(instance);
        };
        let paused = paused_duration(paused_at, Utc::now());
        let instance = WorkflowInstance::resume_sla(
            &mut *tx,
            instance_id,
            paused.num_seconds(),
            instance.sla_due_at.map(|d| shifted_deadline(d, paused)),
            instance.sla_warning_at.map(|d| shifted_deadline(d, paused)),
        )
        .await?;
        tx.commit().await?;
        info!(
            instance_id = %instance_id,
            paused_seconds = paused.num_seconds(),
            "Resumed workflow SLA clock"
        );
        Ok(instance)
    }

    /// Full instance view: steps, requests and escalation history.
    pub async fn get_instance(&self, instance_id: Uuid) -> Result<InstanceDetail> {
        let instance = WorkflowInstance::find_by_id(&self.pool, instance_id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(instance_id))?;
        let steps = WorkflowStep::find_by_instance(&self.pool, instance_id).await?;
        let requests = ApprovalRequest::find_by_instance(&self.pool, instance_id).await?;
        let escalations = EscalationLog::find_by_instance(&self.pool, instance_id).await?;
        Ok(InstanceDetail {
            instance,
            steps,
            requests,
            escalations,
        })
    }

    /// Pending approval worklist for a user.
    pub async fn pending_approvals(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PendingApprovalRow>> {
        Ok(ApprovalRequest::list_pending_for_user(&self.pool, user_id, limit, offset).await?)
    }

    /// Advance the instance from `from_step`, executing non-approval steps
    /// inline until an approval step is dispatched or the step list ends.
    async fn run_from(
        &self,
        conn: &mut PgConnection,
        mut instance: WorkflowInstance,
        template: &WorkflowTemplate,
        defs: &[StepDefinition],
        from_step: i32,
    ) -> Result<WorkflowInstance> {
        let mut idx = from_step;
        loop {
            let Some(def) = usize::try_from(idx).ok().and_then(|i| defs.get(i)) else {
                // Terminal-state notifications go out after the caller
                // commits, never from inside the open transaction.
                return Ok(
                    WorkflowInstance::update_status(conn, instance.id, InstanceStatus::Completed)
                        .await?,
                );
            };

            let step = WorkflowStep::find_by_instance_and_number(conn, instance.id, idx)
                .await?
                .ok_or_else(|| {
                    WorkflowError::Validation(format!(
                        "step {idx} missing for instance {}",
                        instance.id
                    ))
                })?;
            if step.status == StepStatus::Skipped {
                idx += 1;
                continue;
            }

            match def {
                StepDefinition::Approval(approval) => {
                    instance = WorkflowInstance::advance_to_step(
                        conn,
                        instance.id,
                        idx,
                        InstanceStatus::AwaitingApproval,
                    )
                    .await?;
                    if self
                        .dispatch_approval_step(conn, &instance, template, approval, &step)
                        .await?
                    {
                        return Ok(instance);
                    }
                    // Empty snapshot; the step auto-approved, keep going.
                    idx += 1;
                }
                StepDefinition::Notification(note) => {
                    instance = WorkflowInstance::advance_to_step(
                        conn,
                        instance.id,
                        idx,
                        InstanceStatus::InProgress,
                    )
                    .await?;
                    WorkflowStep::start(conn, step.id, &[], None).await?;
                    let recipients = self.resolve_refs(&note.recipients).await?;
                    self.notify(Notification::StepMessage {
                        instance_id: instance.id,
                        step_name: note.name.clone(),
                        recipients,
                        message: note.message.clone(),
                    })
                    .await;
                    WorkflowStep::complete(conn, step.id, None).await?;
                    idx += 1;
                }
                StepDefinition::Action(action) => {
                    instance = WorkflowInstance::advance_to_step(
                        conn,
                        instance.id,
                        idx,
                        InstanceStatus::InProgress,
                    )
                    .await?;
                    WorkflowStep::start(conn, step.id, &[], None).await?;
                    match &action.action {
                        StepAction::SetPriority { priority } => {
                            let parsed = WorkflowPriority::parse(priority).ok_or_else(|| {
                                WorkflowError::Validation(format!("unknown priority '{priority}'"))
                            })?;
                            instance =
                                WorkflowInstance::set_priority(conn, instance.id, parsed).await?;
                        }
                        StepAction::SetContextField { field, value } => {
                            let patch = serde_json::json!({ field.as_str(): value });
                            instance =
                                WorkflowInstance::merge_context(conn, instance.id, &patch).await?;
                        }
                    }
                    WorkflowStep::complete(conn, step.id, None).await?;
                    idx += 1;
                }
            }
        }
    }

    /// Freeze the approver snapshot and dispatch the first wave of requests.
    ///
    /// Returns false when the snapshot resolved empty: the step is completed
    /// as approved and execution continues.
    async fn dispatch_approval_step(
        &self,
        conn: &mut PgConnection,
        instance: &WorkflowInstance,
        template: &WorkflowTemplate,
        def: &ApprovalStepDef,
        step: &WorkflowStep,
    ) -> Result<bool> {
        let approvers = self.resolve_refs(&def.required_approvers).await?;
        let calendar = calendar_of(template);
        let due_at = def
            .due_hours
            .map(|h| compute_due_at(Utc::now(), i64::from(h), &calendar));
        let step = WorkflowStep::start(conn, step.id, &approvers, due_at).await?;

        if approvers.is_empty() {
            warn!(
                instance_id = %instance.id,
                step_number = step.step_number,
                "Approval step resolved no approvers, auto-approving"
            );
            WorkflowStep::complete(conn, step.id, Some(StepOutcome::Approved)).await?;
            return Ok(false);
        }

        let wave: &[Uuid] = match def.approval_type {
            sitesafe_workflow::template::ApprovalMode::Sequential => &approvers[..1],
            sitesafe_workflow::template::ApprovalMode::Parallel => &approvers[..],
        };
        for approver in wave {
            self.dispatch_request(conn, instance, template, &step, *approver)
                .await?;
        }
        Ok(true)
    }

    /// Create one approval request, routing through the delegation registry.
    async fn dispatch_request(
        &self,
        conn: &mut PgConnection,
        instance: &WorkflowInstance,
        template: &WorkflowTemplate,
        step: &WorkflowStep,
        approver: Uuid,
    ) -> Result<ApprovalRequest> {
        let delegated_to = self
            .delegations
            .effective_delegate(approver, &template.code, Utc::now())
            .await?;
        let request = ApprovalRequest::create(
            conn,
            &CreateApprovalRequest {
                step_id: step.id,
                instance_id: instance.id,
                approver_id: approver,
                delegated_to,
                due_at: step.due_at,
            },
        )
        .await?;

        self.notify(Notification::ApprovalRequested {
            request_id: request.id,
            instance_id: instance.id,
            step_name: step.name.clone(),
            approver_id: approver,
            delegated_to,
        })
        .await;
        Ok(request)
    }

    /// Resolve user and role references to a deduplicated user list,
    /// preserving first-seen order.
    async fn resolve_refs(&self, refs: &[ApproverRef]) -> Result<Vec<Uuid>> {
        let mut resolved = Vec::new();
        for r in refs {
            match r {
                ApproverRef::User { user_id } => {
                    if !resolved.contains(user_id) {
                        resolved.push(*user_id);
                    }
                }
                ApproverRef::Role { role } => {
                    let members = self
                        .directory
                        .members_of(role)
                        .await
                        .map_err(|e| WorkflowError::Directory(e.to_string()))?;
                    for member in members {
                        if !resolved.contains(&member) {
                            resolved.push(member);
                        }
                    }
                }
            }
        }
        Ok(resolved)
    }

    /// Emit the terminal notification for an instance, if it is terminal.
    ///
    /// Called after the transaction commits, so a failed commit never
    /// produces a phantom "completed" or "rejected" notification.
    async fn notify_finished(&self, instance: &WorkflowInstance) {
        let Some(status) = finished_label(instance.status) else {
            return;
        };
        self.notify(Notification::WorkflowFinished {
            instance_id: instance.id,
            entity_type: instance.entity_type.clone(),
            entity_id: instance.entity_id,
            status: status.to_string(),
        })
        .await;
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.deliver(&notification).await {
            warn!(error = %e, "Notification delivery failed");
        }
    }
}

/// Wire label for a terminal instance state; `None` for in-flight states.
fn finished_label(status: InstanceStatus) -> Option<&'static str> {
    match status {
        InstanceStatus::Completed => Some("completed"),
        InstanceStatus::Rejected => Some("rejected"),
        InstanceStatus::Cancelled => Some("cancelled"),
        InstanceStatus::Pending | InstanceStatus::InProgress | InstanceStatus::AwaitingApproval => {
            None
        }
    }
}

fn calendar_of(template: &WorkflowTemplate) -> BusinessCalendar {
    BusinessCalendar {
        business_hours_only: template.business_hours_only,
        start_hour: template.business_start_hour.max(0) as u32,
        end_hour: template.business_end_hour.max(0) as u32,
        exclude_weekends: template.exclude_weekends,
    }
}

fn to_decision(decision: ApprovalDecision) -> Decision {
    match decision {
        ApprovalDecision::Approve => Decision::Approve,
        ApprovalDecision::Reject => Decision::Reject,
    }
}

fn to_domain_mode(mode: sitesafe_db::models::ApprovalMode) -> sitesafe_workflow::template::ApprovalMode {
    match mode {
        sitesafe_db::models::ApprovalMode::Sequential => {
            sitesafe_workflow::template::ApprovalMode::Sequential
        }
        sitesafe_db::models::ApprovalMode::Parallel => {
            sitesafe_workflow::template::ApprovalMode::Parallel
        }
    }
}

fn step_type_of(def: &StepDefinition) -> StepType {
    match def {
        StepDefinition::Approval(_) => StepType::Approval,
        StepDefinition::Notification(_) => StepType::Notification,
        StepDefinition::Action(_) => StepType::Action,
    }
}

fn approval_mode_of(def: &StepDefinition) -> Option<sitesafe_db::models::ApprovalMode> {
    match def {
        StepDefinition::Approval(a) => Some(match a.approval_type {
            sitesafe_workflow::template::ApprovalMode::Sequential => {
                sitesafe_db::models::ApprovalMode::Sequential
            }
            sitesafe_workflow::template::ApprovalMode::Parallel => {
                sitesafe_db::models::ApprovalMode::Parallel
            }
        }),
        _ => None,
    }
}

fn require_all_of(def: &StepDefinition) -> bool {
    match def {
        StepDefinition::Approval(a) => a.require_all,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_with_hours(
        business_hours_only: bool,
        start: i32,
        end: i32,
    ) -> WorkflowTemplate {
        let now = Utc::now();
        WorkflowTemplate {
            id: Uuid::new_v4(),
            code: "incident_approval".to_string(),
            name: "Incident approval".to_string(),
            description: None,
            trigger_entity_type: "incident".to_string(),
            trigger_conditions: None,
            auto_trigger: false,
            sla_hours: 24,
            warning_hours: None,
            business_hours_only,
            business_start_hour: start,
            business_end_hour: end,
            exclude_weekends: true,
            steps: serde_json::json!([]),
            escalation_rules: serde_json::json!([]),
            is_active: true,
            version: 1,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn calendar_mapping() {
        let cal = calendar_of(&template_with_hours(true, 9, 17));
        assert!(cal.business_hours_only);
        assert_eq!(cal.start_hour, 9);
        assert_eq!(cal.end_hour, 17);
        assert!(cal.exclude_weekends);
    }

    #[test]
    fn decision_mapping() {
        assert_eq!(to_decision(ApprovalDecision::Approve), Decision::Approve);
        assert_eq!(to_decision(ApprovalDecision::Reject), Decision::Reject);
    }

    #[test]
    fn step_metadata_from_definitions() {
        let def: StepDefinition = serde_json::from_value(serde_json::json!({
            "step_type": "approval",
            "name": "Review",
            "approval_type": "parallel",
            "require_all": false,
            "required_approvers": [{"role": "hse_manager"}]
        }))
        .unwrap();
        assert_eq!(step_type_of(&def), StepType::Approval);
        assert_eq!(
            approval_mode_of(&def),
            Some(sitesafe_db::models::ApprovalMode::Parallel)
        );
        assert!(!require_all_of(&def));
    }

    #[test]
    fn finished_label_only_for_terminal_states() {
        assert_eq!(finished_label(InstanceStatus::Completed), Some("completed"));
        assert_eq!(finished_label(InstanceStatus::Rejected), Some("rejected"));
        assert_eq!(finished_label(InstanceStatus::Cancelled), Some("cancelled"));
        assert_eq!(finished_label(InstanceStatus::Pending), None);
        assert_eq!(finished_label(InstanceStatus::InProgress), None);
        assert_eq!(finished_label(InstanceStatus::AwaitingApproval), None);
    }
}
