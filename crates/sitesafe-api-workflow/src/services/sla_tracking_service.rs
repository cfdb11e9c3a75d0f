//! Entity SLA tracking.
//!
//! Independent of workflow instances: an incident's response and resolution
//! deadlines are tracked here even when no approval workflow is running for
//! it. Both consume the same business-hours clock.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument};

use sitesafe_db::models::{CreateSlaTracking, SlaConfiguration, SlaTracking};
use sitesafe_workflow::error::{Result, WorkflowError};
use sitesafe_workflow::sla::{
    compute_due_at, compute_warning_at, paused_duration, shifted_deadline, BusinessCalendar,
};
use sitesafe_workflow::sla_match::{select_rule, SlaMatchContext, SlaRule};
use sitesafe_workflow::types::EntityRef;

/// Service for entity SLA tracking.
pub struct SlaTrackingService {
    pool: PgPool,
}

impl SlaTrackingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start tracking an entity against the best-matching configuration.
    ///
    /// Returns `None` when no active configuration matches; the entity
    /// simply carries no SLA. The `(entity_type, entity_id)` uniqueness
    /// constraint rejects double starts.
    #[instrument(skip(self, attrs), fields(entity = %entity))]
    pub async fn start_tracking(
        &self,
        entity: EntityRef,
        attrs: SlaMatchContext,
    ) -> Result<Option<SlaTracking>> {
        let configs =
            SlaConfiguration::list_active_for_entity_type(&self.pool, &entity.entity_type).await?;
        let rules: Vec<SlaRule> = configs.iter().map(to_rule).collect();
        let Some(index) = select_rule(&rules, &attrs) else {
            info!("No SLA configuration matches, entity untracked");
            return Ok(None);
        };
        let config = &configs[index];

        let now = Utc::now();
        let calendar = calendar_of(config);
        let response_due_at = config
            .response_hours
            .map(|h| compute_due_at(now, i64::from(h), &calendar));
        let resolution_due_at = compute_due_at(now, i64::from(config.resolution_hours), &calendar);
        let warning_at = compute_warning_at(
            now,
            i64::from(config.resolution_hours),
            i64::from(config.warning_threshold_percent),
            &calendar,
        );

        let tracking = SlaTracking::create(
            &self.pool,
            &CreateSlaTracking {
                entity_type: entity.entity_type,
                entity_id: entity.entity_id,
                config_id: Some(config.id),
                started_at: now,
                response_due_at,
                resolution_due_at,
                warning_at: Some(warning_at),
            },
        )
        .await?;
        info!(
            tracking_id = %tracking.id,
            config_id = %config.id,
            resolution_due_at = %tracking.resolution_due_at,
            "Started SLA tracking"
        );
        Ok(Some(tracking))
    }

    /// Record the first response on an entity. Later calls are no-ops.
    pub async fn record_first_response(&self, entity: &EntityRef) -> Result<SlaTracking> {
        let tracking = self.require_tracking(entity).await?;
        Ok(SlaTracking::record_first_response(&self.pool, tracking.id, Utc::now()).await?)
    }

    /// Record resolution of an entity. Later calls are no-ops.
    pub async fn record_resolution(&self, entity: &EntityRef) -> Result<SlaTracking> {
        let tracking = self.require_tracking(entity).await?;
        Ok(SlaTracking::record_resolution(&self.pool, tracking.id, Utc::now()).await?)
    }

    /// Suspend the entity's SLA clock. Idempotent.
    pub async fn pause(&self, entity: &EntityRef) -> Result<SlaTracking> {
        let tracking = self.require_tracking(entity).await?;
        Ok(SlaTracking::pause(&self.pool, tracking.id, Utc::now()).await?)
    }

    /// Resume the entity's SLA clock, shifting every deadline forward by the
    /// paused duration. A no-op on an unpaused row.
    pub async fn resume(&self, entity: &EntityRef) -> Result<SlaTracking> {
        let tracking = self.require_tracking(entity).await?;
        let Some(paused_at) = tracking.paused_at.filter(|_| tracking.is_paused) else {
            return Ok(tracking);
        };
        let paused = paused_duration(paused_at, Utc::now());
        let tracking = SlaTracking::resume(
            &self.pool,
            tracking.id,
            paused.num_seconds(),
            tracking.response_due_at.map(|d| shifted_deadline(d, paused)),
            shifted_deadline(tracking.resolution_due_at, paused),
            tracking.warning_at.map(|d| shifted_deadline(d, paused)),
        )
        .await?;
        info!(
            tracking_id = %tracking.id,
            paused_seconds = paused.num_seconds(),
            "Resumed entity SLA clock"
        );
        Ok(tracking)
    }

    /// Current tracking state for an entity.
    pub async fn get(&self, entity: &EntityRef) -> Result<Option<SlaTracking>> {
        Ok(SlaTracking::find_by_entity(&self.pool, &entity.entity_type, entity.entity_id).await?)
    }

    async fn require_tracking(&self, entity: &EntityRef) -> Result<SlaTracking> {
        SlaTracking::find_by_entity(&self.pool, &entity.entity_type, entity.entity_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::Validation(format!("no SLA tracking for entity {entity}"))
            })
    }
}

fn to_rule(config: &SlaConfiguration) -> SlaRule {
    SlaRule {
        priority: config.priority.clone(),
        category: config.category.clone(),
        department: config.department.clone(),
        match_priority: config.match_priority,
    }
}

fn calendar_of(config: &SlaConfiguration) -> BusinessCalendar {
    BusinessCalendar {
        business_hours_only: config.business_hours_only,
        start_hour: config.business_start_hour.max(0) as u32,
        end_hour: config.business_end_hour.max(0) as u32,
        exclude_weekends: config.exclude_weekends,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn config(priority: Option<&str>, match_priority: i32) -> SlaConfiguration {
        let now = Utc::now();
        SlaConfiguration {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            entity_type: "incident".to_string(),
            priority: priority.map(str::to_string),
            category: None,
            department: None,
            response_hours: Some(4),
            resolution_hours: 48,
            warning_threshold_percent: 75,
            business_hours_only: true,
            business_start_hour: 9,
            business_end_hour: 17,
            exclude_weekends: true,
            match_priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn rule_conversion_keeps_qualifiers() {
        let rule = to_rule(&config(Some("critical"), 10));
        assert_eq!(rule.priority.as_deref(), Some("critical"));
        assert_eq!(rule.match_priority, 10);
    }

    #[test]
    fn calendar_conversion() {
        let cal = calendar_of(&config(None, 0));
        assert!(cal.business_hours_only);
        assert_eq!((cal.start_hour, cal.end_hour), (9, 17));
    }
}
