//! Template publishing and lookup.

use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use sitesafe_db::models::{CreateWorkflowTemplate, TemplateFilter, WorkflowTemplate};
use sitesafe_workflow::error::{Result, WorkflowError};
use sitesafe_workflow::template::{parse_escalation_rules, parse_steps, validate_template};

/// Service for workflow template operations.
pub struct TemplateService {
    pool: PgPool,
}

impl TemplateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Publish a template version.
    ///
    /// Validates the definition, deactivates the previous version of the
    /// code and inserts the next version, all in one transaction. Published
    /// versions are immutable; running instances keep the version they
    /// started with.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn publish(&self, input: CreateWorkflowTemplate) -> Result<WorkflowTemplate> {
        let steps = parse_steps(&input.steps)?;
        let rules = parse_escalation_rules(&input.escalation_rules)?;
        validate_template(
            &steps,
            &rules,
            input.sla_hours,
            input.warning_hours,
            input.business_start_hour,
            input.business_end_hour,
        )?;

        let mut tx = self.pool.begin().await?;
        WorkflowTemplate::deactivate_code(&mut *tx, &input.code).await?;
        let version = WorkflowTemplate::max_version(&mut *tx, &input.code).await? + 1;
        let template = WorkflowTemplate::insert_version(&mut *tx, &input, version).await?;
        tx.commit().await?;

        info!(
            template_id = %template.id,
            code = %template.code,
            version = template.version,
            "Published workflow template"
        );
        Ok(template)
    }

    /// Active version for a template code.
    pub async fn get_active(&self, code: &str) -> Result<WorkflowTemplate> {
        WorkflowTemplate::find_active_by_code(&self.pool, code)
            .await?
            .ok_or_else(|| WorkflowError::TemplateNotFound(code.to_string()))
    }

    /// A specific template version row.
    pub async fn get(&self, id: Uuid) -> Result<WorkflowTemplate> {
        WorkflowTemplate::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| WorkflowError::TemplateNotFound(id.to_string()))
    }

    /// List templates with filtering and pagination.
    pub async fn list(
        &self,
        filter: &TemplateFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkflowTemplate>> {
        Ok(WorkflowTemplate::list(&self.pool, filter, limit, offset).await?)
    }

    /// Deactivate all versions of a code without publishing a replacement.
    pub async fn retire(&self, code: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let changed = WorkflowTemplate::deactivate_code(&mut *tx, code).await?;
        tx.commit().await?;
        if changed == 0 {
            return Err(WorkflowError::TemplateNotFound(code.to_string()));
        }
        info!(code, versions = changed, "Retired workflow template");
        Ok(changed)
    }

    /// Active auto-trigger templates for an entity type.
    pub async fn auto_trigger_templates(&self, entity_type: &str) -> Result<Vec<WorkflowTemplate>> {
        Ok(WorkflowTemplate::find_auto_trigger_for_entity_type(&self.pool, entity_type).await?)
    }
}
