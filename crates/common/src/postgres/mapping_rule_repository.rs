use crate::domain::{
    MappingRule, MappingRuleRepository, PipelineError, PipelineResult, RuleDataType, RuleLevel,
    RuleTransformation,
};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{debug, instrument};

/// PostgreSQL implementation of the read-only mapping rule catalog port.
#[derive(Clone)]
pub struct PostgresMappingRuleRepository {
    client: PostgresClient,
}

impl PostgresMappingRuleRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

fn rule_from_row(row: &Row) -> PipelineResult<MappingRule> {
    let level: String = row.get("target_level");
    let data_type: String = row.get("data_type");
    let transformation: Option<String> = row.get("transformation");

    Ok(MappingRule {
        interface_id: row.get("interface_id"),
        source_path: row.get("source_path"),
        target_field: row.get("target_field"),
        level: RuleLevel::parse(&level)
            .ok_or_else(|| PipelineError::Validation(format!("unknown rule level '{}'", level)))?,
        data_type: RuleDataType::parse(&data_type).ok_or_else(|| {
            PipelineError::Validation(format!("unknown rule data type '{}'", data_type))
        })?,
        required: row.get("required"),
        default_value: row.get("default_value"),
        transformation: match transformation {
            Some(name) => Some(RuleTransformation::parse(&name).ok_or_else(|| {
                PipelineError::Validation(format!("unknown rule transformation '{}'", name))
            })?),
            None => None,
        },
        priority: row.get("priority"),
        active: row.get("active"),
    })
}

#[async_trait]
impl MappingRuleRepository for PostgresMappingRuleRepository {
    #[instrument(skip(self), fields(interface_id = %interface_id))]
    async fn list_active_rules(&self, interface_id: &str) -> PipelineResult<Vec<MappingRule>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(PipelineError::Repository)?;

        let rows = conn
            .query(
                "SELECT interface_id, source_path, target_field, target_level, data_type,
                        required, default_value, transformation, priority, active
                 FROM mapping_rules
                 WHERE interface_id = $1 AND active = TRUE
                 ORDER BY priority ASC",
                &[&interface_id],
            )
            .await
            .context("failed to query mapping rules")
            .map_err(PipelineError::Repository)?;

        let rules = rows
            .iter()
            .map(rule_from_row)
            .collect::<PipelineResult<Vec<_>>>()?;

        debug!(rule_count = rules.len(), "loaded active mapping rules");
        Ok(rules)
    }
}
