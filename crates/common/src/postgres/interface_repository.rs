use crate::domain::{
    DocumentType, InterfaceConfig, InterfaceConfigRepository, PipelineError, PipelineResult,
};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use tracing::instrument;

/// PostgreSQL implementation of the read-only interface configuration port.
#[derive(Clone)]
pub struct PostgresInterfaceRepository {
    client: PostgresClient,
}

impl PostgresInterfaceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InterfaceConfigRepository for PostgresInterfaceRepository {
    #[instrument(skip(self), fields(interface_id = %interface_id))]
    async fn get_interface(&self, interface_id: &str) -> PipelineResult<Option<InterfaceConfig>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(PipelineError::Repository)?;

        let row = conn
            .query_opt(
                "SELECT interface_id, tenant_id, document_type, line_path, requires_line,
                        high_priority, bulk, active
                 FROM interfaces
                 WHERE interface_id = $1",
                &[&interface_id],
            )
            .await
            .context("failed to query interface")
            .map_err(PipelineError::Repository)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document_type: String = row.get("document_type");
        Ok(Some(InterfaceConfig {
            interface_id: row.get("interface_id"),
            tenant_id: row.get("tenant_id"),
            document_type: DocumentType::parse(&document_type).ok_or_else(|| {
                PipelineError::Validation(format!("unknown document type '{}'", document_type))
            })?,
            line_path: row.get("line_path"),
            requires_line: row.get("requires_line"),
            high_priority: row.get("high_priority"),
            bulk: row.get("bulk"),
            active: row.get("active"),
        }))
    }
}
