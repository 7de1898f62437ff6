use crate::domain::{DocumentRepository, HeaderRecord, LineRecord, PipelineError, PipelineResult};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of DocumentRepository. Header and lines are
/// written in one transaction so a redelivered document never leaves a
/// half-persisted record behind.
#[derive(Clone)]
pub struct PostgresDocumentRepository {
    client: PostgresClient,
}

impl PostgresDocumentRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    #[instrument(skip(self, header, lines), fields(tenant_id = %header.tenant_id, document_type = header.document_type.as_str(), line_count = lines.len()))]
    async fn store_document(
        &self,
        header: &HeaderRecord,
        lines: &[LineRecord],
    ) -> PipelineResult<Uuid> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(PipelineError::Repository)?;

        let tx = conn
            .transaction()
            .await
            .context("failed to begin transaction")
            .map_err(PipelineError::Repository)?;

        let header_id = Uuid::new_v4();
        let document_type = header.document_type.as_str();
        let header_fields = serde_json::to_value(&header.fields)
            .context("failed to serialize header fields")
            .map_err(PipelineError::Repository)?;

        tx.execute(
            "INSERT INTO inbound_headers (id, tenant_id, document_type, fields)
             VALUES ($1, $2, $3, $4)",
            &[&header_id, &header.tenant_id, &document_type, &header_fields],
        )
        .await
        .context("failed to insert header")
        .map_err(PipelineError::Repository)?;

        for line in lines {
            let line_id = Uuid::new_v4();
            let sequence = line.sequence as i32;
            let line_fields = serde_json::to_value(&line.fields)
                .context("failed to serialize line fields")
                .map_err(PipelineError::Repository)?;

            tx.execute(
                "INSERT INTO inbound_lines (id, header_id, tenant_id, sequence, fields)
                 VALUES ($1, $2, $3, $4, $5)",
                &[&line_id, &header_id, &line.tenant_id, &sequence, &line_fields],
            )
            .await
            .context("failed to insert line")
            .map_err(PipelineError::Repository)?;
        }

        tx.commit()
            .await
            .context("failed to commit document")
            .map_err(PipelineError::Repository)?;

        debug!(header_id = %header_id, "stored document");
        Ok(header_id)
    }
}
