use crate::domain::{
    PayloadTier, PipelineError, PipelineResult, StoredPayload, StoredPayloadRepository,
};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of the stored payload metadata port.
#[derive(Clone)]
pub struct PostgresPayloadRepository {
    client: PostgresClient,
}

impl PostgresPayloadRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StoredPayloadRepository for PostgresPayloadRepository {
    #[instrument(skip(self, payload), fields(payload_id = %payload.id, tier = payload.tier.as_str()))]
    async fn insert_payload(&self, payload: &StoredPayload) -> PipelineResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(PipelineError::Repository)?;

        let tier = payload.tier.as_str();
        conn.execute(
            "INSERT INTO stored_payloads
                 (id, tenant_id, interface_id, filename, tier, compressed,
                  inline_content, external_key, size_bytes, stored_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            &[
                &payload.id,
                &payload.tenant_id,
                &payload.interface_id,
                &payload.filename,
                &tier,
                &payload.compressed,
                &payload.inline_content,
                &payload.external_key,
                &payload.size_bytes,
                &payload.stored_at,
            ],
        )
        .await
        .context("failed to insert stored payload")
        .map_err(PipelineError::Repository)?;

        debug!("inserted stored payload");
        Ok(())
    }

    #[instrument(skip(self), fields(payload_id = %payload_id))]
    async fn get_payload(&self, payload_id: Uuid) -> PipelineResult<Option<StoredPayload>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(PipelineError::Repository)?;

        let row = conn
            .query_opt(
                "SELECT id, tenant_id, interface_id, filename, tier, compressed,
                        inline_content, external_key, size_bytes, stored_at
                 FROM stored_payloads
                 WHERE id = $1",
                &[&payload_id],
            )
            .await
            .context("failed to query stored payload")
            .map_err(PipelineError::Repository)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tier: String = row.get("tier");
        Ok(Some(StoredPayload {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            interface_id: row.get("interface_id"),
            filename: row.get("filename"),
            tier: PayloadTier::parse(&tier).ok_or_else(|| {
                PipelineError::Validation(format!("unknown payload tier '{}'", tier))
            })?,
            compressed: row.get("compressed"),
            inline_content: row.get("inline_content"),
            external_key: row.get("external_key"),
            size_bytes: row.get("size_bytes"),
            stored_at: row.get("stored_at"),
        }))
    }
}
