use crate::domain::DocumentProcessingService;
use common::{
    PayloadStore, PipelineError, PipelineResult, ResilienceCategory, ResilienceGovernor,
    StoredPayloadRepository,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Re-submits a previously stored raw payload through the pipeline, from
/// payload retrieval forward. The original stored-at instant seeds the
/// transform so a replay produces the same records as the first pass.
pub struct ReprocessingService {
    payloads: Arc<dyn StoredPayloadRepository>,
    payload_store: Arc<PayloadStore>,
    processor: Arc<DocumentProcessingService>,
    governor: Arc<ResilienceGovernor>,
}

impl ReprocessingService {
    pub fn new(
        payloads: Arc<dyn StoredPayloadRepository>,
        payload_store: Arc<PayloadStore>,
        processor: Arc<DocumentProcessingService>,
        governor: Arc<ResilienceGovernor>,
    ) -> Self {
        Self {
            payloads,
            payload_store,
            processor,
            governor,
        }
    }

    #[instrument(skip(self), fields(payload_id = %payload_id))]
    pub async fn reprocess(&self, payload_id: Uuid) -> PipelineResult<Uuid> {
        let payload = self
            .governor
            .execute(
                ResilienceCategory::Repository,
                || self.payloads.get_payload(payload_id),
                |e| async move { Err(e) },
            )
            .await?
            .ok_or_else(|| PipelineError::PayloadNotFound(payload_id.to_string()))?;

        let content = self
            .governor
            .execute(
                ResilienceCategory::FileProcessing,
                || self.payload_store.retrieve(&payload),
                |e| async move { Err(e) },
            )
            .await?;

        let header_id = self
            .processor
            .transform_and_persist(
                &payload.tenant_id,
                &payload.interface_id,
                &payload.filename,
                &content,
                payload.stored_at,
            )
            .await?;

        info!(
            payload_id = %payload_id,
            header_id = %header_id,
            tenant_id = %payload.tenant_id,
            "payload reprocessed"
        );
        Ok(header_id)
    }
}
