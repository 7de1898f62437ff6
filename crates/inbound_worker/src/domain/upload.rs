use crate::domain::IntakePublisher;
use bytes::Bytes;
use common::{PayloadStore, PipelineError, PipelineResult};
use std::sync::Arc;
use tracing::{info, instrument};

const ALLOWED_CONTENT_TYPES: [&str; 2] = ["application/xml", "text/xml"];

/// Intake surface consumed by the REST upload endpoint and the protocol
/// connectors. Validates synchronously, then publishes onto the intake
/// stream so the document enters the same pipeline as queued deliveries.
pub struct UploadService {
    payload_store: Arc<PayloadStore>,
    intake: Arc<dyn IntakePublisher>,
}

impl UploadService {
    pub fn new(payload_store: Arc<PayloadStore>, intake: Arc<dyn IntakePublisher>) -> Self {
        Self {
            payload_store,
            intake,
        }
    }

    #[instrument(skip(self, payload), fields(tenant_id = %tenant_id, interface_id = %interface_id, filename = %filename, size = payload.len()))]
    pub async fn submit(
        &self,
        tenant_id: &str,
        interface_id: &str,
        filename: &str,
        content_type: Option<&str>,
        payload: Bytes,
    ) -> PipelineResult<()> {
        if let Some(content_type) = content_type {
            if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
                return Err(PipelineError::Validation(format!(
                    "unsupported content type '{}'",
                    content_type
                )));
            }
        }
        self.payload_store.validate(filename, &payload)?;

        self.intake
            .publish_intake(tenant_id, interface_id, filename, payload)
            .await?;

        info!("upload accepted onto intake stream");
        Ok(())
    }
}
