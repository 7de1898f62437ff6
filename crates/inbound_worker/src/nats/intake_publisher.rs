use crate::domain::IntakePublisher;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use common::{
    JetStreamPublisher, PipelineError, PipelineResult, QueueTopologyConfig, CLIENT_ID_HEADER,
    FILENAME_HEADER, INTERFACE_ID_HEADER, RECEIVED_AT_HEADER,
};
use std::sync::Arc;
use tracing::debug;

/// Publishes an uploaded or replayed document onto the intake stream with
/// the delivery headers the gateway requires.
pub struct NatsIntakePublisher {
    publisher: Arc<dyn JetStreamPublisher>,
    topology: QueueTopologyConfig,
}

impl NatsIntakePublisher {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, topology: QueueTopologyConfig) -> Self {
        Self {
            publisher,
            topology,
        }
    }
}

#[async_trait]
impl IntakePublisher for NatsIntakePublisher {
    async fn publish_intake(
        &self,
        tenant_id: &str,
        interface_id: &str,
        filename: &str,
        payload: Bytes,
    ) -> PipelineResult<()> {
        let mut headers = HeaderMap::new();
        headers.insert(FILENAME_HEADER, filename);
        headers.insert(INTERFACE_ID_HEADER, interface_id);
        headers.insert(CLIENT_ID_HEADER, tenant_id);
        headers.insert(RECEIVED_AT_HEADER, Utc::now().to_rfc3339().as_str());

        let subject = self.topology.intake_subject(tenant_id);
        self.publisher
            .publish(subject.clone(), headers, payload)
            .await
            .map_err(|e| PipelineError::Transient(format!("intake publish failed: {}", e)))?;

        debug!(subject = %subject, filename = %filename, "published document to intake");
        Ok(())
    }
}
