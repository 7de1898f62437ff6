use crate::domain::DeadLetterProducer;
use async_nats::HeaderMap;
use async_trait::async_trait;
use common::{
    JetStreamPublisher, MessageEnvelope, PipelineError, PipelineResult, QueueTopologyConfig,
    CLIENT_ID_HEADER, DELIVERY_COUNT_HEADER, ERROR_DETAIL_HEADER, ERROR_KIND_HEADER,
    FILENAME_HEADER, INTERFACE_ID_HEADER,
};
use std::sync::Arc;
use tracing::info;

/// Captures a terminally failed envelope on the bounded dead-letter stream:
/// original payload plus enough header context (tenant, interface, filename,
/// error kind and detail, delivery count) for an operator to inspect it and
/// republish onto the intake subject unchanged.
pub struct NatsDeadLetterProducer {
    publisher: Arc<dyn JetStreamPublisher>,
    topology: QueueTopologyConfig,
}

impl NatsDeadLetterProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, topology: QueueTopologyConfig) -> Self {
        Self {
            publisher,
            topology,
        }
    }
}

#[async_trait]
impl DeadLetterProducer for NatsDeadLetterProducer {
    async fn capture(
        &self,
        envelope: &MessageEnvelope,
        error: &PipelineError,
    ) -> PipelineResult<()> {
        let mut headers = HeaderMap::new();
        headers.insert(FILENAME_HEADER, envelope.filename.as_str());
        headers.insert(INTERFACE_ID_HEADER, envelope.interface_id.as_str());
        headers.insert(CLIENT_ID_HEADER, envelope.tenant_id.as_str());
        headers.insert(ERROR_KIND_HEADER, error.kind());
        headers.insert(ERROR_DETAIL_HEADER, error.to_string().as_str());
        headers.insert(
            DELIVERY_COUNT_HEADER,
            envelope.delivered_count.to_string().as_str(),
        );

        // Envelopes that failed metadata validation may have no tenant
        let tenant = if envelope.tenant_id.is_empty() {
            "unknown"
        } else {
            envelope.tenant_id.as_str()
        };
        let subject = self.topology.dead_letter_subject(tenant);

        self.publisher
            .publish(subject.clone(), headers, envelope.payload.clone())
            .await
            .map_err(|e| PipelineError::Transient(format!("dead-letter publish failed: {}", e)))?;

        info!(
            subject = %subject,
            filename = %envelope.filename,
            error_kind = error.kind(),
            "captured terminal failure to dead-letter stream"
        );
        Ok(())
    }
}
