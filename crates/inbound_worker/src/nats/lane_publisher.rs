use crate::domain::LanePublisher;
use async_nats::HeaderMap;
use async_trait::async_trait;
use common::{
    JetStreamPublisher, MessageEnvelope, PipelineError, PipelineResult, Priority,
    QueueTopologyConfig, CLIENT_ID_HEADER, DELIVERY_COUNT_HEADER, FILENAME_HEADER,
    INTERFACE_ID_HEADER, LANE_HEADER, PRIORITY_HEADER, RECEIVED_AT_HEADER,
};
use std::sync::Arc;
use tracing::debug;

/// Republishes a validated envelope onto its priority lane subject with the
/// numeric priority header, preserving the original routing metadata.
pub struct NatsLanePublisher {
    publisher: Arc<dyn JetStreamPublisher>,
    topology: QueueTopologyConfig,
}

impl NatsLanePublisher {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, topology: QueueTopologyConfig) -> Self {
        Self {
            publisher,
            topology,
        }
    }
}

#[async_trait]
impl LanePublisher for NatsLanePublisher {
    async fn publish_to_lane(
        &self,
        envelope: &MessageEnvelope,
        priority: Priority,
    ) -> PipelineResult<()> {
        let mut headers = HeaderMap::new();
        headers.insert(FILENAME_HEADER, envelope.filename.as_str());
        headers.insert(INTERFACE_ID_HEADER, envelope.interface_id.as_str());
        headers.insert(CLIENT_ID_HEADER, envelope.tenant_id.as_str());
        headers.insert(LANE_HEADER, priority.as_str());
        headers.insert(PRIORITY_HEADER, priority.numeric().to_string().as_str());
        headers.insert(
            DELIVERY_COUNT_HEADER,
            envelope.delivered_count.to_string().as_str(),
        );
        headers.insert(RECEIVED_AT_HEADER, envelope.received_at.to_rfc3339().as_str());

        let subject = self.topology.lane_subject(priority, &envelope.tenant_id);
        self.publisher
            .publish(subject.clone(), headers, envelope.payload.clone())
            .await
            .map_err(|e| PipelineError::Transient(format!("lane publish failed: {}", e)))?;

        debug!(subject = %subject, filename = %envelope.filename, "published envelope to lane");
        Ok(())
    }
}
