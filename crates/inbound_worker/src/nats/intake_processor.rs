use crate::domain::{IngestionService, RawDelivery};
use async_nats::jetstream;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{
    delivered_count, header_value, AckDecision, DeliveryProcessor, CLIENT_ID_HEADER,
    FILENAME_HEADER, INTERFACE_ID_HEADER, RECEIVED_AT_HEADER,
};
use std::sync::Arc;

/// Intake-side delivery processor: extracts the raw delivery from transport
/// headers and lets the ingestion gateway decide the acknowledgment.
///
/// Deliberately thin; the decision logic lives in IngestionService where it
/// is unit-tested against mocks. End-to-end coverage of this adapter needs
/// real NATS infrastructure.
pub struct IntakeDeliveryProcessor {
    service: Arc<IngestionService>,
}

impl IntakeDeliveryProcessor {
    pub fn new(service: Arc<IngestionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl DeliveryProcessor for IntakeDeliveryProcessor {
    async fn process(&self, message: &jetstream::Message) -> AckDecision {
        let headers = message.headers.as_ref();
        let received_at = header_value(headers, RECEIVED_AT_HEADER)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let delivery = RawDelivery {
            filename: header_value(headers, FILENAME_HEADER),
            interface_id: header_value(headers, INTERFACE_ID_HEADER),
            client_id: header_value(headers, CLIENT_ID_HEADER),
            payload: Bytes::copy_from_slice(&message.payload),
            delivered_count: delivered_count(message),
            received_at,
        };

        self.service.handle(delivery).await
    }
}
