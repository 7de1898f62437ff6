use crate::domain::Priority;
use crate::nats::NatsClient;
use anyhow::Result;
use async_nats::jetstream::stream::Config as StreamConfig;
use std::time::Duration;

// Required delivery headers. Absence of any of the first three is a
// terminal validation failure at the gateway.
pub const FILENAME_HEADER: &str = "filename";
pub const INTERFACE_ID_HEADER: &str = "interface-id";
pub const CLIENT_ID_HEADER: &str = "client-id";

// Lane and dead-letter wire conventions.
pub const LANE_HEADER: &str = "lane";
pub const PRIORITY_HEADER: &str = "priority";
pub const ERROR_KIND_HEADER: &str = "error-kind";
pub const ERROR_DETAIL_HEADER: &str = "error-detail";
pub const DELIVERY_COUNT_HEADER: &str = "delivery-count";
pub const RECEIVED_AT_HEADER: &str = "received-at";

const INTAKE_SUBJECT_PREFIX: &str = "inbound.intake";
const LANE_SUBJECT_PREFIX: &str = "inbound.lane";
const DEAD_LETTER_SUBJECT_PREFIX: &str = "inbound.dlq";

/// Stream cascade configuration: intake → priority lanes → dead-letter.
/// Delayed redelivery (the retry cycle) is expressed as Nak-with-delay on
/// the consumer side, so the delay and the delivery cap live here too.
#[derive(Debug, Clone)]
pub struct QueueTopologyConfig {
    pub intake_stream: String,
    pub lane_stream: String,
    pub dead_letter_stream: String,
    /// Terminal-failure retention window.
    pub dead_letter_max_age: Duration,
    pub dead_letter_max_messages: i64,
    pub dead_letter_max_bytes: i64,
    /// Delay before a negatively acknowledged delivery comes back.
    pub redelivery_delay: Duration,
    /// Deliveries beyond this count are treated as terminal.
    pub max_deliveries: i64,
}

impl Default for QueueTopologyConfig {
    fn default() -> Self {
        Self {
            intake_stream: "INBOUND_INTAKE".to_string(),
            lane_stream: "INBOUND_LANES".to_string(),
            dead_letter_stream: "INBOUND_DLQ".to_string(),
            dead_letter_max_age: Duration::from_secs(24 * 60 * 60),
            dead_letter_max_messages: 100_000,
            dead_letter_max_bytes: 1024 * 1024 * 1024,
            redelivery_delay: Duration::from_secs(30),
            max_deliveries: 5,
        }
    }
}

impl QueueTopologyConfig {
    pub fn intake_subject(&self, tenant_id: &str) -> String {
        format!("{}.{}", INTAKE_SUBJECT_PREFIX, tenant_id)
    }

    pub fn intake_filter(&self) -> String {
        format!("{}.>", INTAKE_SUBJECT_PREFIX)
    }

    /// Lane subjects are priority-stratified; FIFO holds within a lane but
    /// not across lanes.
    pub fn lane_subject(&self, priority: Priority, tenant_id: &str) -> String {
        format!("{}.{}.{}", LANE_SUBJECT_PREFIX, priority.as_str(), tenant_id)
    }

    pub fn lane_filter(&self) -> String {
        format!("{}.>", LANE_SUBJECT_PREFIX)
    }

    pub fn dead_letter_subject(&self, tenant_id: &str) -> String {
        format!("{}.{}", DEAD_LETTER_SUBJECT_PREFIX, tenant_id)
    }
}

/// Idempotently provision the stream cascade. Existing streams are left
/// untouched so operators can tighten limits out of band.
pub async fn ensure_topology(client: &NatsClient, config: &QueueTopologyConfig) -> Result<()> {
    client
        .ensure_stream(StreamConfig {
            name: config.intake_stream.clone(),
            subjects: vec![config.intake_filter()],
            description: Some("Inbound document intake".to_string()),
            ..Default::default()
        })
        .await?;

    client
        .ensure_stream(StreamConfig {
            name: config.lane_stream.clone(),
            subjects: vec![config.lane_filter()],
            description: Some("Priority-stratified processing lanes".to_string()),
            ..Default::default()
        })
        .await?;

    client
        .ensure_stream(StreamConfig {
            name: config.dead_letter_stream.clone(),
            subjects: vec![format!("{}.>", DEAD_LETTER_SUBJECT_PREFIX)],
            description: Some("Terminal failures held for operator replay".to_string()),
            max_age: config.dead_letter_max_age,
            max_messages: config.dead_letter_max_messages,
            max_bytes: config.dead_letter_max_bytes,
            ..Default::default()
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_subjects_are_priority_stratified() {
        let config = QueueTopologyConfig::default();
        assert_eq!(
            config.lane_subject(Priority::High, "3"),
            "inbound.lane.high.3"
        );
        assert_eq!(config.lane_subject(Priority::Low, "3"), "inbound.lane.low.3");
    }

    #[test]
    fn test_filters_cover_all_tenants() {
        let config = QueueTopologyConfig::default();
        assert_eq!(config.intake_filter(), "inbound.intake.>");
        assert_eq!(config.lane_filter(), "inbound.lane.>");
    }
}
