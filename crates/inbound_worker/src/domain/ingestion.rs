use crate::domain::{DeadLetterProducer, PriorityRouter};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::validation::validate_struct;
use common::{
    AckDecision, EnvelopeMetadata, InterfaceConfigRepository, MessageEnvelope, PipelineError,
    PipelineResult, Priority, ResilienceCategory, ResilienceGovernor,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// One raw queue delivery as extracted from transport headers, before any
/// validation has happened.
#[derive(Debug, Clone)]
pub struct RawDelivery {
    pub filename: Option<String>,
    pub interface_id: Option<String>,
    pub client_id: Option<String>,
    pub payload: Bytes,
    pub delivered_count: i64,
    pub received_at: DateTime<Utc>,
}

/// The queue ingestion gateway: sole entry point from the transport layer.
///
/// Validates required metadata, classifies priority, hands the envelope to
/// the lane (a durable republish), and decides the acknowledgment. Exactly
/// one decision comes back per delivery: Ack once handoff succeeded,
/// Terminal (after dead-letter capture) for validation failures or spent
/// delivery budgets, Retry otherwise.
pub struct IngestionService {
    interfaces: Arc<dyn InterfaceConfigRepository>,
    router: PriorityRouter,
    dead_letters: Arc<dyn DeadLetterProducer>,
    governor: Arc<ResilienceGovernor>,
    max_deliveries: i64,
    redelivery_delay: Duration,
}

impl IngestionService {
    pub fn new(
        interfaces: Arc<dyn InterfaceConfigRepository>,
        router: PriorityRouter,
        dead_letters: Arc<dyn DeadLetterProducer>,
        governor: Arc<ResilienceGovernor>,
        max_deliveries: i64,
        redelivery_delay: Duration,
    ) -> Self {
        Self {
            interfaces,
            router,
            dead_letters,
            governor,
            max_deliveries,
            redelivery_delay,
        }
    }

    pub async fn handle(&self, delivery: RawDelivery) -> AckDecision {
        let started = Instant::now();
        let envelope = MessageEnvelope {
            payload: delivery.payload,
            filename: delivery.filename.unwrap_or_default(),
            tenant_id: delivery.client_id.unwrap_or_default(),
            interface_id: delivery.interface_id.unwrap_or_default(),
            lane: None,
            delivered_count: delivery.delivered_count,
            received_at: delivery.received_at,
        };

        match self.ingest(&envelope).await {
            Ok(priority) => {
                info!(
                    outcome = "accepted",
                    duration_ms = started.elapsed().as_millis() as u64,
                    tenant_id = %envelope.tenant_id,
                    interface_id = %envelope.interface_id,
                    filename = %envelope.filename,
                    lane = priority.as_str(),
                    "envelope handed off"
                );
                AckDecision::Ack
            }
            Err(error) => self.decide_failure(&envelope, error, started).await,
        }
    }

    async fn ingest(&self, envelope: &MessageEnvelope) -> PipelineResult<Priority> {
        let metadata = EnvelopeMetadata {
            filename: envelope.filename.clone(),
            interface_id: envelope.interface_id.clone(),
            client_id: envelope.tenant_id.clone(),
        };
        validate_struct(&metadata)?;

        if envelope.payload.is_empty() {
            return Err(PipelineError::Validation(
                "missing file content".to_string(),
            ));
        }

        let interface = self
            .governor
            .execute(
                ResilienceCategory::Repository,
                || self.interfaces.get_interface(&envelope.interface_id),
                |e| async move { Err(e) },
            )
            .await?
            .ok_or_else(|| PipelineError::InterfaceNotFound(envelope.interface_id.clone()))?;

        if !interface.active {
            return Err(PipelineError::InterfaceInactive(
                envelope.interface_id.clone(),
            ));
        }
        if interface.tenant_id != envelope.tenant_id {
            return Err(PipelineError::Validation(format!(
                "interface {} does not belong to client {}",
                envelope.interface_id, envelope.tenant_id
            )));
        }

        let priority = PriorityRouter::classify(&interface);
        self.router.route(envelope, priority).await?;
        Ok(priority)
    }

    /// Failure path: validation-class errors and exhausted delivery budgets
    /// are terminal (captured, then Term); everything else requeues. A
    /// failed dead-letter capture downgrades to requeue so the delivery is
    /// never lost without a captured record.
    async fn decide_failure(
        &self,
        envelope: &MessageEnvelope,
        error: PipelineError,
        started: Instant,
    ) -> AckDecision {
        let budget_spent = envelope.delivered_count >= self.max_deliveries;
        let terminal =
            error.is_validation() || matches!(error, PipelineError::Terminal(_)) || budget_spent;

        if !terminal {
            warn!(
                outcome = "requeued",
                duration_ms = started.elapsed().as_millis() as u64,
                tenant_id = %envelope.tenant_id,
                interface_id = %envelope.interface_id,
                filename = %envelope.filename,
                delivered_count = envelope.delivered_count,
                error = %error,
                "ingestion failed, requeueing"
            );
            return AckDecision::Retry {
                delay: Some(self.redelivery_delay),
                reason: Some(error.to_string()),
            };
        }

        warn!(
            outcome = "terminal",
            duration_ms = started.elapsed().as_millis() as u64,
            tenant_id = %envelope.tenant_id,
            interface_id = %envelope.interface_id,
            filename = %envelope.filename,
            delivered_count = envelope.delivered_count,
            error_kind = error.kind(),
            error = %error,
            "ingestion failed terminally"
        );
        match self.dead_letters.capture(envelope, &error).await {
            Ok(()) => AckDecision::Terminal {
                reason: Some(error.to_string()),
            },
            Err(capture_error) => {
                error!(
                    error = %capture_error,
                    "dead-letter capture failed, requeueing delivery instead"
                );
                AckDecision::Retry {
                    delay: Some(self.redelivery_delay),
                    reason: Some(error.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockDeadLetterProducer, MockLanePublisher};
    use common::{
        CircuitBreakerConfig, DocumentType, InterfaceConfig, MockInterfaceConfigRepository,
        RetryPolicy,
    };

    fn governor() -> Arc<ResilienceGovernor> {
        Arc::new(ResilienceGovernor::new(
            CircuitBreakerConfig::default(),
            RetryPolicy {
                initial_interval: Duration::from_millis(1),
                multiplier: 1.0,
                max_interval: Duration::from_millis(1),
                max_attempts: 1,
            },
            Vec::new(),
        ))
    }

    fn interface() -> InterfaceConfig {
        InterfaceConfig {
            interface_id: "7".to_string(),
            tenant_id: "3".to_string(),
            document_type: DocumentType::Order,
            line_path: "Lines/Line".to_string(),
            requires_line: true,
            high_priority: true,
            bulk: false,
            active: true,
        }
    }

    fn delivery(payload: &'static [u8]) -> RawDelivery {
        RawDelivery {
            filename: Some("order1.xml".to_string()),
            interface_id: Some("7".to_string()),
            client_id: Some("3".to_string()),
            payload: Bytes::from_static(payload),
            delivered_count: 1,
            received_at: Utc::now(),
        }
    }

    fn service(
        interfaces: MockInterfaceConfigRepository,
        lanes: MockLanePublisher,
        dead_letters: MockDeadLetterProducer,
    ) -> IngestionService {
        IngestionService::new(
            Arc::new(interfaces),
            PriorityRouter::new(Arc::new(lanes)),
            Arc::new(dead_letters),
            governor(),
            5,
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_valid_delivery_is_routed_and_acked() {
        let mut interfaces = MockInterfaceConfigRepository::new();
        interfaces
            .expect_get_interface()
            .withf(|id: &str| id == "7")
            .times(1)
            .returning(|_| Ok(Some(interface())));

        let mut lanes = MockLanePublisher::new();
        lanes
            .expect_publish_to_lane()
            .withf(|envelope: &MessageEnvelope, priority: &Priority| {
                envelope.tenant_id == "3" && *priority == Priority::High
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let decision = service(interfaces, lanes, MockDeadLetterProducer::new())
            .handle(delivery(b"<Order/>"))
            .await;

        assert_eq!(decision, AckDecision::Ack);
    }

    #[tokio::test]
    async fn test_empty_body_is_terminal_with_capture() {
        let mut dead_letters = MockDeadLetterProducer::new();
        dead_letters
            .expect_capture()
            .withf(|envelope: &MessageEnvelope, error: &PipelineError| {
                envelope.filename == "order1.xml"
                    && matches!(error, PipelineError::Validation(msg) if msg == "missing file content")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let decision = service(
            MockInterfaceConfigRepository::new(),
            MockLanePublisher::new(),
            dead_letters,
        )
        .handle(delivery(b""))
        .await;

        assert!(matches!(decision, AckDecision::Terminal { .. }));
    }

    #[tokio::test]
    async fn test_missing_required_header_is_terminal() {
        let mut dead_letters = MockDeadLetterProducer::new();
        dead_letters
            .expect_capture()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut incomplete = delivery(b"<Order/>");
        incomplete.interface_id = None;

        let decision = service(
            MockInterfaceConfigRepository::new(),
            MockLanePublisher::new(),
            dead_letters,
        )
        .handle(incomplete)
        .await;

        assert!(matches!(decision, AckDecision::Terminal { .. }));
    }

    #[tokio::test]
    async fn test_unknown_interface_is_terminal() {
        let mut interfaces = MockInterfaceConfigRepository::new();
        interfaces
            .expect_get_interface()
            .times(1)
            .returning(|_| Ok(None));

        let mut dead_letters = MockDeadLetterProducer::new();
        dead_letters
            .expect_capture()
            .withf(|_, error: &PipelineError| {
                matches!(error, PipelineError::InterfaceNotFound(id) if id == "7")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let decision = service(interfaces, MockLanePublisher::new(), dead_letters)
            .handle(delivery(b"<Order/>"))
            .await;

        assert!(matches!(decision, AckDecision::Terminal { .. }));
    }

    #[tokio::test]
    async fn test_transient_route_failure_requeues_within_delivery_budget() {
        let mut interfaces = MockInterfaceConfigRepository::new();
        interfaces
            .expect_get_interface()
            .times(1)
            .returning(|_| Ok(Some(interface())));

        let mut lanes = MockLanePublisher::new();
        lanes
            .expect_publish_to_lane()
            .times(1)
            .returning(|_, _| Err(PipelineError::Transient("lane publish failed".to_string())));

        let decision = service(interfaces, lanes, MockDeadLetterProducer::new())
            .handle(delivery(b"<Order/>"))
            .await;

        assert!(matches!(decision, AckDecision::Retry { .. }));
    }

    #[tokio::test]
    async fn test_repository_retry_exhaustion_is_terminal() {
        // The governor's retry budget is 1 attempt here, so a transient
        // repository error surfaces as a terminal failure with capture
        let mut interfaces = MockInterfaceConfigRepository::new();
        interfaces
            .expect_get_interface()
            .times(1)
            .returning(|_| Err(PipelineError::Transient("db down".to_string())));

        let mut dead_letters = MockDeadLetterProducer::new();
        dead_letters
            .expect_capture()
            .withf(|_, error: &PipelineError| matches!(error, PipelineError::Terminal(_)))
            .times(1)
            .returning(|_, _| Ok(()));

        let decision = service(interfaces, MockLanePublisher::new(), dead_letters)
            .handle(delivery(b"<Order/>"))
            .await;

        assert!(matches!(decision, AckDecision::Terminal { .. }));
    }

    #[tokio::test]
    async fn test_exhausted_delivery_budget_turns_terminal() {
        let mut interfaces = MockInterfaceConfigRepository::new();
        interfaces
            .expect_get_interface()
            .times(1)
            .returning(|_| Ok(Some(interface())));

        let mut lanes = MockLanePublisher::new();
        lanes
            .expect_publish_to_lane()
            .times(1)
            .returning(|_, _| Err(PipelineError::Transient("lane publish failed".to_string())));

        let mut dead_letters = MockDeadLetterProducer::new();
        dead_letters
            .expect_capture()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut spent = delivery(b"<Order/>");
        spent.delivered_count = 5;

        let decision = service(interfaces, lanes, dead_letters).handle(spent).await;

        assert!(matches!(decision, AckDecision::Terminal { .. }));
    }

    #[tokio::test]
    async fn test_failed_capture_downgrades_to_requeue() {
        let mut dead_letters = MockDeadLetterProducer::new();
        dead_letters
            .expect_capture()
            .times(1)
            .returning(|_, _| Err(PipelineError::Transient("dlq publish failed".to_string())));

        let decision = service(
            MockInterfaceConfigRepository::new(),
            MockLanePublisher::new(),
            dead_letters,
        )
        .handle(delivery(b""))
        .await;

        assert!(matches!(decision, AckDecision::Retry { .. }));
    }
}
