use crate::domain::{AckHandle, BatchAccumulator, DeadLetterProducer, DocumentProcessingService};
use common::{MessageEnvelope, PipelineError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// An accumulated envelope plus the deferred acknowledgment for its queue
/// delivery. The delivery stays unacknowledged until processing resolves.
pub struct PendingDocument {
    pub envelope: MessageEnvelope,
    pub ack: Box<dyn AckHandle>,
}

#[derive(Debug, Clone)]
pub struct FlushConfig {
    pub flush_interval: Duration,
    /// At most this many envelopes are handed to the mapping engine per
    /// cycle; the rest stay queued for the next tick.
    pub batch_size: usize,
    pub redelivery_delay: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            batch_size: 100,
            redelivery_delay: Duration::from_secs(30),
        }
    }
}

/// The scheduled flush: drains the accumulator on a fixed period and drives
/// each envelope through processing, resolving its deferred acknowledgment
/// from the outcome.
pub struct FlushService {
    accumulator: Arc<BatchAccumulator<PendingDocument>>,
    processor: Arc<DocumentProcessingService>,
    dead_letters: Arc<dyn DeadLetterProducer>,
    config: FlushConfig,
}

impl FlushService {
    pub fn new(
        accumulator: Arc<BatchAccumulator<PendingDocument>>,
        processor: Arc<DocumentProcessingService>,
        dead_letters: Arc<dyn DeadLetterProducer>,
        config: FlushConfig,
    ) -> Self {
        Self {
            accumulator,
            processor,
            dead_letters,
            config,
        }
    }

    /// Run the fixed-period flush loop until cancellation, then perform one
    /// final drain so shutdown does not strand accumulated envelopes.
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.config.flush_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("received shutdown signal, draining accumulator");
                    self.flush_once().await;
                    break;
                }
                _ = interval.tick() => {
                    self.flush_once().await;
                }
            }
        }

        debug!("flush loop stopped");
        Ok(())
    }

    pub async fn flush_once(&self) {
        let batch = self.accumulator.drain(self.config.batch_size).await;
        if batch.is_empty() {
            return;
        }

        debug!(batch_size = batch.len(), "flushing accumulated envelopes");
        for pending in batch {
            self.resolve(pending).await;
        }
    }

    async fn resolve(&self, pending: PendingDocument) {
        let envelope = &pending.envelope;
        let started = Instant::now();

        match self.processor.process_envelope(envelope).await {
            Ok(header_id) => {
                info!(
                    outcome = "processed",
                    duration_ms = started.elapsed().as_millis() as u64,
                    tenant_id = %envelope.tenant_id,
                    interface_id = %envelope.interface_id,
                    filename = %envelope.filename,
                    header_id = %header_id,
                    "envelope processed"
                );
                pending.ack.ack().await;
            }
            Err(error) => {
                let terminal =
                    error.is_validation() || matches!(error, PipelineError::Terminal(_));
                if !terminal {
                    warn!(
                        outcome = "requeued",
                        duration_ms = started.elapsed().as_millis() as u64,
                        tenant_id = %envelope.tenant_id,
                        interface_id = %envelope.interface_id,
                        filename = %envelope.filename,
                        error = %error,
                        "processing failed, requeueing"
                    );
                    pending
                        .ack
                        .retry(Some(self.config.redelivery_delay))
                        .await;
                    return;
                }

                warn!(
                    outcome = "terminal",
                    duration_ms = started.elapsed().as_millis() as u64,
                    tenant_id = %envelope.tenant_id,
                    interface_id = %envelope.interface_id,
                    filename = %envelope.filename,
                    error_kind = error.kind(),
                    error = %error,
                    "processing failed terminally"
                );
                match self.dead_letters.capture(envelope, &error).await {
                    Ok(()) => pending.ack.terminate().await,
                    Err(capture_error) => {
                        error!(
                            error = %capture_error,
                            "dead-letter capture failed, requeueing delivery instead"
                        );
                        pending
                            .ack
                            .retry(Some(self.config.redelivery_delay))
                            .await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockAckHandle, MockDeadLetterProducer};
    use bytes::Bytes;
    use chrono::Utc;
    use common::{
        CircuitBreakerConfig, MockDocumentRepository, MockInterfaceConfigRepository,
        MockMappingRuleRepository, MockPayloadObjectStore, MockStoredPayloadRepository,
        PayloadStore, PayloadStoreConfig, ResilienceGovernor, RetryPolicy,
    };

    fn envelope(filename: &str) -> MessageEnvelope {
        MessageEnvelope {
            payload: Bytes::from_static(b"<Order><Lines><Line/></Lines></Order>"),
            filename: filename.to_string(),
            tenant_id: "3".to_string(),
            interface_id: "7".to_string(),
            lane: Some(common::Priority::Normal),
            delivered_count: 1,
            received_at: Utc::now(),
        }
    }

    fn governor() -> Arc<ResilienceGovernor> {
        Arc::new(ResilienceGovernor::new(
            CircuitBreakerConfig {
                failure_rate_threshold: 50.0,
                minimum_calls: 1,
                sliding_window_size: 4,
                open_wait: Duration::from_secs(60),
                ..CircuitBreakerConfig::default()
            },
            RetryPolicy {
                initial_interval: Duration::from_millis(1),
                multiplier: 1.0,
                max_interval: Duration::from_millis(1),
                max_attempts: 1,
            },
            Vec::new(),
        ))
    }

    fn processing_service(
        interfaces: MockInterfaceConfigRepository,
        payloads: MockStoredPayloadRepository,
        documents: MockDocumentRepository,
        rules: MockMappingRuleRepository,
        governor: Arc<ResilienceGovernor>,
    ) -> Arc<DocumentProcessingService> {
        Arc::new(DocumentProcessingService::new(
            Arc::new(interfaces),
            Arc::new(rules),
            Arc::new(documents),
            Arc::new(payloads),
            Arc::new(PayloadStore::new(
                PayloadStoreConfig::default(),
                Arc::new(MockPayloadObjectStore::new()),
            )),
            governor,
        ))
    }

    async fn flush_one(
        service: Arc<DocumentProcessingService>,
        dead_letters: MockDeadLetterProducer,
        ack: MockAckHandle,
    ) {
        let accumulator = Arc::new(BatchAccumulator::new(10));
        let _ = accumulator
            .offer(PendingDocument {
                envelope: envelope("order1.xml"),
                ack: Box::new(ack),
            })
            .await;

        let flush = FlushService::new(
            accumulator,
            service,
            Arc::new(dead_letters),
            FlushConfig::default(),
        );
        flush.flush_once().await;
    }

    #[tokio::test]
    async fn test_successful_processing_acks_the_delivery() {
        let mut interfaces = MockInterfaceConfigRepository::new();
        interfaces.expect_get_interface().times(1).returning(|_| {
            Ok(Some(common::InterfaceConfig {
                interface_id: "7".to_string(),
                tenant_id: "3".to_string(),
                document_type: common::DocumentType::Order,
                line_path: "Lines/Line".to_string(),
                requires_line: true,
                high_priority: false,
                bulk: false,
                active: true,
            }))
        });

        let mut rules = MockMappingRuleRepository::new();
        rules
            .expect_list_active_rules()
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let mut documents = MockDocumentRepository::new();
        documents
            .expect_store_document()
            .times(1)
            .returning(|_, _| Ok(uuid::Uuid::new_v4()));

        let mut payloads = MockStoredPayloadRepository::new();
        payloads
            .expect_insert_payload()
            .times(1)
            .returning(|_| Ok(()));

        let mut ack = MockAckHandle::new();
        ack.expect_ack().times(1).returning(|| ());

        flush_one(
            processing_service(interfaces, payloads, documents, rules, governor()),
            MockDeadLetterProducer::new(),
            ack,
        )
        .await;
    }

    #[tokio::test]
    async fn test_validation_failure_captures_and_terminates() {
        // Unknown interface: processing fails with a validation-class error
        let mut interfaces = MockInterfaceConfigRepository::new();
        interfaces
            .expect_get_interface()
            .times(1)
            .returning(|_| Ok(None));

        let mut payloads = MockStoredPayloadRepository::new();
        payloads
            .expect_insert_payload()
            .times(1)
            .returning(|_| Ok(()));

        let mut dead_letters = MockDeadLetterProducer::new();
        dead_letters
            .expect_capture()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut ack = MockAckHandle::new();
        ack.expect_terminate().times(1).returning(|| ());

        flush_one(
            processing_service(
                interfaces,
                payloads,
                MockDocumentRepository::new(),
                MockMappingRuleRepository::new(),
                governor(),
            ),
            dead_letters,
            ack,
        )
        .await;
    }

    #[tokio::test]
    async fn test_open_circuit_requeues_without_capture() {
        // Trip the repository breaker first; the flush then short-circuits
        // and the delivery comes back later instead of dead-lettering
        let governor = governor();
        let _: common::PipelineResult<()> = governor
            .execute(
                common::ResilienceCategory::Repository,
                || async { Err(PipelineError::Transient("db down".to_string())) },
                |e| async move { Err(e) },
            )
            .await;

        let mut ack = MockAckHandle::new();
        ack.expect_retry().times(1).returning(|_| ());

        flush_one(
            processing_service(
                MockInterfaceConfigRepository::new(),
                MockStoredPayloadRepository::new(),
                MockDocumentRepository::new(),
                MockMappingRuleRepository::new(),
                governor,
            ),
            MockDeadLetterProducer::new(),
            ack,
        )
        .await;
    }
}
