use crate::nats::{JetStreamConsumer, PullConsumer};
use anyhow::Result;
use async_nats::jetstream::{self, AckKind};
use async_nats::HeaderMap;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Acknowledgment decision for one delivery. Exactly one decision is made
/// per delivery; the consumer loop translates it into the JetStream
/// acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum AckDecision {
    /// Processing handed off or completed; remove the delivery.
    Ack,
    /// Transient problem; redeliver after the delay (None = server default).
    Retry {
        delay: Option<Duration>,
        reason: Option<String>,
    },
    /// Terminal; never redeliver. Capture to the dead-letter stream happens
    /// before this decision is returned.
    Terminal { reason: Option<String> },
}

/// Processes one delivery and decides its acknowledgment.
///
/// Implementations are thin adapters over domain services: they extract
/// metadata and payload, call the service, and map the outcome. The domain
/// services carry the logic and the unit tests; processors are covered by
/// integration tests against real NATS infrastructure.
#[async_trait]
pub trait DeliveryProcessor: Send + Sync {
    async fn process(&self, message: &jetstream::Message) -> AckDecision;
}

/// A pull consumer loop that drives explicit acknowledgment from the
/// processor's decision. Messages are fetched in batches and processed one
/// at a time.
pub struct DeliveryConsumer<P> {
    consumer: Box<dyn PullConsumer>,
    stream_name: String,
    consumer_name: String,
    batch_size: usize,
    max_wait: Duration,
    processor: P,
}

impl<P> DeliveryConsumer<P>
where
    P: DeliveryProcessor,
{
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        ack_wait_secs: u64,
        processor: P,
    ) -> Result<Self> {
        debug!(
            stream = %stream_name,
            consumer = %consumer_name,
            filter_subject = %subject_filter,
            "creating delivery consumer"
        );

        let config = jetstream::consumer::pull::Config {
            name: Some(consumer_name.to_string()),
            durable_name: Some(consumer_name.to_string()),
            filter_subject: subject_filter.to_string(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ack_wait: Duration::from_secs(ack_wait_secs),
            ..Default::default()
        };

        let consumer = jetstream.create_consumer(config, stream_name).await?;

        Ok(Self {
            consumer,
            stream_name: stream_name.to_string(),
            consumer_name: consumer_name.to_string(),
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    /// Run the consumer loop until cancellation.
    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        debug!(
            stream = %self.stream_name,
            consumer = %self.consumer_name,
            "starting delivery consumer"
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(
                        stream = %self.stream_name,
                        consumer = %self.consumer_name,
                        "received shutdown signal, stopping consumer"
                    );
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(
                            stream = %self.stream_name,
                            consumer = %self.consumer_name,
                            error = %e,
                            "error processing batch"
                        );
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        debug!(
            stream = %self.stream_name,
            consumer = %self.consumer_name,
            "consumer stopped gracefully"
        );
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let messages = self
            .consumer
            .fetch_messages(self.batch_size, self.max_wait)
            .await?;

        if messages.is_empty() {
            return Ok(());
        }

        debug!(message_count = messages.len(), "received message batch");

        for message in &messages {
            let decision = self.processor.process(message).await;
            apply_ack_decision(message, decision).await;
        }

        Ok(())
    }
}

/// Translate an AckDecision into the JetStream acknowledgment, exactly once.
pub async fn apply_ack_decision(message: &jetstream::Message, decision: AckDecision) {
    match decision {
        AckDecision::Ack => {
            if let Err(e) = message.ack().await {
                error!(subject = %message.subject, error = %e, "failed to acknowledge message");
            }
        }
        AckDecision::Retry { delay, reason } => {
            if let Some(reason) = reason {
                warn!(subject = %message.subject, reason = %reason, "requeueing message");
            }
            if let Err(e) = message.ack_with(AckKind::Nak(delay)).await {
                error!(subject = %message.subject, error = %e, "failed to requeue message");
            }
        }
        AckDecision::Terminal { reason } => {
            if let Some(reason) = reason {
                warn!(subject = %message.subject, reason = %reason, "terminating message");
            }
            if let Err(e) = message.ack_with(AckKind::Term).await {
                error!(subject = %message.subject, error = %e, "failed to terminate message");
            }
        }
    }
}

/// Header lookup tolerating absent header maps.
pub fn header_value(headers: Option<&HeaderMap>, name: &str) -> Option<String> {
    headers
        .and_then(|map| map.get(name))
        .map(|value| value.as_str().to_string())
}

/// JetStream delivery count for a message; first delivery when unknown.
pub fn delivered_count(message: &jetstream::Message) -> i64 {
    message.info().map(|info| info.delivered).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::{MockJetStreamConsumer, MockPullConsumer};

    struct AckAllProcessor;

    #[async_trait]
    impl DeliveryProcessor for AckAllProcessor {
        async fn process(&self, _message: &jetstream::Message) -> AckDecision {
            AckDecision::Ack
        }
    }

    #[tokio::test]
    async fn test_consumer_creation_success() {
        let mut mock_jetstream = MockJetStreamConsumer::new();

        mock_jetstream
            .expect_create_consumer()
            .withf(
                |config: &jetstream::consumer::pull::Config, stream_name: &str| {
                    config.durable_name.as_deref() == Some("intake-consumer")
                        && stream_name == "INBOUND_INTAKE"
                },
            )
            .times(1)
            .returning(|_, _| Ok(Box::new(MockPullConsumer::new())));

        let result = DeliveryConsumer::new(
            Arc::new(mock_jetstream),
            "INBOUND_INTAKE",
            "intake-consumer",
            "inbound.intake.>",
            10,
            5,
            60,
            AckAllProcessor,
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_consumer_creation_failure() {
        let mut mock_jetstream = MockJetStreamConsumer::new();

        mock_jetstream
            .expect_create_consumer()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("failed to create consumer")));

        let result = DeliveryConsumer::new(
            Arc::new(mock_jetstream),
            "INBOUND_INTAKE",
            "intake-consumer",
            "inbound.intake.>",
            10,
            5,
            60,
            AckAllProcessor,
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let mut mock_jetstream = MockJetStreamConsumer::new();

        mock_jetstream
            .expect_create_consumer()
            .times(1)
            .returning(|_, _| {
                let mut mock = MockPullConsumer::new();
                mock.expect_fetch_messages()
                    .times(1)
                    .returning(|_, _| Ok(vec![]));
                Ok(Box::new(mock))
            });

        let consumer = DeliveryConsumer::new(
            Arc::new(mock_jetstream),
            "INBOUND_INTAKE",
            "intake-consumer",
            "inbound.intake.>",
            10,
            5,
            60,
            AckAllProcessor,
        )
        .await
        .unwrap();

        assert!(consumer.fetch_and_process_batch().await.is_ok());
    }
}
