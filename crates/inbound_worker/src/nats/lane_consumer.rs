use crate::domain::{AckHandle, BatchAccumulator, DeadLetterProducer, PendingDocument};
use crate::nats::JetStreamAckHandle;
use anyhow::Result;
use async_nats::jetstream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{
    delivered_count, header_value, JetStreamConsumer, MessageEnvelope, PipelineError, Priority,
    PullConsumer, CLIENT_ID_HEADER, FILENAME_HEADER, INTERFACE_ID_HEADER, LANE_HEADER,
    RECEIVED_AT_HEADER,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lane-side consumer feeding the batch accumulator.
///
/// Unlike the intake consumer it defers acknowledgment: each delivery's ack
/// handle travels with the envelope into the accumulator and is resolved by
/// the scheduled flush. A crash between accumulation and processing leaves
/// the delivery unacknowledged, so the queue redelivers it after ack-wait;
/// the accumulator itself is deliberately non-durable.
pub struct AccumulatingConsumer {
    consumer: Box<dyn PullConsumer>,
    stream_name: String,
    consumer_name: String,
    batch_size: usize,
    max_wait: Duration,
    accumulator: Arc<BatchAccumulator<PendingDocument>>,
    dead_letters: Arc<dyn DeadLetterProducer>,
    /// Redelivery delay applied when the accumulator rejects an offer.
    backpressure_delay: Duration,
}

impl AccumulatingConsumer {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        ack_wait_secs: u64,
        accumulator: Arc<BatchAccumulator<PendingDocument>>,
        dead_letters: Arc<dyn DeadLetterProducer>,
        backpressure_delay: Duration,
    ) -> Result<Self> {
        debug!(
            stream = %stream_name,
            consumer = %consumer_name,
            filter_subject = %subject_filter,
            "creating accumulating consumer"
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
            accumulator,
            dead_letters,
            backpressure_delay,
        })
    }

    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        debug!(
            stream = %self.stream_name,
            consumer = %self.consumer_name,
            "starting accumulating consumer"
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
                result = self.fetch_and_accumulate() => {
                    if let Err(e) = result {
                        error!(
                            stream = %self.stream_name,
                            consumer = %self.consumer_name,
                            error = %e,
                            "error accumulating batch"
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

    async fn fetch_and_accumulate(&self) -> Result<()> {
        let messages = self
            .consumer
            .fetch_messages(self.batch_size, self.max_wait)
            .await?;

        if messages.is_empty() {
            return Ok(());
        }

        debug!(message_count = messages.len(), "received lane batch");

        for message in messages {
            let envelope = match envelope_from_lane_message(&message) {
                Ok(envelope) => envelope,
                Err(error) => {
                    // Lane messages are produced by the gateway; a
                    // malformed one cannot make progress on redelivery
                    warn!(
                        subject = %message.subject,
                        error = %error,
                        "malformed lane message, capturing and terminating"
                    );
                    let placeholder = placeholder_envelope(&message);
                    if let Err(capture_error) =
                        self.dead_letters.capture(&placeholder, &error).await
                    {
                        error!(error = %capture_error, "dead-letter capture failed");
                    }
                    JetStreamAckHandle::new(message).terminate().await;
                    continue;
                }
            };

            let pending = PendingDocument {
                envelope,
                ack: Box::new(JetStreamAckHandle::new(message)),
            };
            if let Err(rejected) = self.accumulator.offer(pending).await {
                warn!(
                    filename = %rejected.envelope.filename,
                    "accumulator full, requeueing delivery"
                );
                rejected.ack.retry(Some(self.backpressure_delay)).await;
            }
        }

        Ok(())
    }
}

fn envelope_from_lane_message(
    message: &jetstream::Message,
) -> Result<MessageEnvelope, PipelineError> {
    let headers = message.headers.as_ref();
    let filename = header_value(headers, FILENAME_HEADER);
    let interface_id = header_value(headers, INTERFACE_ID_HEADER);
    let client_id = header_value(headers, CLIENT_ID_HEADER);
    let lane = header_value(headers, LANE_HEADER);

    match (filename, interface_id, client_id, lane) {
        (Some(filename), Some(interface_id), Some(client_id), Some(lane)) => {
            let received_at = header_value(headers, RECEIVED_AT_HEADER)
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            Ok(MessageEnvelope {
                payload: Bytes::copy_from_slice(&message.payload),
                filename,
                tenant_id: client_id,
                interface_id,
                lane: Some(Priority::parse(&lane)),
                delivered_count: delivered_count(message),
                received_at,
            })
        }
        _ => Err(PipelineError::Validation(
            "lane message is missing required headers".to_string(),
        )),
    }
}

fn placeholder_envelope(message: &jetstream::Message) -> MessageEnvelope {
    let headers = message.headers.as_ref();
    MessageEnvelope {
        payload: Bytes::copy_from_slice(&message.payload),
        filename: header_value(headers, FILENAME_HEADER).unwrap_or_default(),
        tenant_id: header_value(headers, CLIENT_ID_HEADER).unwrap_or_default(),
        interface_id: header_value(headers, INTERFACE_ID_HEADER).unwrap_or_default(),
        lane: None,
        delivered_count: delivered_count(message),
        received_at: Utc::now(),
    }
}
