use crate::domain::AckHandle;
use async_nats::jetstream;
use async_trait::async_trait;
use common::{apply_ack_decision, AckDecision};
use std::time::Duration;

/// Deferred acknowledgment over a JetStream message. Failures are logged by
/// the shared decision applier; the delivery simply redelivers after its
/// ack-wait if the acknowledgment never lands.
pub struct JetStreamAckHandle {
    message: jetstream::Message,
}

impl JetStreamAckHandle {
    pub fn new(message: jetstream::Message) -> Self {
        Self { message }
    }
}

#[async_trait]
impl AckHandle for JetStreamAckHandle {
    async fn ack(&self) {
        apply_ack_decision(&self.message, AckDecision::Ack).await;
    }

    async fn retry(&self, delay: Option<Duration>) {
        apply_ack_decision(
            &self.message,
            AckDecision::Retry {
                delay,
                reason: None,
            },
        )
        .await;
    }

    async fn terminate(&self) {
        apply_ack_decision(&self.message, AckDecision::Terminal { reason: None }).await;
    }
}
