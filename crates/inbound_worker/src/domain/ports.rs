use async_trait::async_trait;
use bytes::Bytes;
use common::{MessageEnvelope, PipelineError, PipelineResult, Priority};
use std::time::Duration;

/// Port for publishing an envelope onto its priority lane.
///
/// Implementations republish the original payload with the envelope's
/// routing metadata and the numeric priority header onto the lane subject.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LanePublisher: Send + Sync {
    async fn publish_to_lane(
        &self,
        envelope: &MessageEnvelope,
        priority: Priority,
    ) -> PipelineResult<()>;
}

/// Port for capturing a terminally failed envelope, original payload plus
/// error detail, for operator inspection and replay.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeadLetterProducer: Send + Sync {
    async fn capture(
        &self,
        envelope: &MessageEnvelope,
        error: &PipelineError,
    ) -> PipelineResult<()>;
}

/// Port for submitting a document onto the intake stream. Used by the
/// upload surface and operator replay, not by the queue path itself.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IntakePublisher: Send + Sync {
    async fn publish_intake(
        &self,
        tenant_id: &str,
        interface_id: &str,
        filename: &str,
        payload: Bytes,
    ) -> PipelineResult<()>;
}

/// Deferred acknowledgment handle for one queue delivery.
///
/// The lane consumer hands these to the accumulator so the delivery stays
/// unacknowledged until batch processing resolves it; a consumer crash then
/// rides on queue redelivery. Acknowledgment failures are logged by the
/// implementation, not surfaced, because the delivery will simply redeliver.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AckHandle: Send + Sync {
    async fn ack(&self);

    async fn retry(&self, delay: Option<Duration>);

    async fn terminate(&self);
}
