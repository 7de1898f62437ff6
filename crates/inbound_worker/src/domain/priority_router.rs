use crate::domain::LanePublisher;
use common::{InterfaceConfig, MessageEnvelope, PipelineError, PipelineResult, Priority};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Classifies envelope urgency from interface configuration flags and
/// republishes onto the priority-stratified lane.
pub struct PriorityRouter {
    lanes: Arc<dyn LanePublisher>,
}

impl PriorityRouter {
    pub fn new(lanes: Arc<dyn LanePublisher>) -> Self {
        Self { lanes }
    }

    /// Pure classification: high-priority interfaces outrank the bulk flag.
    pub fn classify(interface: &InterfaceConfig) -> Priority {
        if interface.high_priority {
            Priority::High
        } else if interface.bulk {
            Priority::Low
        } else {
            Priority::Normal
        }
    }

    /// Republish the envelope onto its lane. Routing an envelope that
    /// already carries a lane marker is an error, not a silent double-route.
    #[instrument(skip(self, envelope), fields(filename = %envelope.filename, tenant_id = %envelope.tenant_id))]
    pub async fn route(
        &self,
        envelope: &MessageEnvelope,
        priority: Priority,
    ) -> PipelineResult<()> {
        if envelope.lane.is_some() {
            return Err(PipelineError::AlreadyRouted(envelope.filename.clone()));
        }
        self.lanes.publish_to_lane(envelope, priority).await?;
        debug!(lane = priority.as_str(), "routed envelope to lane");
        Ok(())
    }
}
