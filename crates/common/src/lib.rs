mod domain;
mod nats;
mod postgres;
mod resilience;
mod storage;
mod xml;

pub mod telemetry;
pub mod validation;

pub use domain::*;
pub use nats::*;
pub use postgres::*;
pub use resilience::*;
pub use storage::*;
pub use xml::*;

// Re-export mocks when the testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDocumentRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockInterfaceConfigRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMappingRuleRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockStoredPayloadRepository;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamConsumer;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamPublisher;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockPullConsumer;
#[cfg(any(test, feature = "testing"))]
pub use storage::MockPayloadObjectStore;
