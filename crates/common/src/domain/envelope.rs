use crate::domain::Priority;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use garde::Validate;

/// A single inbound document plus its routing metadata, as received from the
/// transport. Created at ingestion, immutable, discarded once accumulated
/// and acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    pub payload: Bytes,
    pub filename: String,
    pub tenant_id: String,
    pub interface_id: String,
    /// Set once the priority router has republished the envelope onto a
    /// lane. A second route attempt on a marked envelope is an error.
    pub lane: Option<Priority>,
    /// JetStream delivery count, monotonically non-decreasing across
    /// redelivery cycles.
    pub delivered_count: i64,
    pub received_at: DateTime<Utc>,
}

/// Required delivery metadata extracted from transport headers. Absence or
/// emptiness of any field is a terminal validation failure.
#[derive(Debug, Clone, Validate)]
pub struct EnvelopeMetadata {
    #[garde(length(min = 1))]
    pub filename: String,
    #[garde(length(min = 1))]
    pub interface_id: String,
    #[garde(length(min = 1))]
    pub client_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_struct;

    #[test]
    fn test_complete_metadata_is_valid() {
        let meta = EnvelopeMetadata {
            filename: "order1.xml".to_string(),
            interface_id: "7".to_string(),
            client_id: "3".to_string(),
        };
        assert!(validate_struct(&meta).is_ok());
    }

    #[test]
    fn test_missing_interface_id_fails() {
        let meta = EnvelopeMetadata {
            filename: "order1.xml".to_string(),
            interface_id: "".to_string(),
            client_id: "3".to_string(),
        };
        assert!(validate_struct(&meta).is_err());
    }
}
