use chrono::{DateTime, Utc};
use common::{DocumentType, FieldValue, HeaderRecord, LineRecord};
use rust_decimal::Decimal;

/// Line sequence generator scoped to one header construction.
///
/// Passed explicitly through the mapping engine so concurrent transforms
/// can never interleave their counters; sequences are contiguous from 1
/// within a header and carry no meaning across headers.
#[derive(Debug)]
pub struct LineSequencer {
    next: u32,
}

impl LineSequencer {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_sequence(&mut self) -> u32 {
        let sequence = self.next;
        self.next += 1;
        sequence
    }
}

impl Default for LineSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces header and line records pre-populated with defaults for every
/// field that is non-nullable in the persistence schema. Timestamps derive
/// from the envelope's received-at instant so construction is deterministic
/// and transform stays idempotent under redelivery.
pub struct EntityFactory;

impl EntityFactory {
    pub fn new_header(
        tenant_id: &str,
        document_type: DocumentType,
        received_at: DateTime<Utc>,
    ) -> HeaderRecord {
        let mut header = HeaderRecord::new(tenant_id.to_string(), document_type);
        header.set("status", FieldValue::Text("RECEIVED".to_string()));
        header.set("received_at", FieldValue::DateTime(received_at));
        header.set("archived", FieldValue::Boolean(false));
        match document_type {
            DocumentType::ShipmentNotice => {
                header.set("package_count", FieldValue::Integer(0));
            }
            DocumentType::Order => {
                header.set("order_total", FieldValue::Decimal(Decimal::ZERO));
            }
        }
        header
    }

    pub fn new_line(
        header: &HeaderRecord,
        sequencer: &mut LineSequencer,
        received_at: DateTime<Utc>,
    ) -> LineRecord {
        let mut line = LineRecord::new(header.tenant_id.clone(), sequencer.next_sequence());
        line.set("created_at", FieldValue::DateTime(received_at));
        match header.document_type {
            DocumentType::ShipmentNotice => {
                line.set("quantity_shipped", FieldValue::Integer(0));
            }
            DocumentType::Order => {
                line.set("quantity_ordered", FieldValue::Integer(0));
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_defaults_cover_non_nullable_fields() {
        let now = Utc::now();
        let header = EntityFactory::new_header("3", DocumentType::ShipmentNotice, now);

        assert_eq!(
            header.get("status"),
            Some(&FieldValue::Text("RECEIVED".to_string()))
        );
        assert_eq!(header.get("received_at"), Some(&FieldValue::DateTime(now)));
        assert_eq!(header.get("archived"), Some(&FieldValue::Boolean(false)));
        assert_eq!(header.get("package_count"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_line_sequences_are_contiguous_per_sequencer() {
        let now = Utc::now();
        let header = EntityFactory::new_header("3", DocumentType::Order, now);
        let mut sequencer = LineSequencer::new();

        let sequences: Vec<u32> = (0..4)
            .map(|_| EntityFactory::new_line(&header, &mut sequencer, now).sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_independent_sequencers_do_not_interfere() {
        let now = Utc::now();
        let header_a = EntityFactory::new_header("3", DocumentType::Order, now);
        let header_b = EntityFactory::new_header("4", DocumentType::Order, now);
        let mut sequencer_a = LineSequencer::new();
        let mut sequencer_b = LineSequencer::new();

        let a1 = EntityFactory::new_line(&header_a, &mut sequencer_a, now);
        let b1 = EntityFactory::new_line(&header_b, &mut sequencer_b, now);
        let a2 = EntityFactory::new_line(&header_a, &mut sequencer_a, now);

        assert_eq!(a1.sequence, 1);
        assert_eq!(b1.sequence, 1);
        assert_eq!(a2.sequence, 2);
    }
}
