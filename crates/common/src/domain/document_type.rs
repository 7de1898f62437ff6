use serde::{Deserialize, Serialize};

/// The kinds of inbound business documents the pipeline understands.
///
/// Each variant has its own set of non-nullable defaults applied by the
/// entity factory and its own default-line synthesis behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    ShipmentNotice,
    Order,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ShipmentNotice => "shipment_notice",
            DocumentType::Order => "order",
        }
    }

    pub fn parse(value: &str) -> Option<DocumentType> {
        match value {
            "shipment_notice" => Some(DocumentType::ShipmentNotice),
            "order" => Some(DocumentType::Order),
            _ => None,
        }
    }
}
