use crate::domain::{DocumentType, PipelineResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A typed column value produced by the mapping engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

/// The header half of the two-level relational shape a document becomes.
/// One per document; fields are an ordered map so two transforms of the
/// same input compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub tenant_id: String,
    pub document_type: DocumentType,
    pub fields: BTreeMap<String, FieldValue>,
}

impl HeaderRecord {
    pub fn new(tenant_id: String, document_type: DocumentType) -> Self {
        Self {
            tenant_id,
            document_type,
            fields: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    /// First-match-wins assignment: returns false and leaves the existing
    /// value untouched when the field was already mapped.
    pub fn set_if_absent(&mut self, field: &str, value: FieldValue) -> bool {
        if self.fields.contains_key(field) {
            return false;
        }
        self.fields.insert(field.to_string(), value);
        true
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// A line referencing its header through persistence, carrying a 1-based
/// sequence number unique and contiguous within the header.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub tenant_id: String,
    pub sequence: u32,
    pub fields: BTreeMap<String, FieldValue>,
}

impl LineRecord {
    pub fn new(tenant_id: String, sequence: u32) -> Self {
        Self {
            tenant_id,
            sequence,
            fields: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn set_if_absent(&mut self, field: &str, value: FieldValue) -> bool {
        if self.fields.contains_key(field) {
            return false;
        }
        self.fields.insert(field.to_string(), value);
        true
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Repository port for persisting a transformed document. Header and lines
/// are written atomically; the returned id identifies the header row.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn store_document(
        &self,
        header: &HeaderRecord,
        lines: &[LineRecord],
    ) -> PipelineResult<Uuid>;
}
