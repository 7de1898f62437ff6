use crate::domain::PipelineResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the raw document bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadTier {
    Inline,
    External,
}

impl PayloadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadTier::Inline => "INLINE",
            PayloadTier::External => "EXTERNAL",
        }
    }

    pub fn parse(value: &str) -> Option<PayloadTier> {
        match value {
            "INLINE" => Some(PayloadTier::Inline),
            "EXTERNAL" => Some(PayloadTier::External),
            _ => None,
        }
    }
}

/// The persisted raw document. Inline payloads carry their bytes (possibly
/// gzip-compressed); external payloads carry the object store key instead.
/// Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPayload {
    pub id: Uuid,
    pub tenant_id: String,
    pub interface_id: String,
    pub filename: String,
    pub tier: PayloadTier,
    pub compressed: bool,
    pub inline_content: Option<Vec<u8>>,
    pub external_key: Option<String>,
    pub size_bytes: i64,
    pub stored_at: DateTime<Utc>,
}

/// Repository port over stored payload metadata rows.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StoredPayloadRepository: Send + Sync {
    async fn insert_payload(&self, payload: &StoredPayload) -> PipelineResult<()>;

    async fn get_payload(&self, payload_id: Uuid) -> PipelineResult<Option<StoredPayload>>;
}
