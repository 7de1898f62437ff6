use crate::domain::{DocumentType, PipelineResult};
use async_trait::async_trait;

/// Per-client, per-document-type interface configuration. Owned by the
/// administration surface; the pipeline reads it to classify priority,
/// locate line elements, and decide default-line synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceConfig {
    pub interface_id: String,
    pub tenant_id: String,
    pub document_type: DocumentType,
    /// Slash-separated path selecting the repeated line elements, relative
    /// to the document root (e.g. "Lines/Line").
    pub line_path: String,
    /// When true, a document with zero line matches still yields exactly one
    /// factory-default line.
    pub requires_line: bool,
    pub high_priority: bool,
    /// Bulk interfaces are classified low priority.
    pub bulk: bool,
    pub active: bool,
}

/// Read-only port over interface configurations.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait InterfaceConfigRepository: Send + Sync {
    async fn get_interface(&self, interface_id: &str) -> PipelineResult<Option<InterfaceConfig>>;
}
