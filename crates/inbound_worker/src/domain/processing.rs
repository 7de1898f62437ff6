use crate::domain::MappingEngine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{
    DocumentRepository, InterfaceConfigRepository, MappingRuleRepository, MessageEnvelope,
    PayloadStore, PipelineError, PipelineResult, ResilienceCategory, ResilienceGovernor,
    StoredPayloadRepository, XmlDocument,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Drives one envelope through transform and persistence. Every I/O-bound
/// step goes through the resilience governor under its category, so a
/// repository outage trips only the repository breaker and XML parse storms
/// only the XML one.
pub struct DocumentProcessingService {
    interfaces: Arc<dyn InterfaceConfigRepository>,
    rules: Arc<dyn MappingRuleRepository>,
    documents: Arc<dyn DocumentRepository>,
    payloads: Arc<dyn StoredPayloadRepository>,
    payload_store: Arc<PayloadStore>,
    governor: Arc<ResilienceGovernor>,
}

impl DocumentProcessingService {
    pub fn new(
        interfaces: Arc<dyn InterfaceConfigRepository>,
        rules: Arc<dyn MappingRuleRepository>,
        documents: Arc<dyn DocumentRepository>,
        payloads: Arc<dyn StoredPayloadRepository>,
        payload_store: Arc<PayloadStore>,
        governor: Arc<ResilienceGovernor>,
    ) -> Self {
        Self {
            interfaces,
            rules,
            documents,
            payloads,
            payload_store,
            governor,
        }
    }

    /// Full queue-path processing: persist the raw payload, then transform
    /// and persist the relational records. Safe to repeat under
    /// at-least-once redelivery; the transform is deterministic and the
    /// stored payload is keyed by a fresh id per attempt.
    #[instrument(skip(self, envelope), fields(tenant_id = %envelope.tenant_id, interface_id = %envelope.interface_id, filename = %envelope.filename))]
    pub async fn process_envelope(&self, envelope: &MessageEnvelope) -> PipelineResult<Uuid> {
        let payload = self
            .governor
            .execute(
                ResilienceCategory::FileProcessing,
                || {
                    self.payload_store.store(
                        &envelope.tenant_id,
                        &envelope.interface_id,
                        &envelope.filename,
                        &envelope.payload,
                        envelope.received_at,
                    )
                },
                |e| async move { Err(e) },
            )
            .await?;

        self.governor
            .execute(
                ResilienceCategory::Repository,
                || self.payloads.insert_payload(&payload),
                |e| async move { Err(e) },
            )
            .await?;

        self.transform_and_persist(
            &envelope.tenant_id,
            &envelope.interface_id,
            &envelope.filename,
            &envelope.payload,
            envelope.received_at,
        )
        .await
    }

    /// Transform and persist from raw bytes forward. This is the shared
    /// tail of the queue path and of reprocessing, which re-enters here
    /// after retrieving a previously stored payload.
    pub async fn transform_and_persist(
        &self,
        tenant_id: &str,
        interface_id: &str,
        filename: &str,
        content: &Bytes,
        received_at: DateTime<Utc>,
    ) -> PipelineResult<Uuid> {
        let interface = self
            .governor
            .execute(
                ResilienceCategory::Repository,
                || self.interfaces.get_interface(interface_id),
                |e| async move { Err(e) },
            )
            .await?
            .ok_or_else(|| PipelineError::InterfaceNotFound(interface_id.to_string()))?;

        if interface.tenant_id != tenant_id {
            return Err(PipelineError::Validation(format!(
                "interface {} does not belong to client {}",
                interface_id, tenant_id
            )));
        }

        let rules = self
            .governor
            .execute(
                ResilienceCategory::Repository,
                || self.rules.list_active_rules(interface_id),
                |e| async move { Err(e) },
            )
            .await?;

        let document = self
            .governor
            .execute(
                ResilienceCategory::XmlProcessing,
                || async { XmlDocument::parse(content).map_err(PipelineError::from) },
                |e| async move { Err(e) },
            )
            .await?;

        let (header, lines) =
            MappingEngine::transform(&interface, &rules, &document, tenant_id, received_at)?;

        let header_id = self
            .governor
            .execute(
                ResilienceCategory::Repository,
                || self.documents.store_document(&header, &lines),
                |e| async move { Err(e) },
            )
            .await?;

        info!(
            tenant_id = %tenant_id,
            interface_id = %interface_id,
            filename = %filename,
            header_id = %header_id,
            line_count = lines.len(),
            "document transformed and persisted"
        );
        Ok(header_id)
    }
}
