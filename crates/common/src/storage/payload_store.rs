use crate::domain::{PayloadTier, PipelineError, PipelineResult, StoredPayload};
use crate::storage::PayloadObjectStore;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PayloadStoreConfig {
    /// Payloads at or below this size are stored inline.
    pub inline_threshold_bytes: usize,
    /// Gzip inline payloads before persisting them.
    pub compress_inline: bool,
    /// Hard ceiling; larger payloads are rejected before any tier decision.
    pub max_payload_bytes: usize,
    /// Lowercase filename extensions accepted by the pipeline.
    pub allowed_extensions: Vec<String>,
}

impl Default for PayloadStoreConfig {
    fn default() -> Self {
        Self {
            inline_threshold_bytes: 1024 * 1024,
            compress_inline: true,
            max_payload_bytes: 10 * 1024 * 1024,
            allowed_extensions: vec!["xml".to_string()],
        }
    }
}

/// Persists raw document bytes inline (optionally gzipped) or in the
/// external object store, selected by a pure size-threshold function.
/// Retrieval is symmetric and decompresses transparently.
pub struct PayloadStore {
    config: PayloadStoreConfig,
    objects: Arc<dyn PayloadObjectStore>,
}

impl PayloadStore {
    pub fn new(config: PayloadStoreConfig, objects: Arc<dyn PayloadObjectStore>) -> Self {
        Self { config, objects }
    }

    /// Validate a payload before any storage decision. Raises validation
    /// errors, never storage errors, so callers can reject uploads
    /// synchronously.
    pub fn validate(&self, filename: &str, content: &[u8]) -> PipelineResult<()> {
        if content.is_empty() {
            return Err(PipelineError::Validation(
                "missing file content".to_string(),
            ));
        }
        if content.len() > self.config.max_payload_bytes {
            return Err(PipelineError::Validation(format!(
                "payload of {} bytes exceeds the {} byte ceiling",
                content.len(),
                self.config.max_payload_bytes
            )));
        }
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension {
            Some(ext) if self.config.allowed_extensions.contains(&ext) => Ok(()),
            _ => Err(PipelineError::Validation(format!(
                "unsupported file extension for '{}'",
                filename
            ))),
        }
    }

    #[instrument(skip(self, content), fields(tenant_id = %tenant_id, interface_id = %interface_id, size = content.len()))]
    pub async fn store(
        &self,
        tenant_id: &str,
        interface_id: &str,
        filename: &str,
        content: &Bytes,
        stored_at: DateTime<Utc>,
    ) -> PipelineResult<StoredPayload> {
        self.validate(filename, content)?;

        let id = Uuid::new_v4();
        let size_bytes = content.len() as i64;

        if content.len() <= self.config.inline_threshold_bytes {
            let (inline_content, compressed) = if self.config.compress_inline {
                (gzip(content)?, true)
            } else {
                (content.to_vec(), false)
            };
            debug!(payload_id = %id, compressed = compressed, "storing payload inline");
            return Ok(StoredPayload {
                id,
                tenant_id: tenant_id.to_string(),
                interface_id: interface_id.to_string(),
                filename: filename.to_string(),
                tier: PayloadTier::Inline,
                compressed,
                inline_content: Some(inline_content),
                external_key: None,
                size_bytes,
                stored_at,
            });
        }

        let key = format!("{}/{}/{}", tenant_id, interface_id, id);
        self.objects
            .upload(&key, content.clone())
            .await
            .map_err(|e| PipelineError::Transient(format!("object store upload failed: {}", e)))?;
        debug!(payload_id = %id, key = %key, "stored payload externally");

        Ok(StoredPayload {
            id,
            tenant_id: tenant_id.to_string(),
            interface_id: interface_id.to_string(),
            filename: filename.to_string(),
            tier: PayloadTier::External,
            compressed: false,
            inline_content: None,
            external_key: Some(key),
            size_bytes,
            stored_at,
        })
    }

    #[instrument(skip(self, payload), fields(payload_id = %payload.id, tier = payload.tier.as_str()))]
    pub async fn retrieve(&self, payload: &StoredPayload) -> PipelineResult<Bytes> {
        match payload.tier {
            PayloadTier::Inline => {
                let content = payload.inline_content.as_deref().ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "inline payload {} has no content",
                        payload.id
                    ))
                })?;
                if payload.compressed {
                    Ok(Bytes::from(gunzip(content)?))
                } else {
                    Ok(Bytes::copy_from_slice(content))
                }
            }
            PayloadTier::External => {
                let key = payload.external_key.as_deref().ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "external payload {} has no object key",
                        payload.id
                    ))
                })?;
                self.objects.download(key).await.map_err(|e| {
                    PipelineError::Transient(format!("object store download failed: {}", e))
                })
            }
        }
    }
}

fn gzip(content: &[u8]) -> PipelineResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content)
        .and_then(|_| encoder.finish())
        .map_err(|e| PipelineError::Transient(format!("gzip failed: {}", e)))
}

fn gunzip(content: &[u8]) -> PipelineResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(content);
    let mut buf = Vec::new();
    decoder
        .read_to_end(&mut buf)
        .map_err(|e| PipelineError::Transient(format!("gunzip failed: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockPayloadObjectStore;

    fn store_with(
        mock: MockPayloadObjectStore,
        inline_threshold_bytes: usize,
        compress_inline: bool,
    ) -> PayloadStore {
        PayloadStore::new(
            PayloadStoreConfig {
                inline_threshold_bytes,
                compress_inline,
                ..PayloadStoreConfig::default()
            },
            Arc::new(mock),
        )
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_validation_error() {
        let store = store_with(MockPayloadObjectStore::new(), 1024, false);
        let result = store.validate("order1.xml", b"");
        assert!(matches!(result, Err(PipelineError::Validation(msg)) if msg.contains("missing file content")));
    }

    #[tokio::test]
    async fn test_disallowed_extension_is_a_validation_error() {
        let store = store_with(MockPayloadObjectStore::new(), 1024, false);
        let result = store.validate("order1.csv", b"<Order/>");
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_small_payload_stays_inline_and_round_trips_compressed() {
        let store = store_with(MockPayloadObjectStore::new(), 1024, true);
        let content = Bytes::from_static(b"<Order><Id>9</Id></Order>");

        let payload = store
            .store("3", "7", "order1.xml", &content, Utc::now())
            .await
            .unwrap();

        assert_eq!(payload.tier, PayloadTier::Inline);
        assert!(payload.compressed);
        assert!(payload.external_key.is_none());

        let restored = store.retrieve(&payload).await.unwrap();
        assert_eq!(restored, content);
    }

    #[tokio::test]
    async fn test_large_payload_goes_external_and_retrieves_identically() {
        let content = Bytes::from(vec![b'x'; 2 * 1024 * 1024]);
        let expected = content.clone();

        let mut mock = MockPayloadObjectStore::new();
        let uploaded = std::sync::Arc::new(std::sync::Mutex::new(Bytes::new()));
        let uploaded_clone = uploaded.clone();
        mock.expect_upload()
            .withf(|key: &str, _| key.starts_with("3/7/"))
            .times(1)
            .returning(move |_, content| {
                *uploaded_clone.lock().unwrap() = content;
                Ok(())
            });
        let uploaded_clone = uploaded.clone();
        mock.expect_download()
            .times(1)
            .returning(move |_| Ok(uploaded_clone.lock().unwrap().clone()));

        let store = store_with(mock, 1024 * 1024, true);
        let payload = store
            .store("3", "7", "big.xml", &content, Utc::now())
            .await
            .unwrap();

        assert_eq!(payload.tier, PayloadTier::External);
        assert!(!payload.compressed);
        assert_eq!(payload.size_bytes, 2 * 1024 * 1024);

        let restored = store.retrieve(&payload).await.unwrap();
        assert_eq!(restored, expected);
    }
}
