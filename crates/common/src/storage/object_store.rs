use anyhow::{Context, Result};
use async_nats::jetstream;
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Port over the external payload blob store.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PayloadObjectStore: Send + Sync {
    async fn upload(&self, key: &str, content: bytes::Bytes) -> Result<()>;

    async fn download(&self, key: &str) -> Result<bytes::Bytes>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// NATS JetStream Object Store implementation of the external payload tier.
pub struct NatsPayloadObjectStore {
    store: jetstream::object_store::ObjectStore,
}

impl NatsPayloadObjectStore {
    pub async fn new(jetstream: &jetstream::Context, bucket_name: &str) -> Result<Self> {
        debug!(bucket = %bucket_name, "initializing payload object store");

        let store = match jetstream.get_object_store(bucket_name).await {
            Ok(store) => store,
            Err(_) => {
                debug!(bucket = %bucket_name, "creating payload object store bucket");
                jetstream
                    .create_object_store(jetstream::object_store::Config {
                        bucket: bucket_name.to_string(),
                        ..Default::default()
                    })
                    .await
                    .context("failed to create payload object store bucket")?
            }
        };

        Ok(Self { store })
    }
}

#[async_trait]
impl PayloadObjectStore for NatsPayloadObjectStore {
    async fn upload(&self, key: &str, content: bytes::Bytes) -> Result<()> {
        let mut reader = &content[..];
        self.store
            .put(key, &mut reader)
            .await
            .context("failed to upload payload object")?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<bytes::Bytes> {
        let mut object = self
            .store
            .get(key)
            .await
            .context("failed to get payload object")?;

        let mut buf = Vec::new();
        object
            .read_to_end(&mut buf)
            .await
            .context("failed to read payload object content")?;

        Ok(bytes::Bytes::from(buf))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store
            .delete(key)
            .await
            .context("failed to delete payload object")?;
        Ok(())
    }
}
