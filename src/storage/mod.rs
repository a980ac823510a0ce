//! Storage backend abstraction layer
//!
//! Provides a unified interface over the object store holding uploaded
//! files. Implementations delegate to the object_store crate for the actual
//! operations; the provider hands them a precomputed key, a precomputed
//! visibility flag and the write attributes.

mod gcp;
mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutMultipartOpts, PutOptions,
    WriteMultipart,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{BackendType, Config};
use crate::errors::Result;
use crate::policy::ObjectKey;

pub use gcp::GcpBackend;
pub use memory::MemoryBackend;

/// Body of a streamed upload
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Per-request write settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub content_type: String,
    pub content_disposition: String,
    /// Attach a per-object public ACL to the write
    pub public: bool,
    /// Use a multipart (resumable) upload instead of a single request
    pub resumable: bool,
}

impl WriteOptions {
    fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        if !self.content_type.is_empty() {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(self.content_type.clone()),
            );
        }
        if !self.content_disposition.is_empty() {
            attributes.insert(
                Attribute::ContentDisposition,
                AttributeValue::from(self.content_disposition.clone()),
            );
        }
        attributes
    }
}

/// Storage backend trait for uploaded files
///
/// All storage operations flow through this trait. The visibility flag is
/// part of the write itself; there is no separate ACL call that could fail
/// independently of it.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a buffered object
    async fn put(
        &self,
        key: &ObjectKey,
        data: Bytes,
        options: &WriteOptions,
    ) -> std::result::Result<(), object_store::Error>;

    /// Write an object from a stream, always as a multipart upload
    async fn put_stream(
        &self,
        key: &ObjectKey,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> std::result::Result<(), object_store::Error>;

    /// Delete an object; a missing object yields `NotFound`
    async fn delete(&self, key: &ObjectKey) -> std::result::Result<(), object_store::Error>;

    /// Issue a time-limited read URL
    async fn signed_url(
        &self,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> std::result::Result<Url, object_store::Error>;

    /// Short backend name for logs and metrics
    fn name(&self) -> &'static str;
}

/// Create a storage backend based on configuration
pub fn create_backend(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    match config.backend {
        BackendType::Gcp => {
            let backend = GcpBackend::new(&config.storage.bucket_name, &config.gcp)?;
            Ok(Arc::new(backend))
        }
        BackendType::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}

/// Buffered write through `store`, switching to multipart when asked to
async fn write_buffered(
    store: &dyn ObjectStore,
    path: &Path,
    data: Bytes,
    options: &WriteOptions,
) -> std::result::Result<(), object_store::Error> {
    if options.resumable {
        let stream: ByteStream = futures::stream::once(async move { Ok(data) }).boxed();
        return write_stream(store, path, stream, options).await;
    }

    let opts = PutOptions {
        attributes: options.attributes(),
        ..Default::default()
    };
    store.put_opts(path, data.into(), opts).await?;
    Ok(())
}

/// Multipart write of `stream` through `store`, aborting the upload on error
async fn write_stream(
    store: &dyn ObjectStore,
    path: &Path,
    mut stream: ByteStream,
    options: &WriteOptions,
) -> std::result::Result<(), object_store::Error> {
    let opts = PutMultipartOpts {
        attributes: options.attributes(),
        ..Default::default()
    };
    let upload = store.put_multipart_opts(path, opts).await?;
    let mut writer = WriteMultipart::new(upload);

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                writer.wait_for_capacity(8).await?;
                writer.write(&bytes);
            }
            Err(e) => {
                writer.abort().await?;
                return Err(object_store::Error::Generic {
                    store: "upload stream",
                    source: Box::new(e),
                });
            }
        }
    }

    writer.finish().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_options_attributes() {
        let options = WriteOptions {
            content_type: "image/png".to_string(),
            content_disposition: "inline; filename=\"a.png\"".to_string(),
            ..Default::default()
        };
        let attributes = options.attributes();
        assert_eq!(
            attributes.get(&Attribute::ContentType),
            Some(&AttributeValue::from("image/png"))
        );
        assert_eq!(
            attributes.get(&Attribute::ContentDisposition),
            Some(&AttributeValue::from("inline; filename=\"a.png\""))
        );
    }

    #[test]
    fn test_empty_write_options_have_no_attributes() {
        assert!(WriteOptions::default().attributes().is_empty());
    }

    #[test]
    fn test_create_memory_backend() {
        let mut config = Config::default();
        config.backend = BackendType::Memory;
        config.storage.bucket_name = "media".to_string();
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "memory");
    }
}
