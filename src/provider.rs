//! Upload provider
//!
//! Orchestrates the operations a content-management host delegates to the
//! object store: buffered and streamed upload, delete, signed URL issuance
//! and size validation. Keys, visibility and URLs come from [`crate::policy`];
//! the bytes go through the injected [`StorageBackend`].

use bytes::Bytes;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::StorageConfig;
use crate::errors::{Result, UploadError};
use crate::metrics;
use crate::policy::{self, FileDescriptor, ObjectKey};
use crate::storage::{ByteStream, StorageBackend, WriteOptions};

/// Provider bound to one bucket configuration and one storage client
pub struct UploadProvider {
    config: StorageConfig,
    backend: Arc<dyn StorageBackend>,
}

impl UploadProvider {
    pub fn new(config: StorageConfig, backend: Arc<dyn StorageBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Files need signed URLs to be read
    pub fn is_private(&self) -> bool {
        !self.config.public_files
    }

    /// Key under which `file` is (or would be) stored
    pub fn key_for(&self, file: &FileDescriptor) -> Result<ObjectKey> {
        if file.hash.is_empty() {
            return Err(UploadError::MissingHash);
        }
        let key = policy::compute_key(&self.config, file);

        // The store normalizes some paths (a leading `/` is dropped); such a key
        // would no longer match the URL reported for it.
        let path = key
            .to_path()
            .map_err(|e| UploadError::InvalidKey(format!("{}: {}", key, e)))?;
        let stored: &str = path.as_ref();
        if stored != key.as_str() {
            return Err(UploadError::InvalidKey(format!(
                "{} would be stored as {}",
                key, path
            )));
        }
        Ok(key)
    }

    /// Fail when `file` is larger than `size_limit` bytes
    pub fn check_file_size(&self, file: &FileDescriptor, size_limit: u64) -> Result<()> {
        policy::check_size(file, size_limit)
    }

    fn check_configured_limit(&self, file: &FileDescriptor) -> Result<()> {
        match self.config.size_limit {
            Some(limit) => policy::check_size(file, limit),
            None => Ok(()),
        }
    }

    fn write_options(&self, file: &FileDescriptor, resumable: bool) -> WriteOptions {
        let content_type = if file.mime_type.is_empty() {
            mime_guess::from_path(&file.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        } else {
            file.mime_type.clone()
        };

        WriteOptions {
            content_type,
            content_disposition: format!(
                "inline; filename=\"{}\"",
                file.name.replace('\\', "\\\\").replace('"', "\\\"")
            ),
            public: policy::decide_visibility_flag(&self.config),
            resumable,
        }
    }

    /// Upload a buffered file and set `file.url` once the write succeeded
    #[instrument(skip(self, file, data), fields(hash = %file.hash, size = data.len()))]
    pub async fn upload(&self, file: &mut FileDescriptor, data: Bytes) -> Result<()> {
        file.size_bytes = data.len() as u64;
        self.check_configured_limit(file)?;
        let key = self.key_for(file)?;
        let options = self.write_options(file, file.size_bytes > self.config.resumable_threshold);

        info!(key = %key, public = options.public, resumable = options.resumable, "Upload request");

        let started = Instant::now();
        let result = self.backend.put(&key, data, &options).await;
        metrics::observe("upload", started, &result);
        result.map_err(|e| {
            error!(key = %key, error = %e, "Storage put failed");
            UploadError::Storage(e)
        })?;

        metrics::UPLOADED_BYTES.inc_by(file.size_bytes);
        file.url = Some(policy::resolve_url(&self.config, &key));
        Ok(())
    }

    /// Upload a file from a stream and set `file.url` once the write succeeded
    ///
    /// The configured limit is checked against the size announced in
    /// `file.size_bytes` up front and against the bytes actually received while
    /// streaming. Going over it aborts the multipart upload. On success
    /// `file.size_bytes` holds the number of bytes written.
    #[instrument(skip(self, file, stream), fields(hash = %file.hash))]
    pub async fn upload_stream(&self, file: &mut FileDescriptor, stream: ByteStream) -> Result<()> {
        self.check_configured_limit(file)?;
        let key = self.key_for(file)?;
        let options = self.write_options(file, true);

        info!(key = %key, public = options.public, "Streamed upload request");

        let received = Arc::new(AtomicU64::new(0));
        let stream = limit_stream(stream, received.clone(), self.config.size_limit);

        let started = Instant::now();
        let result = self.backend.put_stream(&key, stream, &options).await;
        metrics::observe("upload_stream", started, &result);
        let size = received.load(Ordering::Acquire);

        if let Err(e) = result {
            if let Some(limit) = self.config.size_limit.filter(|limit| size > *limit) {
                info!(key = %key, size, limit, "Streamed upload aborted over size limit");
                return Err(UploadError::SizeLimitExceeded { size, limit });
            }
            error!(key = %key, error = %e, "Storage streamed put failed");
            return Err(UploadError::Storage(e));
        }

        metrics::UPLOADED_BYTES.inc_by(size);
        file.size_bytes = size;
        file.url = Some(policy::resolve_url(&self.config, &key));
        Ok(())
    }

    /// Delete the object for `file`; a missing object counts as deleted
    #[instrument(skip(self, file), fields(hash = %file.hash))]
    pub async fn delete(&self, file: &FileDescriptor) -> Result<()> {
        let key = self.key_for(file)?;
        info!(key = %key, "Delete request");

        let started = Instant::now();
        let result = match self.backend.delete(&key).await {
            Err(object_store::Error::NotFound { .. }) => {
                debug!(key = %key, "Object already absent");
                Ok(())
            }
            other => other,
        };
        metrics::observe("delete", started, &result);

        result.map_err(|e| {
            error!(key = %key, error = %e, "Storage delete failed");
            UploadError::Storage(e)
        })
    }

    /// Issue a signed read URL for `file`
    #[instrument(skip(self, file), fields(hash = %file.hash))]
    pub async fn get_signed_url(&self, file: &FileDescriptor) -> Result<Url> {
        let key = self.key_for(file)?;
        let expires_in = Duration::from_secs(self.config.signed_url_expiry_secs);

        let started = Instant::now();
        let result = self.backend.signed_url(&key, expires_in).await;
        metrics::observe("signed_url", started, &result);

        result.map_err(|e| {
            error!(key = %key, error = %e, "Signed URL generation failed");
            UploadError::Storage(e)
        })
    }
}

/// Count the bytes flowing through `stream` into `received`, failing the
/// stream as soon as the total goes over `limit`
fn limit_stream(stream: ByteStream, received: Arc<AtomicU64>, limit: Option<u64>) -> ByteStream {
    stream
        .map(move |chunk| {
            let bytes = chunk?;
            let len = bytes.len() as u64;
            let total = received.fetch_add(len, Ordering::AcqRel) + len;
            match limit {
                Some(limit) if total > limit => Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("upload exceeds the limit of {} bytes", limit),
                )),
                _ => Ok(bytes),
            }
        })
        .boxed()
}
