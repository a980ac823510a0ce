//! Google Cloud Storage backend implementation
//!
//! Uses object_store::gcp::GoogleCloudStorage with support for:
//! - Application Default Credentials (ADC) / Workload Identity
//! - Service account JSON key file
//! - Service account JSON key as string
//!
//! Writes whose visibility flag is set go through a second client that sends
//! `x-goog-acl: public-read`, so the object is created public in the same
//! request that uploads it. No follow-up ACL call is ever made.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method};
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::signer::Signer;
use object_store::{ClientOptions, ObjectStore};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{write_buffered, write_stream, ByteStream, StorageBackend, WriteOptions};
use crate::config::GcpConfig;
use crate::errors::{Result, UploadError};
use crate::policy::ObjectKey;

const ACL_HEADER: &str = "x-goog-acl";
const PUBLIC_READ: &str = "public-read";

/// Google Cloud Storage backend
pub struct GcpBackend {
    store: GoogleCloudStorage,
    public_store: GoogleCloudStorage,
}

impl GcpBackend {
    /// Create a new GCP Cloud Storage backend
    ///
    /// Supports multiple authentication modes:
    /// 1. Managed identity (default): Uses Application Default Credentials (ADC)
    /// 2. Service account file: Uses service_account_path
    /// 3. Service account key: Uses service_account_key (JSON string)
    pub fn new(bucket_name: &str, config: &GcpConfig) -> Result<Self> {
        let store = Self::builder(bucket_name, config)?.build()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACL_HEADER, HeaderValue::from_static(PUBLIC_READ));
        let public_store = Self::builder(bucket_name, config)?
            .with_client_options(ClientOptions::new().with_default_headers(headers))
            .build()?;

        Ok(Self {
            store,
            public_store,
        })
    }

    fn builder(bucket_name: &str, config: &GcpConfig) -> Result<GoogleCloudStorageBuilder> {
        if config.use_managed_identity {
            // ADC chain: GOOGLE_APPLICATION_CREDENTIALS, Workload Identity, GCE metadata
            return Ok(GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket_name));
        }

        let builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket_name);
        if let Some(path) = &config.service_account_path {
            Ok(builder.with_service_account_path(path))
        } else if let Some(key) = &config.service_account_key {
            Ok(builder.with_service_account_key(key))
        } else {
            Err(UploadError::Config(
                "GCP service account credentials (service_account_path or service_account_key) are required when use_managed_identity is false".to_string(),
            ))
        }
    }

    fn writer(&self, options: &WriteOptions) -> &GoogleCloudStorage {
        if options.public {
            &self.public_store
        } else {
            &self.store
        }
    }
}

#[async_trait]
impl StorageBackend for GcpBackend {
    async fn put(
        &self,
        key: &ObjectKey,
        data: Bytes,
        options: &WriteOptions,
    ) -> std::result::Result<(), object_store::Error> {
        let path = key.to_path()?;
        debug!(key = %key, public = options.public, resumable = options.resumable, "GCS put");
        write_buffered(self.writer(options), &path, data, options).await
    }

    async fn put_stream(
        &self,
        key: &ObjectKey,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> std::result::Result<(), object_store::Error> {
        let path = key.to_path()?;
        debug!(key = %key, public = options.public, "GCS streamed put");
        write_stream(self.writer(options), &path, stream, options).await
    }

    async fn delete(&self, key: &ObjectKey) -> std::result::Result<(), object_store::Error> {
        let path = key.to_path()?;
        self.store.delete(&path).await
    }

    async fn signed_url(
        &self,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> std::result::Result<Url, object_store::Error> {
        let path = key.to_path()?;
        self.store.signed_url(Method::GET, &path, expires_in).await
    }

    fn name(&self) -> &'static str {
        "gcp"
    }
}
