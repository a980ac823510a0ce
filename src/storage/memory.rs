//! In-memory storage backend
//!
//! Wraps object_store::memory::InMemory for local runs and tests. Object
//! stores have no notion of ACLs, so keys written with the visibility flag
//! are tracked on the side.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use super::{write_buffered, write_stream, ByteStream, StorageBackend, WriteOptions};
use crate::policy::ObjectKey;

/// In-process storage backend
#[derive(Debug)]
pub struct MemoryBackend {
    store: Arc<InMemory>,
    public_keys: Mutex<HashSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            public_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Whether `key` was last written with the public flag
    pub fn is_public(&self, key: &str) -> bool {
        self.public_keys
            .lock()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    /// Get the underlying object store
    pub fn object_store(&self) -> Arc<InMemory> {
        self.store.clone()
    }

    fn record_visibility(&self, key: &ObjectKey, public: bool) {
        if let Ok(mut keys) = self.public_keys.lock() {
            if public {
                keys.insert(key.to_string());
            } else {
                keys.remove(key.as_str());
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(
        &self,
        key: &ObjectKey,
        data: Bytes,
        options: &WriteOptions,
    ) -> std::result::Result<(), object_store::Error> {
        let path = key.to_path()?;
        write_buffered(self.store.as_ref(), &path, data, options).await?;
        self.record_visibility(key, options.public);
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &ObjectKey,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> std::result::Result<(), object_store::Error> {
        let path = key.to_path()?;
        write_stream(self.store.as_ref(), &path, stream, options).await?;
        self.record_visibility(key, options.public);
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> std::result::Result<(), object_store::Error> {
        let path = key.to_path()?;
        // InMemory deletes silently; report missing objects like a remote store would
        self.store.head(&path).await?;
        self.store.delete(&path).await?;
        self.record_visibility(key, false);
        Ok(())
    }

    async fn signed_url(
        &self,
        _key: &ObjectKey,
        _expires_in: Duration,
    ) -> std::result::Result<Url, object_store::Error> {
        Err(object_store::Error::NotImplemented)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
