//! GcsUpload - upload provider for Google Cloud Storage
//!
//! Lets a content-management backend delegate file persistence to a bucket.
//! The provider derives a deterministic object key from each file
//! descriptor, decides whether the write may carry a per-object public ACL,
//! and resolves the URL handed back to the host once the write succeeded.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod policy;
pub mod provider;
pub mod routes;
pub mod server;
pub mod storage;

pub use config::{Config, StorageConfig};
pub use errors::{Result, UploadError};
pub use policy::{
    check_size, compute_key, decide_visibility_flag, resolve_url, FileDescriptor, ObjectKey,
};
pub use provider::UploadProvider;
pub use storage::{create_backend, StorageBackend};
