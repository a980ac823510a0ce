//! Object key and visibility policy
//!
//! Pure functions that decide where a file lives in the bucket, whether the
//! write may carry a per-object public ACL, and which URL the caller gets
//! back once the write succeeded. Nothing here performs I/O.
//!
//! The key is a function of `(base_path, relative_path, hash, extension)`
//! only, so delete and signing recompute it from the same descriptor that
//! was used at upload time instead of persisting it.

use object_store::path::Path;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StorageConfig;
use crate::errors::{Result, UploadError};

/// Canonical public endpoint of Google Cloud Storage
pub const GCS_PUBLIC_ENDPOINT: &str = "https://storage.googleapis.com";

const SEPARATOR: char = '/';

/// A file handed to the provider by the content-management host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Original filename
    pub name: String,
    /// Content-derived identifier, stable for the same logical file
    pub hash: String,
    /// Extension including the leading dot, may be empty
    #[serde(default)]
    pub extension: String,
    /// Optional subdirectory supplied by the caller
    #[serde(default)]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    /// Set once the write is known to have succeeded
    #[serde(default)]
    pub url: Option<String>,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, hash: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            extension: extension.into(),
            ..Default::default()
        }
    }

    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

/// Storage path of an object inside the bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to an object_store path, rejecting empty segments
    pub fn to_path(&self) -> std::result::Result<Path, object_store::path::Error> {
        Path::parse(&self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `base_path` without trailing slashes, followed by one separator if non-empty
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}{}", trimmed, SEPARATOR)
    }
}

fn normalize_relative_path(relative_path: Option<&str>) -> String {
    match relative_path.map(|p| p.trim_end_matches(SEPARATOR)) {
        Some(p) if !p.is_empty() => format!("{}{}", p, SEPARATOR),
        _ => String::new(),
    }
}

/// Compute the object key for `file`
///
/// The caller must ensure `file.hash` is non-empty.
pub fn compute_key(config: &StorageConfig, file: &FileDescriptor) -> ObjectKey {
    debug_assert!(!file.hash.is_empty(), "compute_key called with an empty hash");

    ObjectKey(format!(
        "{}{}{}{}",
        normalize_base_path(&config.base_path),
        normalize_relative_path(file.relative_path.as_deref()),
        file.hash,
        file.extension
    ))
}

/// Whether the write request carries a per-object public ACL
///
/// Uniform bucket-level access forbids per-object ACLs, so the flag is only
/// ever set when uniform access is off and public files were requested.
pub fn decide_visibility_flag(config: &StorageConfig) -> bool {
    !config.uniform && config.public_files
}

/// URL assigned to a file after `key` was written
///
/// Reflects the configured visibility; whether a public URL is actually
/// reachable is up to the bucket's IAM policy.
pub fn resolve_url(config: &StorageConfig, key: &ObjectKey) -> String {
    if config.public_files {
        format!("{}/{}/{}", GCS_PUBLIC_ENDPOINT, config.bucket_name, key)
    } else if let Some(base_url) = &config.base_url {
        format!("{}/{}", base_url.trim_end_matches(SEPARATOR), key)
    } else {
        format!("{}{}", SEPARATOR, key)
    }
}

/// Fail with `SizeLimitExceeded` when the file is larger than `limit_bytes`
pub fn check_size(file: &FileDescriptor, limit_bytes: u64) -> Result<()> {
    if file.size_bytes > limit_bytes {
        return Err(UploadError::SizeLimitExceeded {
            size: file.size_bytes,
            limit: limit_bytes,
        });
    }
    Ok(())
}
