//! Configuration management for GcsUpload
//!
//! Supports configuration via:
//! - Environment variables (primary)
//! - Optional TOML config file (secondary)
//!
//! Environment variables take precedence over config file values.
//! Configuration is resolved once at startup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;

use crate::errors::{Result, UploadError};

/// Longest lifetime a V4 signed URL may have (7 days)
pub const MAX_SIGNED_URL_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Backend storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Google Cloud Storage
    Gcp,
    /// In-process store, for local runs and tests
    Memory,
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gcp" | "gcs" | "google" => Ok(BackendType::Gcp),
            "memory" | "inmemory" => Ok(BackendType::Memory),
            _ => Err(format!("Unknown backend type: {}", s)),
        }
    }
}

/// Key and visibility policy options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding uploaded files
    pub bucket_name: String,

    /// Files are publicly readable (default: false)
    #[serde(default)]
    pub public_files: bool,

    /// Bucket enforces uniform bucket-level access (default: true).
    /// Per-object ACLs are never sent when this is set.
    #[serde(default = "default_uniform")]
    pub uniform: bool,

    /// Externally visible root for private files, e.g. a CDN
    #[serde(default)]
    pub base_url: Option<String>,

    /// Key prefix for all objects
    #[serde(default)]
    pub base_path: String,

    /// Lifetime of signed read URLs in seconds (default: 900)
    #[serde(default = "default_signed_url_expiry_secs")]
    pub signed_url_expiry_secs: u64,

    /// Upload size limit in bytes, unlimited when absent
    #[serde(default)]
    pub size_limit: Option<u64>,

    /// Buffered uploads above this size use a multipart write (default: 5MB)
    #[serde(default = "default_resumable_threshold")]
    pub resumable_threshold: u64,
}

fn default_uniform() -> bool {
    true
}

fn default_signed_url_expiry_secs() -> u64 {
    15 * 60
}

fn default_resumable_threshold() -> u64 {
    5 * 1024 * 1024
}

impl StorageConfig {
    /// Configuration for `bucket_name` with every other option at its default
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            public_files: false,
            uniform: default_uniform(),
            base_url: None,
            base_path: String::new(),
            signed_url_expiry_secs: default_signed_url_expiry_secs(),
            size_limit: None,
            resumable_threshold: default_resumable_threshold(),
        }
    }
}

/// Google Cloud credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Use Application Default Credentials / Workload Identity (default: true)
    #[serde(default = "default_use_managed_identity")]
    pub use_managed_identity: bool,

    /// Path to a service account JSON key file
    #[serde(default)]
    pub service_account_path: Option<String>,

    /// Service account JSON key as a string
    #[serde(default, skip_serializing)]
    pub service_account_key: Option<String>,
}

fn default_use_managed_identity() -> bool {
    true
}

impl std::fmt::Debug for GcpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpConfig")
            .field("use_managed_identity", &self.use_managed_identity)
            .field("service_account_path", &self.service_account_path)
            .field(
                "service_account_key",
                &self.service_account_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            use_managed_identity: default_use_managed_identity(),
            service_account_path: None,
            service_account_key: None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Request timeout in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max buffered request body size in bytes (default: 1GB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_body_size() -> usize {
    1024 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            timeout_secs: default_timeout_secs(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend type (gcp, memory)
    #[serde(default = "default_backend")]
    pub backend: BackendType,

    /// Key and visibility policy
    pub storage: StorageConfig,

    /// Google Cloud credentials
    #[serde(default)]
    pub gcp: GcpConfig,

    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_backend() -> BackendType {
    BackendType::Gcp
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: default_backend(),
            storage: StorageConfig::new(""),
            gcp: GcpConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| UploadError::Config(format!("{}: {}", name, e)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(UploadError::Config(format!(
            "{}: expected a boolean, got {:?}",
            name, value
        ))),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - GCSUPLOAD_CONFIG_FILE: optional path to TOML config file
    /// - GCSUPLOAD_BACKEND: gcp|memory (default: gcp)
    /// - GCSUPLOAD_BUCKET: bucket name
    /// - GCSUPLOAD_PUBLIC_FILES: serve files from the public endpoint (default: false)
    /// - GCSUPLOAD_UNIFORM: bucket uses uniform access (default: true)
    /// - GCSUPLOAD_BASE_URL: URL root for private files (optional)
    /// - GCSUPLOAD_BASE_PATH: key prefix (optional)
    /// - GCSUPLOAD_SIGNED_URL_EXPIRY_SECS: signed URL lifetime (default: 900)
    /// - GCSUPLOAD_SIZE_LIMIT: upload size limit in bytes (optional)
    /// - GCSUPLOAD_RESUMABLE_THRESHOLD: multipart threshold in bytes (default: 5MB)
    /// - GCSUPLOAD_USE_MANAGED_IDENTITY: use ADC (default: true)
    /// - GCSUPLOAD_SERVICE_ACCOUNT_PATH: service account key file (optional)
    /// - GCSUPLOAD_CREDENTIALS: service account key JSON (optional)
    /// - GCSUPLOAD_BIND_ADDRESS: server bind address (default: 0.0.0.0:8080)
    /// - GCSUPLOAD_TIMEOUT_SECS: request timeout (default: 300)
    /// - GCSUPLOAD_MAX_BODY_SIZE: max buffered body in bytes (default: 1GB)
    /// - GCSUPLOAD_LOG_LEVEL: log level (default: info)
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match var("GCSUPLOAD_CONFIG_FILE") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(v) = var("GCSUPLOAD_BACKEND") {
            config.backend = BackendType::from_str(&v).map_err(UploadError::Config)?;
        }
        if let Some(v) = var("GCSUPLOAD_BUCKET") {
            config.storage.bucket_name = v;
        }
        if let Some(v) = var("GCSUPLOAD_PUBLIC_FILES") {
            config.storage.public_files = parse_bool("GCSUPLOAD_PUBLIC_FILES", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_UNIFORM") {
            config.storage.uniform = parse_bool("GCSUPLOAD_UNIFORM", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_BASE_URL") {
            config.storage.base_url = Some(v);
        }
        if let Some(v) = var("GCSUPLOAD_BASE_PATH") {
            config.storage.base_path = v;
        }
        if let Some(v) = var("GCSUPLOAD_SIGNED_URL_EXPIRY_SECS") {
            config.storage.signed_url_expiry_secs =
                parse_env("GCSUPLOAD_SIGNED_URL_EXPIRY_SECS", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_SIZE_LIMIT") {
            config.storage.size_limit = Some(parse_env("GCSUPLOAD_SIZE_LIMIT", &v)?);
        }
        if let Some(v) = var("GCSUPLOAD_RESUMABLE_THRESHOLD") {
            config.storage.resumable_threshold = parse_env("GCSUPLOAD_RESUMABLE_THRESHOLD", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_USE_MANAGED_IDENTITY") {
            config.gcp.use_managed_identity = parse_bool("GCSUPLOAD_USE_MANAGED_IDENTITY", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_SERVICE_ACCOUNT_PATH") {
            config.gcp.service_account_path = Some(v);
        }
        if let Some(v) = var("GCSUPLOAD_CREDENTIALS") {
            config.gcp.service_account_key = Some(v);
        }
        if let Some(v) = var("GCSUPLOAD_BIND_ADDRESS") {
            config.server.bind_address = parse_env("GCSUPLOAD_BIND_ADDRESS", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_TIMEOUT_SECS") {
            config.server.timeout_secs = parse_env("GCSUPLOAD_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_MAX_BODY_SIZE") {
            config.server.max_body_size = parse_env("GCSUPLOAD_MAX_BODY_SIZE", &v)?;
        }
        if let Some(v) = var("GCSUPLOAD_LOG_LEVEL") {
            config.log_level = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject configurations that cannot produce valid keys or URLs
    pub fn validate(&self) -> Result<()> {
        let storage = &self.storage;

        if storage.bucket_name.trim().is_empty() {
            return Err(UploadError::Config("bucket name is required".to_string()));
        }

        if let Some(base_url) = &storage.base_url {
            url::Url::parse(base_url)
                .map_err(|e| UploadError::Config(format!("invalid base_url {:?}: {}", base_url, e)))?;
        }

        if storage.signed_url_expiry_secs == 0
            || storage.signed_url_expiry_secs > MAX_SIGNED_URL_EXPIRY_SECS
        {
            return Err(UploadError::Config(format!(
                "signed_url_expiry_secs must be between 1 and {}",
                MAX_SIGNED_URL_EXPIRY_SECS
            )));
        }

        if storage.resumable_threshold == 0 {
            return Err(UploadError::Config(
                "resumable_threshold must be greater than zero".to_string(),
            ));
        }

        if !self.gcp.use_managed_identity
            && self.backend == BackendType::Gcp
            && self.gcp.service_account_path.is_none()
            && self.gcp.service_account_key.is_none()
        {
            return Err(UploadError::Config(
                "service_account_path or credentials are required when use_managed_identity is false"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!(BackendType::from_str("gcp").unwrap(), BackendType::Gcp);
        assert_eq!(BackendType::from_str("GCS").unwrap(), BackendType::Gcp);
        assert_eq!(BackendType::from_str("memory").unwrap(), BackendType::Memory);
        assert!(BackendType::from_str("aws").is_err());
    }

    #[test]
    fn test_storage_defaults() {
        let storage = StorageConfig::new("bucket");
        assert!(!storage.public_files);
        assert!(storage.uniform);
        assert_eq!(storage.base_url, None);
        assert_eq!(storage.base_path, "");
        assert_eq!(storage.signed_url_expiry_secs, 900);
        assert_eq!(storage.resumable_threshold, 5 * 1024 * 1024);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_vars(vars(&[
            ("GCSUPLOAD_BUCKET", "media"),
            ("GCSUPLOAD_PUBLIC_FILES", "true"),
            ("GCSUPLOAD_UNIFORM", "false"),
            ("GCSUPLOAD_BASE_PATH", "uploads/"),
            ("GCSUPLOAD_SIZE_LIMIT", "1024"),
            ("GCSUPLOAD_BACKEND", "memory"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendType::Memory);
        assert_eq!(config.storage.bucket_name, "media");
        assert!(config.storage.public_files);
        assert!(!config.storage.uniform);
        assert_eq!(config.storage.base_path, "uploads/");
        assert_eq!(config.storage.size_limit, Some(1024));
    }

    #[test]
    fn test_missing_bucket_rejected() {
        let err = Config::from_vars(vars(&[])).unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let err = Config::from_vars(vars(&[
            ("GCSUPLOAD_BUCKET", "media"),
            ("GCSUPLOAD_UNIFORM", "maybe"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GCSUPLOAD_UNIFORM"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = Config::from_vars(vars(&[
            ("GCSUPLOAD_BUCKET", "media"),
            ("GCSUPLOAD_BASE_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_signed_url_expiry_bounds() {
        let mut config = Config::default();
        config.storage.bucket_name = "media".to_string();
        config.storage.signed_url_expiry_secs = MAX_SIGNED_URL_EXPIRY_SECS + 1;
        assert!(config.validate().is_err());
        config.storage.signed_url_expiry_secs = MAX_SIGNED_URL_EXPIRY_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_credentials_required_without_managed_identity() {
        let mut config = Config::default();
        config.storage.bucket_name = "media".to_string();
        config.gcp.use_managed_identity = false;
        assert!(config.validate().is_err());
        config.gcp.service_account_key = Some("{}".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_redacted_in_debug() {
        let gcp = GcpConfig {
            service_account_key: Some("{\"private_key\": \"secret\"}".to_string()),
            ..GcpConfig::default()
        };
        let printed = format!("{:?}", gcp);
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_toml(include_str!("../gcsupload.example.toml")).unwrap();
        assert_eq!(config.backend, BackendType::Gcp);
        assert_eq!(config.storage.base_path, "uploads");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(
            r#"
            backend = "memory"

            [storage]
            bucket_name = "media"
            public_files = true
            base_url = "https://cdn.example"

            [server]
            bind_address = "127.0.0.1:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendType::Memory);
        assert_eq!(config.storage.bucket_name, "media");
        assert!(config.storage.uniform);
        assert_eq!(config.storage.base_url.as_deref(), Some("https://cdn.example"));
        assert_eq!(config.server.bind_address.port(), 9000);
        assert_eq!(config.server.timeout_secs, 300);
        assert!(config.validate().is_ok());
    }
}
